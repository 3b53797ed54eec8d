use crate::error::{AppError, AppResult};
use crate::handlers::user::UserResponse;
use crate::middleware::AuthUser;
use crate::response::ApiResponse;
use crate::services::auth::AuthService;
use crate::utils::TokenKind;
use axum::{response::IntoResponse, Extension, Json};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    /// Username (3-30 characters, case-insensitively unique)
    #[validate(length(min = 3, max = 30))]
    pub username: String,
    /// Password (min 6 characters)
    #[validate(length(min = 6, max = 128))]
    pub password: String,
}

/// Either `username` + `password`, or `device_id` (+ optional `username`
/// used when the device account is first created).
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    pub device_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    /// Bearer token for the JSON API
    pub token: String,
    pub user: UserResponse,
    /// True when this call created the account
    pub created: bool,
}

fn auth_response(
    service: &AuthService,
    user: crate::models::UserModel,
    created: bool,
) -> AppResult<AuthResponse> {
    let token = service.issue_token(user.id, TokenKind::Api)?;
    Ok(AuthResponse {
        token,
        user: UserResponse::from(user),
        created,
    })
}

#[utoipa::path(
    post,
    path = "/api/register",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "User registered successfully", body = AuthResponse),
        (status = 400, description = "Validation error or username taken", body = AppError),
    ),
    tag = "auth"
)]
pub async fn register(
    Extension(db): Extension<DatabaseConnection>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<impl IntoResponse> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(format!("Validation error: {e}")))?;

    let service = AuthService::new(db);
    let user = service.register(&payload.username, &payload.password).await?;
    let response = auth_response(&service, user, true)?;

    Ok(ApiResponse::with_message(
        response,
        "Registration successful.".to_string(),
    ))
}

#[utoipa::path(
    post,
    path = "/api/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 400, description = "Missing credentials", body = AppError),
        (status = 401, description = "Invalid username or password", body = AppError),
    ),
    tag = "auth"
)]
pub async fn login(
    Extension(db): Extension<DatabaseConnection>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<impl IntoResponse> {
    let service = AuthService::new(db);

    if let Some(device_id) = payload.device_id.as_deref().filter(|d| !d.trim().is_empty()) {
        let (user, created) = service
            .device_login(device_id, payload.username.as_deref())
            .await?;
        return Ok(ApiResponse::ok(auth_response(&service, user, created)?));
    }

    let (Some(username), Some(password)) = (payload.username.as_deref(), payload.password.as_deref())
    else {
        return Err(AppError::Validation(
            "username and password, or device_id, required".to_string(),
        ));
    };

    let user = service.login(username, password).await?;
    Ok(ApiResponse::ok(auth_response(&service, user, false)?))
}

#[utoipa::path(
    get,
    path = "/api/me",
    security(("jwt_token" = [])),
    responses(
        (status = 200, description = "Current user retrieved successfully", body = UserResponse),
        (status = 401, description = "Unauthorized", body = AppError),
    ),
    tag = "auth"
)]
pub async fn get_current_user(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
) -> AppResult<impl IntoResponse> {
    let service = AuthService::new(db);
    let user = service.get_user_by_id(auth_user.user_id).await?;

    Ok(ApiResponse::ok(UserResponse::from(user)))
}
