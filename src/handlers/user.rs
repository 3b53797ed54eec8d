use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::models::UserModel;
use crate::response::ApiResponse;
use crate::services::feed::{FeedItem, FeedScope, FeedService};
use crate::services::follow::FollowService;
use crate::services::user::UserService;
use axum::{extract::Path, response::IntoResponse, Extension, Json};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

pub const PROFILE_POST_LIMIT: u64 = 20;

#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: i32,
    pub username: String,
    pub social_handle: Option<String>,
    /// False for device-only accounts
    pub has_password: bool,
    pub created_at: String,
}

impl From<UserModel> for UserResponse {
    fn from(u: UserModel) -> Self {
        Self {
            id: u.id,
            username: u.username,
            social_handle: u.social_handle,
            has_password: u.password_hash.is_some(),
            created_at: u.created_at.to_string(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProfileResponse {
    pub user: UserResponse,
    pub followers: u64,
    pub following: u64,
    pub is_following: bool,
    pub is_me: bool,
    pub posts: Vec<FeedItem>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ChangeUsernameRequest {
    #[validate(length(min = 3, max = 30))]
    pub username: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateProfileRequest {
    /// Omit or send an empty string to clear
    #[validate(length(max = 120))]
    pub social_handle: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/profile/{username}",
    security(("jwt_token" = [])),
    params(("username" = String, Path, description = "Username, any case")),
    responses(
        (status = 200, description = "Profile with newest posts", body = ProfileResponse),
        (status = 404, description = "User not found", body = AppError),
    ),
    tag = "users"
)]
pub async fn get_profile(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
    Path(username): Path<String>,
) -> AppResult<impl IntoResponse> {
    let user = UserService::new(db.clone()).get_by_username(&username).await?;

    let follows = FollowService::new(db.clone());
    let counts = follows.counts(user.id).await?;
    let is_me = user.id == auth_user.user_id;
    let is_following = !is_me && follows.is_following(auth_user.user_id, user.id).await?;

    let posts = FeedService::new(db)
        .latest(
            FeedScope::Author(user.id),
            Some(auth_user.user_id),
            PROFILE_POST_LIMIT,
        )
        .await?;

    Ok(ApiResponse::ok(ProfileResponse {
        user: UserResponse::from(user),
        followers: counts.followers,
        following: counts.following,
        is_following,
        is_me,
        posts,
    }))
}

#[utoipa::path(
    put,
    path = "/api/profile/username",
    security(("jwt_token" = [])),
    request_body = ChangeUsernameRequest,
    responses(
        (status = 200, description = "Username changed", body = UserResponse),
        (status = 400, description = "Invalid or taken username", body = AppError),
    ),
    tag = "users"
)]
pub async fn change_username(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
    Json(payload): Json<ChangeUsernameRequest>,
) -> AppResult<impl IntoResponse> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let user = UserService::new(db)
        .change_username(auth_user.user_id, &payload.username)
        .await?;
    Ok(ApiResponse::ok(UserResponse::from(user)))
}

#[utoipa::path(
    put,
    path = "/api/profile",
    security(("jwt_token" = [])),
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = UserResponse),
        (status = 400, description = "Validation error", body = AppError),
    ),
    tag = "users"
)]
pub async fn update_profile(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> AppResult<impl IntoResponse> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let user = UserService::new(db)
        .update_social_handle(auth_user.user_id, payload.social_handle.as_deref())
        .await?;
    Ok(ApiResponse::ok(UserResponse::from(user)))
}
