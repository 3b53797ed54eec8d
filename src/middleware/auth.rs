use crate::{
    error::{AppError, AppResult},
    models::User,
    utils::{
        cookie::{extract_cookie, SESSION_COOKIE},
        jwt::{decode_token, TokenKind},
    },
};
use axum::{
    extract::{FromRequestParts, Request},
    http::{request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
    Extension,
};
use sea_orm::{DatabaseConnection, EntityTrait};

/// Caller resolved from a bearer token or the session cookie.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i32,
    pub username: String,
}

/// JWT authentication middleware for the JSON API.
///
/// Prefers `Authorization: Bearer <api token>` and falls back to the browser
/// session cookie so pages can call the API with `fetch`. The user row must
/// still exist.
pub async fn auth_middleware(
    Extension(db): Extension<DatabaseConnection>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_user = authenticate(&db, &headers)
        .await?
        .ok_or(AppError::Unauthorized)?;

    request.extensions_mut().insert(auth_user);
    Ok(next.run(request).await)
}

/// Resolve the caller without rejecting anonymous requests.
///
/// A present but invalid credential is still an error.
pub async fn authenticate(
    db: &DatabaseConnection,
    headers: &HeaderMap,
) -> AppResult<Option<AuthUser>> {
    let (token, kind) = match extract_bearer_token(headers) {
        Some(token) => (token, TokenKind::Api),
        None => match extract_cookie(headers, SESSION_COOKIE).filter(|t| !t.is_empty()) {
            Some(token) => (token, TokenKind::Session),
            None => return Ok(None),
        },
    };

    let claims = decode_token(&token, kind).map_err(|_| AppError::Unauthorized)?;
    let user_id = claims.user_id().ok_or(AppError::Unauthorized)?;

    let user = User::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or(AppError::Unauthorized)?;

    Ok(Some(AuthUser {
        user_id: user.id,
        username: user.username,
    }))
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let auth_header = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())?;

    let token = auth_header.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(AppError::Unauthorized)
    }
}
