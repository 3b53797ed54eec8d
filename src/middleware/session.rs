use crate::{
    error::AppError,
    middleware::auth::{authenticate, AuthUser},
    utils::cookie::{build_clear_cookie, SESSION_COOKIE},
};
use axum::{
    extract::{FromRequestParts, Request},
    http::{header, request::Parts, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
    Extension,
};
use sea_orm::DatabaseConnection;
use std::convert::Infallible;

/// Logged-in browser user, if any. Inserted by [`session_middleware`].
#[derive(Debug, Clone, Default)]
pub struct CurrentUser(pub Option<AuthUser>);

/// Resolve the session cookie for page routes. A stale or forged cookie is
/// cleared and the request continues anonymously. Other failures (database)
/// keep the cookie so the next request can retry it.
pub async fn session_middleware(
    Extension(db): Extension<DatabaseConnection>,
    mut request: Request,
    next: Next,
) -> Response {
    let (user, stale) = match authenticate(&db, request.headers()).await {
        Ok(user) => (user, false),
        Err(e) if rejects_session(&e) => {
            tracing::debug!("Dropping invalid session: {e}");
            (None, true)
        }
        Err(e) => {
            tracing::warn!("Could not resolve session, serving anonymously: {e}");
            (None, false)
        }
    };

    request.extensions_mut().insert(CurrentUser(user));
    let mut response = next.run(request).await;

    if stale {
        if let Ok(value) = HeaderValue::from_str(&build_clear_cookie(SESSION_COOKIE)) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }
    response
}

/// Errors that mean the cookie itself is bad, as opposed to a server failure.
fn rejects_session(err: &AppError) -> bool {
    matches!(err, AppError::Unauthorized | AppError::Jwt(_))
}

/// Redirect anonymous visitors to the login form.
pub async fn require_login(request: Request, next: Next) -> Response {
    let logged_in = request
        .extensions()
        .get::<CurrentUser>()
        .is_some_and(|u| u.0.is_some());

    if logged_in {
        next.run(request).await
    } else {
        Redirect::to("/login").into_response()
    }
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_bad_tokens_clear_the_session() {
        assert!(rejects_session(&AppError::Unauthorized));
        assert!(!rejects_session(&AppError::Database(sea_orm::DbErr::Custom(
            "connection reset".to_string()
        ))));
        assert!(!rejects_session(&AppError::Internal(anyhow::anyhow!("pool timed out"))));
    }
}
