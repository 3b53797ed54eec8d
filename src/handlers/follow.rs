use crate::error::{AppError, AppResult};
use crate::handlers::user::UserResponse;
use crate::middleware::AuthUser;
use crate::response::{ApiResponse, PaginatedResponse, PaginationQuery};
use crate::services::follow::FollowService;
use axum::{extract::Path, extract::Query, response::IntoResponse, Extension};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct FollowToggleResponse {
    pub following: bool,
    /// Target's follower count after the toggle
    pub followers: u64,
}

#[utoipa::path(
    post,
    path = "/api/follow/{user_id}",
    security(("jwt_token" = [])),
    params(("user_id" = i32, Path, description = "User to follow or unfollow")),
    responses(
        (status = 200, description = "Follow state toggled", body = FollowToggleResponse),
        (status = 400, description = "Cannot follow yourself", body = AppError),
        (status = 404, description = "User not found", body = AppError),
    ),
    tag = "follows"
)]
pub async fn toggle_follow(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
    Path(user_id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    let service = FollowService::new(db);
    let following = service.toggle(auth_user.user_id, user_id).await?;
    let counts = service.counts(user_id).await?;
    Ok(ApiResponse::ok(FollowToggleResponse {
        following,
        followers: counts.followers,
    }))
}

#[utoipa::path(
    get,
    path = "/api/users/{user_id}/followers",
    params(
        ("user_id" = i32, Path, description = "User ID"),
        ("page" = Option<u64>, Query, description = "Page number"),
        ("per_page" = Option<u64>, Query, description = "Items per page (max 100)"),
    ),
    responses(
        (status = 200, description = "Followers, most recent first", body = PaginatedResponse<UserResponse>),
        (status = 404, description = "User not found", body = AppError),
    ),
    tag = "follows"
)]
pub async fn list_followers(
    Extension(db): Extension<DatabaseConnection>,
    Path(user_id): Path<i32>,
    Query(params): Query<PaginationQuery>,
) -> AppResult<impl IntoResponse> {
    let (page, per_page) = params.resolve(20, 100);

    let service = FollowService::new(db);
    let (users, total) = service.list_followers(user_id, page, per_page).await?;
    let items = users.into_iter().map(UserResponse::from).collect();
    Ok(ApiResponse::ok(PaginatedResponse::new(
        items, total, page, per_page,
    )))
}

#[utoipa::path(
    get,
    path = "/api/users/{user_id}/following",
    params(
        ("user_id" = i32, Path, description = "User ID"),
        ("page" = Option<u64>, Query, description = "Page number"),
        ("per_page" = Option<u64>, Query, description = "Items per page (max 100)"),
    ),
    responses(
        (status = 200, description = "Followed users, most recent first", body = PaginatedResponse<UserResponse>),
        (status = 404, description = "User not found", body = AppError),
    ),
    tag = "follows"
)]
pub async fn list_following(
    Extension(db): Extension<DatabaseConnection>,
    Path(user_id): Path<i32>,
    Query(params): Query<PaginationQuery>,
) -> AppResult<impl IntoResponse> {
    let (page, per_page) = params.resolve(20, 100);

    let service = FollowService::new(db);
    let (users, total) = service.list_following(user_id, page, per_page).await?;
    let items = users.into_iter().map(UserResponse::from).collect();
    Ok(ApiResponse::ok(PaginatedResponse::new(
        items, total, page, per_page,
    )))
}
