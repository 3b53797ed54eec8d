use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::response::{ApiResponse, PaginatedResponse, PaginationQuery};
use crate::services::crate_save::CrateService;
use crate::services::feed::{FeedItem, FeedScope, FeedService};
use axum::{extract::Path, extract::Query, response::IntoResponse, Extension};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct CrateSaveResponse {
    pub saved: bool,
    pub save_count: u64,
}

#[utoipa::path(
    post,
    path = "/api/crate/{post_id}",
    security(("jwt_token" = [])),
    params(("post_id" = i32, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Post saved to crate", body = CrateSaveResponse),
        (status = 404, description = "Post not found", body = AppError),
    ),
    tag = "crate"
)]
pub async fn save_post(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
    Path(post_id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    let save_count = CrateService::new(db).save(auth_user.user_id, post_id).await?;
    Ok(ApiResponse::ok(CrateSaveResponse {
        saved: true,
        save_count,
    }))
}

#[utoipa::path(
    delete,
    path = "/api/crate/{post_id}",
    security(("jwt_token" = [])),
    params(("post_id" = i32, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Post removed from crate", body = CrateSaveResponse),
        (status = 404, description = "Post not found", body = AppError),
    ),
    tag = "crate"
)]
pub async fn unsave_post(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
    Path(post_id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    let save_count = CrateService::new(db).unsave(auth_user.user_id, post_id).await?;
    Ok(ApiResponse::ok(CrateSaveResponse {
        saved: false,
        save_count,
    }))
}

#[utoipa::path(
    get,
    path = "/api/crate",
    security(("jwt_token" = [])),
    params(
        ("page" = Option<u64>, Query, description = "Page number"),
        ("per_page" = Option<u64>, Query, description = "Items per page (max 100)"),
    ),
    responses(
        (status = 200, description = "Saved posts, most recent save first", body = PaginatedResponse<FeedItem>),
    ),
    tag = "crate"
)]
pub async fn list_crate(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
    Query(params): Query<PaginationQuery>,
) -> AppResult<impl IntoResponse> {
    let (page, per_page) = params.resolve(20, 100);
    let (items, total) = FeedService::new(db)
        .list(
            FeedScope::Saved(auth_user.user_id),
            Some(auth_user.user_id),
            page,
            per_page,
        )
        .await?;
    Ok(ApiResponse::ok(PaginatedResponse::new(
        items, total, page, per_page,
    )))
}
