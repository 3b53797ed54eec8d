use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::response::{ApiResponse, PaginatedResponse, PaginationQuery};
use crate::services::feed::{FeedItem, FeedScope, FeedService, DEFAULT_FEED_LIMIT, MAX_FEED_LIMIT};
use axum::{extract::Query, response::IntoResponse, Extension};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FeedType {
    #[default]
    Global,
    Following,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct FeedQuery {
    /// `global` (default) or `following`
    #[serde(rename = "type", default)]
    pub feed_type: FeedType,
    pub page: Option<u64>,
    /// Defaults to 50, max 100
    pub per_page: Option<u64>,
}

impl FeedQuery {
    fn pagination(&self) -> PaginationQuery {
        PaginationQuery {
            page: self.page,
            per_page: self.per_page,
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/feed",
    security(("jwt_token" = [])),
    params(FeedQuery),
    responses(
        (status = 200, description = "Feed, newest first", body = PaginatedResponse<FeedItem>),
        (status = 401, description = "Unauthorized", body = AppError),
    ),
    tag = "feed"
)]
pub async fn get_feed(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
    Query(query): Query<FeedQuery>,
) -> AppResult<impl IntoResponse> {
    let (page, per_page) = query
        .pagination()
        .resolve(DEFAULT_FEED_LIMIT, MAX_FEED_LIMIT);

    let scope = match query.feed_type {
        FeedType::Global => FeedScope::Global,
        FeedType::Following => FeedScope::Following(auth_user.user_id),
    };

    let (items, total) = FeedService::new(db)
        .list(scope, Some(auth_user.user_id), page, per_page)
        .await?;
    Ok(ApiResponse::ok(PaginatedResponse::new(
        items, total, page, per_page,
    )))
}
