use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::response::ApiResponse;
use crate::services::feed::{FeedItem, FeedService};
use crate::services::metadata::MetadataService;
use crate::services::post::PostService;
use axum::{extract::Path, response::IntoResponse, Extension, Json};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreatePostRequest {
    /// Spotify, YouTube or Apple Music link, or share text containing one
    #[validate(length(max = 2000))]
    pub url: String,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdatePostRequest {
    /// New title; omitted or blank keeps the current one
    #[validate(length(max = 300))]
    pub title: Option<String>,
    /// New artist; omitted or blank keeps the current one
    #[validate(length(max = 300))]
    pub artist: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeletePostResponse {
    pub id: i32,
}

#[utoipa::path(
    post,
    path = "/api/post",
    security(("jwt_token" = [])),
    request_body = CreatePostRequest,
    responses(
        (status = 200, description = "Post created", body = FeedItem),
        (status = 400, description = "Missing, invalid or unsupported URL", body = AppError),
        (status = 502, description = "Track metadata could not be fetched", body = AppError),
    ),
    tag = "posts"
)]
pub async fn create_post(
    Extension(db): Extension<DatabaseConnection>,
    Extension(metadata): Extension<MetadataService>,
    auth_user: AuthUser,
    Json(payload): Json<CreatePostRequest>,
) -> AppResult<impl IntoResponse> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(format!("Validation error: {e}")))?;

    let post = PostService::new(db.clone())
        .create_from_url(&metadata, auth_user.user_id, &payload.url)
        .await?;
    let item = FeedService::new(db)
        .item(&post, Some(auth_user.user_id))
        .await?;

    Ok(ApiResponse::with_message(item, "Posted!".to_string()))
}

#[utoipa::path(
    put,
    path = "/api/post/{id}",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "Post ID")),
    request_body = UpdatePostRequest,
    responses(
        (status = 200, description = "Post updated", body = FeedItem),
        (status = 403, description = "Not the owner", body = AppError),
        (status = 404, description = "Post not found", body = AppError),
    ),
    tag = "posts"
)]
pub async fn update_post(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
    Path(id): Path<i32>,
    Json(payload): Json<UpdatePostRequest>,
) -> AppResult<impl IntoResponse> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let post = PostService::new(db.clone())
        .update(
            id,
            auth_user.user_id,
            payload.title.as_deref(),
            payload.artist.as_deref(),
        )
        .await?;
    let item = FeedService::new(db)
        .item(&post, Some(auth_user.user_id))
        .await?;

    Ok(ApiResponse::ok(item))
}

#[utoipa::path(
    delete,
    path = "/api/post/{id}",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Post deleted", body = DeletePostResponse),
        (status = 403, description = "Not the owner", body = AppError),
        (status = 404, description = "Post not found", body = AppError),
    ),
    tag = "posts"
)]
pub async fn delete_post(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    PostService::new(db).delete(id, auth_user.user_id).await?;
    Ok(ApiResponse::with_message(
        DeletePostResponse { id },
        "Post deleted".to_string(),
    ))
}
