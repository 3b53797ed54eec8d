use crate::error::{AppError, AppResult};
use crate::config::media::MediaConfig;
use crate::response::ApiResponse;
use crate::services::audio::{AudioService, MediaError};
use crate::services::backfill::{BackfillReport, BackfillService};
use crate::services::metadata::MetadataService;
use axum::{
    body::Body,
    extract::Query,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Extension,
};
use futures_util::TryStreamExt;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use utoipa::{IntoParams, ToSchema};

pub const MIGRATION_SECRET_HEADER: &str = "x-migration-secret";
const DEFAULT_AUDIO_CONTENT_TYPE: &str = "audio/webm";

#[derive(Debug, Deserialize, IntoParams)]
pub struct MediaUrlQuery {
    /// Page or stream URL (http/https)
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct YtdlResponse {
    #[serde(rename = "audioUrl")]
    pub audio_url: String,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct BackfillQuery {
    /// Report what would change without writing
    #[serde(default)]
    pub dry_run: bool,
}

#[utoipa::path(
    get,
    path = "/api/ytdl",
    params(MediaUrlQuery),
    responses(
        (status = 200, description = "Direct audio stream URL", body = YtdlResponse),
        (status = 400, description = "Missing or invalid URL", body = AppError),
        (status = 403, description = "YouTube requires sign-in for this video", body = AppError),
        (status = 404, description = "No audio stream found", body = AppError),
        (status = 502, description = "yt-dlp failed", body = AppError),
    ),
    tag = "media"
)]
pub async fn ytdl(
    Extension(audio): Extension<AudioService>,
    Query(query): Query<MediaUrlQuery>,
) -> Result<ApiResponse<YtdlResponse>, MediaError> {
    let audio_url = audio.resolve_stream_url(&query.url).await?;
    Ok(ApiResponse::ok(YtdlResponse { audio_url }))
}

#[utoipa::path(
    get,
    path = "/api/audio",
    params(MediaUrlQuery),
    responses(
        (status = 200, description = "Upstream audio bytes"),
        (status = 206, description = "Partial content for a ranged request"),
        (status = 400, description = "Missing or invalid URL", body = AppError),
        (status = 502, description = "Upstream failed", body = AppError),
        (status = 504, description = "Upstream timed out", body = AppError),
    ),
    tag = "media"
)]
pub async fn audio_proxy(
    Extension(audio): Extension<AudioService>,
    headers: HeaderMap,
    Query(query): Query<MediaUrlQuery>,
) -> Result<Response, MediaError> {
    let range = headers.get(header::RANGE).and_then(|v| v.to_str().ok());
    let upstream = audio.open_upstream(&query.url, range).await?;

    let status = if upstream.status() == reqwest::StatusCode::PARTIAL_CONTENT {
        StatusCode::PARTIAL_CONTENT
    } else {
        StatusCode::OK
    };

    let passthrough: Vec<(header::HeaderName, HeaderValue)> = [
        header::CONTENT_LENGTH,
        header::CONTENT_RANGE,
        header::ACCEPT_RANGES,
    ]
    .into_iter()
    .filter_map(|name| {
        let value = upstream.headers().get(name.as_str())?;
        let value = HeaderValue::from_bytes(value.as_bytes()).ok()?;
        Some((name, value))
    })
    .collect();

    let content_type = upstream
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| HeaderValue::from_bytes(v.as_bytes()).ok())
        .unwrap_or_else(|| HeaderValue::from_static(DEFAULT_AUDIO_CONTENT_TYPE));

    let stream = upstream
        .bytes_stream()
        .inspect_err(|e| tracing::warn!("Audio proxy stream interrupted: {e}"));

    let mut response = Response::new(Body::from_stream(stream));
    *response.status_mut() = status;
    let out = response.headers_mut();
    out.insert(header::CONTENT_TYPE, content_type);
    for (name, value) in passthrough {
        out.insert(name, value);
    }
    Ok(response)
}

fn secret_matches(expected: &str, provided: &str) -> bool {
    expected.as_bytes().ct_eq(provided.as_bytes()).into()
}

#[utoipa::path(
    post,
    path = "/api/migrate-artists",
    params(
        BackfillQuery,
        ("X-Migration-Secret" = String, Header, description = "Shared maintenance secret"),
    ),
    responses(
        (status = 200, description = "Backfill finished", body = BackfillReport),
        (status = 403, description = "Missing or wrong secret, or maintenance disabled", body = AppError),
    ),
    tag = "maintenance"
)]
pub async fn migrate_artists(
    Extension(db): Extension<DatabaseConnection>,
    Extension(metadata): Extension<MetadataService>,
    Extension(media): Extension<MediaConfig>,
    headers: HeaderMap,
    Query(query): Query<BackfillQuery>,
) -> AppResult<impl IntoResponse> {
    let Some(expected) = media.migration_secret.as_deref() else {
        tracing::warn!("Artist backfill requested but MIGRATION_SECRET is not set");
        return Err(AppError::Forbidden);
    };

    let provided = headers
        .get(MIGRATION_SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !secret_matches(expected, provided) {
        tracing::warn!("Artist backfill rejected: bad migration secret");
        return Err(AppError::Forbidden);
    }

    let report = BackfillService::new(db, metadata)
        .run(query.dry_run)
        .await?;
    Ok(ApiResponse::ok(report))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_comparison() {
        assert!(secret_matches("s3cret-value", "s3cret-value"));
        assert!(!secret_matches("s3cret-value", "s3cret-valuE"));
        assert!(!secret_matches("s3cret-value", ""));
    }
}
