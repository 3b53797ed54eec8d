use axum::{extract::Extension, middleware, response::IntoResponse, routing::get, Json, Router};
use earshot::config::{self, media::MediaConfig, metadata::MetadataConfig};
use earshot::services::{audio::AudioService, cache::CacheService, metadata::MetadataService};
use earshot::{migration, routes, utils};
use sea_orm::{ConnectionTrait, DatabaseConnection, Statement};
use sea_orm_migration::MigratorTrait;
use serde_json::json;
use std::env;
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        // Auth routes
        earshot::handlers::register,
        earshot::handlers::login,
        earshot::handlers::get_current_user,
        // Feed
        earshot::handlers::feed::get_feed,
        // Post routes
        earshot::handlers::post::create_post,
        earshot::handlers::post::update_post,
        earshot::handlers::post::delete_post,
        // Profile routes
        earshot::handlers::user::get_profile,
        earshot::handlers::user::change_username,
        earshot::handlers::user::update_profile,
        // Follow routes
        earshot::handlers::follow::toggle_follow,
        earshot::handlers::follow::list_followers,
        earshot::handlers::follow::list_following,
        // Crate routes
        earshot::handlers::crate_save::save_post,
        earshot::handlers::crate_save::unsave_post,
        earshot::handlers::crate_save::list_crate,
        // Media routes
        earshot::handlers::media::ytdl,
        earshot::handlers::media::audio_proxy,
        earshot::handlers::media::migrate_artists,
    ),
    components(
        schemas(
            earshot::response::ApiResponse<serde_json::Value>,
            earshot::response::PaginatedResponse<serde_json::Value>,
            earshot::response::PaginationQuery,
            earshot::error::AppError,
            // Auth
            earshot::handlers::auth::RegisterRequest,
            earshot::handlers::auth::LoginRequest,
            earshot::handlers::auth::AuthResponse,
            // User
            earshot::handlers::user::UserResponse,
            earshot::handlers::user::ProfileResponse,
            earshot::handlers::user::ChangeUsernameRequest,
            earshot::handlers::user::UpdateProfileRequest,
            // Feed
            earshot::handlers::feed::FeedType,
            earshot::services::feed::FeedItem,
            // Post
            earshot::handlers::post::CreatePostRequest,
            earshot::handlers::post::UpdatePostRequest,
            earshot::handlers::post::DeletePostResponse,
            // Follow
            earshot::handlers::follow::FollowToggleResponse,
            // Crate
            earshot::handlers::crate_save::CrateSaveResponse,
            // Media
            earshot::handlers::media::YtdlResponse,
            earshot::services::backfill::BackfillReport,
        )
    ),
    tags(
        (name = "auth", description = "Registration and login"),
        (name = "feed", description = "Global and following feeds"),
        (name = "posts", description = "Shared tracks"),
        (name = "users", description = "Profiles and usernames"),
        (name = "follows", description = "Follow graph"),
        (name = "crate", description = "Saved tracks"),
        (name = "media", description = "Audio resolution and streaming"),
        (name = "maintenance", description = "Metadata backfill"),
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "earshot=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Validate configuration before doing anything else
    let jwt_config = validate_config()?;
    utils::jwt::init_jwt_config(jwt_config)?;

    tracing::info!("Starting earshot v{}...", env!("CARGO_PKG_VERSION"));

    let db = config::database::get_database().await?;
    tracing::info!("Database connected successfully");

    migration::Migrator::up(&db, None).await?;
    tracing::info!("Database migrations applied successfully");

    // Redis only backs the metadata cache; run without it when unavailable
    let cache = match config::redis::get_redis().await {
        Ok(Some(conn)) => {
            tracing::info!("Redis connected successfully");
            Some(CacheService::new(conn))
        }
        Ok(None) => {
            tracing::info!("REDIS_URL not set, metadata cache disabled");
            None
        }
        Err(e) => {
            tracing::warn!("Redis unavailable, running without cache: {}", e);
            None
        }
    };

    let media_config = MediaConfig::from_env();
    if media_config.migration_secret.is_none() {
        tracing::warn!("MIGRATION_SECRET not set, /api/migrate-artists is disabled");
    }

    let metadata = MetadataService::new(MetadataConfig::from_env(), cache)?;
    let audio = AudioService::new(media_config.clone())?;

    let app = create_app()
        .layer(Extension(db))
        .layer(Extension(metadata))
        .layer(Extension(audio))
        .layer(Extension(media_config));

    let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port = env::var("PORT").unwrap_or_else(|_| "5000".to_string());
    let addr = format!("{}:{}", host, port);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui/", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server shut down gracefully");
    Ok(())
}

/// Validate all required configuration at startup (fail-fast).
fn validate_config() -> anyhow::Result<config::jwt::JwtConfig> {
    let jwt_config = config::jwt::JwtConfig::from_env()?;

    // Checked here for an early error; the connection happens later
    if env::var("DATABASE_URL").is_err() {
        return Err(anyhow::anyhow!(
            "DATABASE_URL environment variable must be set"
        ));
    }

    Ok(jwt_config)
}

fn build_cors_layer() -> CorsLayer {
    use axum::http::{header, HeaderValue, Method};

    let origins_str = env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string());

    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::RANGE,
            header::HeaderName::from_static(earshot::handlers::media::MIGRATION_SECRET_HEADER),
        ]);

    if origins_str == "*" {
        cors.allow_origin(tower_http::cors::Any)
    } else {
        let origins: Vec<HeaderValue> = origins_str
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        cors.allow_origin(origins)
    }
}

fn create_app() -> Router {
    Router::new()
        .route("/health", get(health_check))
        .merge(routes::create_routes())
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(middleware::from_fn(
            earshot::middleware::security_headers_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer())
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check successful", body = serde_json::Value)
    )
)]
async fn health_check(Extension(db): Extension<DatabaseConnection>) -> impl IntoResponse {
    let db_ok = db
        .query_one(Statement::from_string(
            sea_orm::DatabaseBackend::Postgres,
            "SELECT 1".to_string(),
        ))
        .await
        .is_ok();

    let status = if db_ok { "ok" } else { "degraded" };

    Json(json!({
        "status": status,
        "service": "earshot",
        "version": env!("CARGO_PKG_VERSION"),
        "database": db_ok,
    }))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install CTRL+C signal handler: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, gracefully shutting down...");
}
