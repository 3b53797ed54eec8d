#![allow(dead_code)]

use axum::{extract::Query, http::StatusCode, response::IntoResponse, routing::get, Json};
use earshot::config::{media::MediaConfig, metadata::MetadataConfig};
use earshot::services::{audio::AudioService, metadata::MetadataService};
use reqwest::Client;
use sea_orm::{ConnectionTrait, DatabaseConnection, Statement};
use sea_orm_migration::MigratorTrait;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Once,
};
use std::time::Duration;
use tokio::sync::OnceCell;

pub const MIGRATION_SECRET: &str = "integration_test_migration_secret";
pub const TEST_PASSWORD: &str = "test_password_123";

/// Video id the fake YouTube endpoint answers with 404.
pub const MISSING_VIDEO_ID: &str = "missing0000";
/// Song id the fake iTunes lookup reports zero results for.
pub const MISSING_SONG_ID: &str = "404";

static INIT: Once = Once::new();
static DB_READY: OnceCell<()> = OnceCell::const_new();
static USER_COUNTER: AtomicUsize = AtomicUsize::new(0);

fn init_env() {
    INIT.call_once(|| {
        dotenv::dotenv().ok();
        std::env::set_var(
            "JWT_SECRET_KEY",
            "integration_test_secret_that_is_at_least_32_characters_long",
        );
        std::env::set_var(
            "SECRET_KEY",
            "integration_test_session_secret_at_least_32_characters",
        );
        std::env::set_var("RATE_LIMIT_ENABLED", "false");
        let config = earshot::config::jwt::JwtConfig::from_env().unwrap();
        let _ = earshot::utils::jwt::init_jwt_config(config);
    });
}

pub struct TestApp {
    pub addr: String,
    pub db: DatabaseConnection,
    pub client: Client,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.addr, path)
    }

    pub fn page(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// A browser-like client: keeps cookies, does not follow redirects.
    pub fn browser(&self) -> Client {
        Client::builder()
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap()
    }

    pub async fn post_count(&self) -> i64 {
        let row = self
            .db
            .query_one(Statement::from_string(
                sea_orm::DatabaseBackend::Postgres,
                "SELECT COUNT(*) AS n FROM posts".to_string(),
            ))
            .await
            .unwrap()
            .unwrap();
        row.try_get::<i64>("", "n").unwrap()
    }

    pub async fn user_post_count(&self, user_id: i32) -> i64 {
        let row = self
            .db
            .query_one(Statement::from_sql_and_values(
                sea_orm::DatabaseBackend::Postgres,
                "SELECT COUNT(*) AS n FROM posts WHERE user_id = $1",
                vec![user_id.into()],
            ))
            .await
            .unwrap()
            .unwrap();
        row.try_get::<i64>("", "n").unwrap()
    }
}

pub async fn spawn_app() -> TestApp {
    init_env();

    let database_url = std::env::var("TEST_DATABASE_URL")
        .unwrap_or_else(|_| std::env::var("DATABASE_URL").expect("DATABASE_URL must be set"));

    let db = sea_orm::Database::connect(&database_url)
        .await
        .expect("Failed to connect to test database");

    // Migrate and wipe once per test binary; tests inside a binary run
    // concurrently and rely on unique usernames instead.
    DB_READY
        .get_or_init(|| async {
            earshot::migration::Migrator::up(&db, None)
                .await
                .expect("Failed to run migrations");
            cleanup_tables(&db).await;
        })
        .await;

    let upstream = spawn_fake_upstream().await;
    let metadata = MetadataService::new(MetadataConfig::with_base_url(&upstream), None)
        .expect("Failed to build metadata service");
    let media_config = MediaConfig {
        ytdlp_bin: "/nonexistent/yt-dlp".to_string(),
        ytdlp_timeout: Duration::from_secs(5),
        audio_proxy_timeout: Duration::from_secs(5),
        allow_private_upstreams: true,
        migration_secret: Some(MIGRATION_SECRET.to_string()),
    };
    let audio = AudioService::new(media_config.clone()).expect("Failed to build audio service");

    let app = axum::Router::new()
        .route("/health", get(|| async { "ok" }))
        .merge(earshot::routes::create_routes())
        .layer(axum::middleware::from_fn(
            earshot::middleware::security::security_headers_middleware,
        ))
        .layer(axum::extract::Extension(db.clone()))
        .layer(axum::extract::Extension(metadata))
        .layer(axum::extract::Extension(audio))
        .layer(axum::extract::Extension(media_config));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    TestApp {
        addr: format!("http://{}", addr),
        db,
        client: Client::new(),
    }
}

async fn cleanup_tables(db: &DatabaseConnection) {
    for table in ["crate_saves", "follows", "posts", "users"] {
        let sql = format!("TRUNCATE TABLE {} CASCADE", table);
        let _ = db
            .execute(Statement::from_string(
                sea_orm::DatabaseBackend::Postgres,
                sql,
            ))
            .await;
    }
}

/// Stand-in for the YouTube/Spotify oEmbed endpoints and the iTunes lookup.
/// Titles are derived from the requested id so tests can predict them.
async fn spawn_fake_upstream() -> String {
    let app = axum::Router::new()
        .route("/youtube/oembed", get(fake_youtube))
        .route("/spotify/oembed", get(fake_spotify))
        .route("/itunes/lookup", get(fake_itunes));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind fake upstream");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

#[derive(Deserialize)]
struct OEmbedQuery {
    url: String,
}

fn last_segment(url: &str) -> &str {
    url.rsplit(['/', '=']).next().unwrap_or_default()
}

async fn fake_youtube(Query(q): Query<OEmbedQuery>) -> impl IntoResponse {
    let id = last_segment(&q.url);
    if id == MISSING_VIDEO_ID {
        return (StatusCode::NOT_FOUND, "Not Found").into_response();
    }
    Json(json!({
        "title": format!("Test Artist - Song {id} (Official Video)"),
        "author_name": "Test Artist",
        "thumbnail_url": format!("https://i.ytimg.com/vi/{id}/hqdefault.jpg"),
    }))
    .into_response()
}

async fn fake_spotify(Query(q): Query<OEmbedQuery>) -> impl IntoResponse {
    let id = last_segment(&q.url);
    Json(json!({
        "title": format!("Track {id} · Spotify Artist"),
        "thumbnail_url": format!("https://i.scdn.co/image/{id}"),
    }))
}

async fn fake_itunes(Query(q): Query<HashMap<String, String>>) -> impl IntoResponse {
    let id = q.get("id").cloned().unwrap_or_default();
    if id == MISSING_SONG_ID {
        return Json(json!({ "resultCount": 0, "results": [] }));
    }
    Json(json!({
        "resultCount": 1,
        "results": [{
            "trackName": format!("Apple Song {id}"),
            "artistName": "Apple Artist",
            "artworkUrl100": format!("https://is1.mzstatic.com/{id}/100x100bb.jpg"),
        }]
    }))
}

pub fn unique_username(prefix: &str) -> String {
    let counter = USER_COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("{}_{}", prefix, counter)
}

/// Register a user and return (user_id, token, username).
pub async fn create_test_user(app: &TestApp, username_prefix: &str) -> (i32, String, String) {
    let username = unique_username(username_prefix);

    let resp = app
        .client
        .post(app.url("/register"))
        .json(&json!({
            "username": username,
            "password": TEST_PASSWORD,
        }))
        .send()
        .await
        .expect("Failed to register user");

    let status = resp.status();
    let body: serde_json::Value = resp.json().await.unwrap_or_else(|e| {
        panic!(
            "Failed to parse register response for user '{}': status={}, error={}",
            username, status, e
        );
    });

    if !body["success"].as_bool().unwrap_or(false) {
        panic!(
            "Failed to register user '{}': status={}, body={}",
            username, status, body
        );
    }

    let user_id = body["data"]["user"]["id"]
        .as_i64()
        .unwrap_or_else(|| panic!("Response missing user id: {body}")) as i32;
    let token = body["data"]["token"]
        .as_str()
        .unwrap_or_else(|| panic!("Response missing token: {body}"))
        .to_string();
    (user_id, token, username)
}

/// Share a YouTube video through the API and return the post id.
pub async fn create_test_post(app: &TestApp, token: &str, video_id: &str) -> i32 {
    let resp = app
        .client
        .post(app.url("/post"))
        .bearer_auth(token)
        .json(&json!({ "url": format!("https://www.youtube.com/watch?v={video_id}") }))
        .send()
        .await
        .expect("Failed to create post");

    let status = resp.status();
    let body: serde_json::Value = resp.json().await.expect("Failed to parse post response");
    if !body["success"].as_bool().unwrap_or(false) {
        panic!("Failed to create post: status={}, body={}", status, body);
    }
    body["data"]["id"].as_i64().expect("Post response missing id") as i32
}

/// Log a browser client in through the form and keep its session cookie.
pub async fn browser_login(app: &TestApp, client: &Client, username: &str) {
    let resp = client
        .post(app.page("/login"))
        .form(&[("username", username), ("password", TEST_PASSWORD)])
        .send()
        .await
        .expect("Failed to log in");
    assert_eq!(resp.status(), 303, "page login should redirect");
}
