mod common;

use axum::{http::header, response::Redirect, routing::get};
use sea_orm::{ConnectionTrait, Statement};
use serde_json::Value;

/// Serve a tiny fake audio file and return its URL.
async fn spawn_audio_origin() -> String {
    let app = axum::Router::new()
        .route(
            "/track.mp3",
            get(|| async { ([(header::CONTENT_TYPE, "audio/mpeg")], b"ID3fakeaudio".to_vec()) }),
        )
        .route("/moved.mp3", get(|| async { Redirect::temporary("/track.mp3") }))
        .route("/to-file", get(|| async { Redirect::temporary("file:///etc/passwd") }))
        .route("/loop", get(|| async { Redirect::temporary("/loop") }));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/track.mp3", addr)
}

async fn insert_stale_post(app: &common::TestApp, user_id: i32, url: &str) -> i32 {
    let row = app
        .db
        .query_one(Statement::from_sql_and_values(
            sea_orm::DatabaseBackend::Postgres,
            "INSERT INTO posts (user_id, platform, url, title, artist, thumbnail, embed_url, created_at, updated_at)
             VALUES ($1, 'youtube', $2, 'Old Title', 'Unknown Artist', '', '', NOW(), NOW())
             RETURNING id",
            vec![user_id.into(), url.into()],
        ))
        .await
        .unwrap()
        .unwrap();
    row.try_get::<i32>("", "id").unwrap()
}

async fn post_artist(app: &common::TestApp, post_id: i32) -> (String, String) {
    let row = app
        .db
        .query_one(Statement::from_sql_and_values(
            sea_orm::DatabaseBackend::Postgres,
            "SELECT title, artist FROM posts WHERE id = $1",
            vec![post_id.into()],
        ))
        .await
        .unwrap()
        .unwrap();
    (
        row.try_get::<String>("", "title").unwrap(),
        row.try_get::<String>("", "artist").unwrap(),
    )
}

#[tokio::test]
async fn migrate_artists_requires_secret() {
    let app = common::spawn_app().await;

    let resp = app
        .client
        .post(app.url("/migrate-artists"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    let resp = app
        .client
        .post(app.url("/migrate-artists"))
        .header("X-Migration-Secret", "wrong")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);
}

#[tokio::test]
async fn migrate_artists_backfills_stale_posts() {
    let app = common::spawn_app().await;
    let (user_id, _, _) = common::create_test_user(&app, "backfill").await;
    let stale = insert_stale_post(&app, user_id, "https://www.youtube.com/watch?v=ytBack0001").await;
    let broken = insert_stale_post(
        &app,
        user_id,
        &format!("https://www.youtube.com/watch?v={}", common::MISSING_VIDEO_ID),
    )
    .await;

    // Dry run reports without writing
    let resp = app
        .client
        .post(app.url("/migrate-artists?dry_run=true"))
        .header("X-Migration-Secret", common::MIGRATION_SECRET)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert!(body["data"]["updated"].as_u64().unwrap() >= 1);
    assert!(body["data"]["failed"].as_u64().unwrap() >= 1);
    assert_eq!(post_artist(&app, stale).await.1, "Unknown Artist");

    let resp = app
        .client
        .post(app.url("/migrate-artists"))
        .header("X-Migration-Secret", common::MIGRATION_SECRET)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let report = &body["data"];
    assert_eq!(
        report["total"].as_u64().unwrap(),
        report["updated"].as_u64().unwrap()
            + report["skipped"].as_u64().unwrap()
            + report["failed"].as_u64().unwrap()
    );

    let (title, artist) = post_artist(&app, stale).await;
    assert_eq!(artist, "Test Artist");
    assert_eq!(title, "Song ytBack0001");

    // Lookups that fail leave the row alone
    let (title, artist) = post_artist(&app, broken).await;
    assert_eq!(title, "Old Title");
    assert_eq!(artist, "Unknown Artist");
}

#[tokio::test]
async fn audio_proxy_streams_upstream() {
    let app = common::spawn_app().await;
    let origin = spawn_audio_origin().await;

    let resp = app
        .client
        .get(app.url("/audio"))
        .query(&[("url", origin.as_str())])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["content-type"], "audio/mpeg");
    assert_eq!(resp.bytes().await.unwrap().as_ref(), b"ID3fakeaudio");
}

#[tokio::test]
async fn audio_proxy_follows_and_checks_redirects() {
    let app = common::spawn_app().await;
    let origin = spawn_audio_origin().await;
    let base = origin.trim_end_matches("/track.mp3");

    let moved = format!("{base}/moved.mp3");
    let resp = app
        .client
        .get(app.url("/audio"))
        .query(&[("url", moved.as_str())])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.bytes().await.unwrap().as_ref(), b"ID3fakeaudio");

    let to_file = format!("{base}/to-file");
    let resp = app
        .client
        .get(app.url("/audio"))
        .query(&[("url", to_file.as_str())])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let looping = format!("{base}/loop");
    let resp = app
        .client
        .get(app.url("/audio"))
        .query(&[("url", looping.as_str())])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 502);
}

#[tokio::test]
async fn audio_proxy_rejects_non_http_urls() {
    let app = common::spawn_app().await;

    for url in ["", "file:///etc/passwd", "ftp://example.com/a.mp3"] {
        let resp = app
            .client
            .get(app.url("/audio"))
            .query(&[("url", url)])
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400, "url {url:?} should be rejected");
    }
}

#[tokio::test]
async fn ytdl_validates_url_before_running() {
    let app = common::spawn_app().await;

    let resp = app
        .client
        .get(app.url("/ytdl"))
        .query(&[("url", "not-a-url")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn ytdl_without_binary_is_unavailable() {
    let app = common::spawn_app().await;

    let resp = app
        .client
        .get(app.url("/ytdl"))
        .query(&[("url", "https://www.youtube.com/watch?v=dQw4w9WgXcQ")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 500);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Audio lookup unavailable");
}
