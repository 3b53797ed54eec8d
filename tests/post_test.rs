mod common;

use serde_json::{json, Value};

#[tokio::test]
async fn create_youtube_post_splits_title() {
    let app = common::spawn_app().await;
    let (user_id, token, username) = common::create_test_user(&app, "poster").await;

    let resp = app
        .client
        .post(app.url("/post"))
        .bearer_auth(&token)
        .json(&json!({ "url": "Listen: https://youtu.be/ytPost0001?si=share" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let post = &body["data"];
    assert_eq!(post["user_id"].as_i64().unwrap() as i32, user_id);
    assert_eq!(post["username"], username.as_str());
    assert_eq!(post["platform"], "youtube");
    assert_eq!(post["artist"], "Test Artist");
    assert_eq!(post["title"], "Song ytPost0001");
    assert_eq!(post["embed_url"], "https://www.youtube.com/embed/ytPost0001");
    assert_eq!(post["is_mine"], true);
    assert_eq!(post["is_first_discover"], true);
}

#[tokio::test]
async fn create_spotify_and_apple_posts() {
    let app = common::spawn_app().await;
    let (_, token, _) = common::create_test_user(&app, "multi").await;

    let resp = app
        .client
        .post(app.url("/post"))
        .bearer_auth(&token)
        .json(&json!({ "url": "spotify:track:sp0001" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["platform"], "spotify");
    assert_eq!(body["data"]["url"], "https://open.spotify.com/track/sp0001");
    assert_eq!(body["data"]["title"], "Track sp0001");
    assert_eq!(body["data"]["artist"], "Spotify Artist");

    let resp = app
        .client
        .post(app.url("/post"))
        .bearer_auth(&token)
        .json(&json!({ "url": "https://music.apple.com/us/album/some-album/111?i=777" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["platform"], "apple");
    assert_eq!(body["data"]["title"], "Apple Song 777");
    assert_eq!(body["data"]["artist"], "Apple Artist");
    assert_eq!(
        body["data"]["thumbnail"],
        "https://is1.mzstatic.com/777/300x300bb.jpg"
    );
}

#[tokio::test]
async fn empty_or_unsupported_url_creates_nothing() {
    let app = common::spawn_app().await;
    let (user_id, token, _) = common::create_test_user(&app, "badurl").await;

    for url in ["", "   ", "https://soundcloud.com/artist/track", "not a url at all"] {
        let resp = app
            .client
            .post(app.url("/post"))
            .bearer_auth(&token)
            .json(&json!({ "url": url }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400, "url {url:?} should be rejected");
    }

    assert_eq!(app.user_post_count(user_id).await, 0);
}

#[tokio::test]
async fn apple_lookup_miss_is_bad_gateway() {
    let app = common::spawn_app().await;
    let (user_id, token, _) = common::create_test_user(&app, "applemiss").await;

    let resp = app
        .client
        .post(app.url("/post"))
        .bearer_auth(&token)
        .json(&json!({
            "url": format!("https://music.apple.com/us/song/gone/{}", common::MISSING_SONG_ID)
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 502);
    assert_eq!(app.user_post_count(user_id).await, 0);
}

#[tokio::test]
async fn youtube_outage_degrades_to_defaults() {
    let app = common::spawn_app().await;
    let (_, token, _) = common::create_test_user(&app, "ytdown").await;

    let resp = app
        .client
        .post(app.url("/post"))
        .bearer_auth(&token)
        .json(&json!({
            "url": format!("https://www.youtube.com/watch?v={}", common::MISSING_VIDEO_ID)
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["title"], "YouTube Video");
    assert_eq!(body["data"]["artist"], "Unknown Artist");
}

#[tokio::test]
async fn owner_can_edit_post() {
    let app = common::spawn_app().await;
    let (_, token, _) = common::create_test_user(&app, "editor").await;
    let post_id = common::create_test_post(&app, &token, "ytEdit0001").await;

    let resp = app
        .client
        .put(app.url(&format!("/post/{}", post_id)))
        .bearer_auth(&token)
        .json(&json!({ "artist": "Corrected Artist", "title": "  " }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["artist"], "Corrected Artist");
    assert_eq!(body["data"]["title"], "Song ytEdit0001");
}

#[tokio::test]
async fn non_owner_cannot_delete_or_edit() {
    let app = common::spawn_app().await;
    let (owner_id, owner_token, _) = common::create_test_user(&app, "owner").await;
    let (_, other_token, _) = common::create_test_user(&app, "intruder").await;
    let post_id = common::create_test_post(&app, &owner_token, "ytOwn00001").await;

    let resp = app
        .client
        .delete(app.url(&format!("/post/{}", post_id)))
        .bearer_auth(&other_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    let resp = app
        .client
        .put(app.url(&format!("/post/{}", post_id)))
        .bearer_auth(&other_token)
        .json(&json!({ "title": "Hijacked" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    assert_eq!(app.user_post_count(owner_id).await, 1);

    // The owner can
    let resp = app
        .client
        .delete(app.url(&format!("/post/{}", post_id)))
        .bearer_auth(&owner_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(app.user_post_count(owner_id).await, 0);

    let resp = app
        .client
        .delete(app.url(&format!("/post/{}", post_id)))
        .bearer_auth(&owner_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}
