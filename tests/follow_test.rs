mod common;

use earshot::services::follow::FollowService;
use serde_json::Value;

#[tokio::test]
async fn toggle_follow() {
    let app = common::spawn_app().await;
    let (_user_id, token, _) = common::create_test_user(&app, "follower").await;
    let (target_id, _, _) = common::create_test_user(&app, "target").await;

    // Follow
    let resp = app
        .client
        .post(app.url(&format!("/follow/{}", target_id)))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["following"], true);
    assert_eq!(body["data"]["followers"], 1);

    // Check followers
    let resp = app
        .client
        .get(app.url(&format!("/users/{}/followers", target_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"]["total"], 1);

    // Unfollow (toggle)
    let resp = app
        .client
        .post(app.url(&format!("/follow/{}", target_id)))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["following"], false);
    assert_eq!(body["data"]["followers"], 0);
}

#[tokio::test]
async fn follow_and_unfollow_are_idempotent() {
    let app = common::spawn_app().await;
    let (user_id, _, _) = common::create_test_user(&app, "idem").await;
    let (target_id, _, _) = common::create_test_user(&app, "idemtarget").await;
    let service = FollowService::new(app.db.clone());

    assert!(service.follow(user_id, target_id).await.unwrap());
    assert!(!service.follow(user_id, target_id).await.unwrap());
    assert_eq!(service.counts(target_id).await.unwrap().followers, 1);

    assert!(service.unfollow(user_id, target_id).await.unwrap());
    assert!(!service.unfollow(user_id, target_id).await.unwrap());
    assert_eq!(service.counts(target_id).await.unwrap().followers, 0);
}

#[tokio::test]
async fn self_follow_error() {
    let app = common::spawn_app().await;
    let (user_id, token, _) = common::create_test_user(&app, "selffollow").await;

    let resp = app
        .client
        .post(app.url(&format!("/follow/{}", user_id)))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "You cannot follow yourself");
}

#[tokio::test]
async fn follow_unknown_user_is_not_found() {
    let app = common::spawn_app().await;
    let (_, token, _) = common::create_test_user(&app, "ghostfan").await;

    let resp = app
        .client
        .post(app.url("/follow/99999999"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let resp = app
        .client
        .get(app.url("/users/99999999/following"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}
