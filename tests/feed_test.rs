mod common;

use serde_json::Value;

async fn feed(app: &common::TestApp, token: &str, query: &str) -> Value {
    let resp = app
        .client
        .get(app.url(&format!("/feed{}", query)))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    resp.json().await.unwrap()
}

fn ids_by(items: &Value, user_id: i32) -> Vec<i64> {
    items
        .as_array()
        .unwrap()
        .iter()
        .filter(|item| item["user_id"].as_i64() == Some(user_id as i64))
        .map(|item| item["id"].as_i64().unwrap())
        .collect()
}

#[tokio::test]
async fn global_feed_is_newest_first() {
    let app = common::spawn_app().await;
    let (user_id, token, _) = common::create_test_user(&app, "feeder").await;
    let first = common::create_test_post(&app, &token, "ytFeed0001").await;
    let second = common::create_test_post(&app, &token, "ytFeed0002").await;

    let body = feed(&app, &token, "?per_page=100").await;
    let ids = ids_by(&body["data"]["items"], user_id);
    assert_eq!(ids, vec![second as i64, first as i64]);
}

#[tokio::test]
async fn following_feed_has_own_and_followed_posts_only() {
    let app = common::spawn_app().await;
    let (me, my_token, _) = common::create_test_user(&app, "reader").await;
    let (friend, friend_token, _) = common::create_test_user(&app, "friend").await;
    let (stranger, stranger_token, _) = common::create_test_user(&app, "stranger").await;

    common::create_test_post(&app, &my_token, "ytFoll0001").await;
    common::create_test_post(&app, &friend_token, "ytFoll0002").await;
    common::create_test_post(&app, &stranger_token, "ytFoll0003").await;

    app.client
        .post(app.url(&format!("/follow/{}", friend)))
        .bearer_auth(&my_token)
        .send()
        .await
        .unwrap();

    let body = feed(&app, &my_token, "?type=following").await;
    let items = &body["data"]["items"];
    assert_eq!(ids_by(items, me).len(), 1);
    assert_eq!(ids_by(items, friend).len(), 1);
    assert!(ids_by(items, stranger).is_empty());
    assert_eq!(body["data"]["total"], 2);
}

#[tokio::test]
async fn first_discover_only_for_earliest_post_of_a_url() {
    let app = common::spawn_app().await;
    let (first_user, first_token, _) = common::create_test_user(&app, "pioneer").await;
    let (second_user, second_token, _) = common::create_test_user(&app, "latecomer").await;

    common::create_test_post(&app, &first_token, "ytDisc0001").await;
    common::create_test_post(&app, &second_token, "ytDisc0001").await;

    let body = feed(&app, &second_token, "?per_page=100").await;
    for item in body["data"]["items"].as_array().unwrap() {
        let uid = item["user_id"].as_i64().unwrap() as i32;
        if uid == first_user {
            assert_eq!(item["is_first_discover"], true);
            assert_eq!(item["is_mine"], false);
        } else if uid == second_user {
            assert_eq!(item["is_first_discover"], false);
            assert_eq!(item["is_mine"], true);
        }
    }
}

#[tokio::test]
async fn feed_pagination_metadata() {
    let app = common::spawn_app().await;
    let (_, token, _) = common::create_test_user(&app, "pager").await;
    common::create_test_post(&app, &token, "ytPage0001").await;

    let body = feed(&app, &token, "?page=1&per_page=1").await;
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"]["per_page"], 1);
    assert!(body["data"]["total"].as_u64().unwrap() >= 1);
}

#[tokio::test]
async fn huge_page_numbers_return_an_empty_page() {
    let app = common::spawn_app().await;
    let (user_id, token, _) = common::create_test_user(&app, "farpage").await;
    common::create_test_post(&app, &token, "ytFarPage01").await;

    let body = feed(&app, &token, "?page=18446744073709551615&per_page=100").await;
    assert!(body["data"]["items"].as_array().unwrap().is_empty());
    assert!(body["data"]["total"].as_u64().unwrap() >= 1);

    let resp = app
        .client
        .get(app.url(&format!("/users/{}/followers?page=18446744073709551615", user_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert!(body["data"]["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn feed_requires_auth() {
    let app = common::spawn_app().await;
    let resp = app.client.get(app.url("/feed")).send().await.unwrap();
    assert_eq!(resp.status(), 401);
}
