use axum::http::StatusCode;
use restcraft::query::PredicateKind;
use restcraft::{Controller, FieldValue};
use serde_json::json;

mod common;
use common::{result, setup_test_app, setup_test_app_with, TestApp, POSTS};

async fn two_users_with_posts() -> TestApp {
    seed_posts(setup_test_app()).await
}

async fn seed_posts(app: TestApp) -> TestApp {
    app.seed("users", &[("name", "ada".into())]).await;
    app.seed("users", &[("name", "grace".into())]).await;
    app.seed("posts", &[("user_id", 1i64.into()), ("title", "engines".into())]).await;
    app.seed("posts", &[("user_id", 2i64.into()), ("title", "compilers".into())]).await;
    app.seed("posts", &[("user_id", 1i64.into()), ("title", "notes".into())]).await;
    app
}

#[tokio::test]
async fn test_create_takes_parent_from_path() {
    let app = setup_test_app();
    app.seed("users", &[("name", "ada".into())]).await;
    app.seed("users", &[("name", "grace".into())]).await;

    let (status, body) = app.form("POST", "/users/1/posts", "title=engines&user_id=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result(&body)["user_id"], json!(1));
    assert_eq!(result(&body)["title"], json!("engines"));
}

#[tokio::test]
async fn test_create_for_missing_parent() {
    let app = setup_test_app();

    let (status, _) = app.form("POST", "/users/3/posts", "title=orphan").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(app.store.count("posts"), 0);
}

#[tokio::test]
async fn test_index_is_scoped_to_parent() {
    let app = two_users_with_posts().await;

    let (status, body) = app.get("/users/1/posts?sort=title").await;
    assert_eq!(status, StatusCode::OK);
    let titles: Vec<&str> = result(&body)
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["engines", "notes"]);

    let config = &app.store.fetches()[0].config;
    assert_eq!(config.predicates[0].field, "user_id");
    assert_eq!(config.predicates[0].kind, PredicateKind::Equal);
    assert_eq!(config.predicates[0].values, vec![FieldValue::Int(1)]);

    let (status, _) = app.get("/users/9/posts").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_show_requires_ownership() {
    let app = two_users_with_posts().await;

    let (status, body) = app.get("/users/1/posts/3").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result(&body)["title"], json!("notes"));

    let (status, _) = app.get("/users/1/posts/2").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_update_keeps_owner() {
    let app = two_users_with_posts().await;

    let (status, body) = app.form("PUT", "/users/1/posts/1", "title=analytical&user_id=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result(&body)["title"], json!("analytical"));
    assert_eq!(result(&body)["user_id"], json!(1));

    let (status, _) = app.form("PUT", "/users/2/posts/1", "title=stolen").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_owned_child() {
    let app = two_users_with_posts().await;

    let (status, _) = app.delete("/users/2/posts/1").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(app.store.count("posts"), 3);

    let (status, _) = app.delete("/users/1/posts/1").await;
    assert_eq!(status, StatusCode::OK);
    assert!(app.store.get("posts", 1).is_none());
}

#[tokio::test]
async fn test_custom_belongs_to_replaces_reference_check() {
    // User 1 moderates every post. Posts titled "notes" are hidden from everyone.
    let app = seed_posts(setup_test_app_with(|controllers| {
        let relationship = controllers[POSTS].relationship().clone().with_belongs_to(|parent, child| {
            let owner = parent.id() == 1 || child.get_i64("user_id") == parent.id();
            owner && child.get("title") != Some(&FieldValue::from("notes"))
        });
        controllers[POSTS] = Controller::new(relationship);
    }))
    .await;

    let (status, body) = app.get("/users/1/posts/2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result(&body)["user_id"], json!(2));

    let (status, _) = app.get("/users/1/posts/3").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.form("PUT", "/users/1/posts/3", "title=public").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(app.store.get("posts", 3).unwrap().get("title"), Some(&FieldValue::from("notes")));

    let (status, _) = app.delete("/users/2/posts/1").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.delete("/users/1/posts/2").await;
    assert_eq!(status, StatusCode::OK);
    assert!(app.store.get("posts", 2).is_none());
}
