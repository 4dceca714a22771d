use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use chrono::{Duration, Utc};
use restcraft::query::{Direction, PredicateKind};
use restcraft::{FieldValue, StoreError};
use serde_json::json;

mod common;
use common::{error_details, http_date, result, setup_test_app};

#[tokio::test]
async fn test_create_returns_stored_record() {
    let app = setup_test_app();

    let (status, body) = app.form("POST", "/users", "name=ada&email=ada%40example.com&age=36").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["success"], json!(true));
    assert_eq!(body["meta"]["status_code"], json!(200));

    let user = result(&body);
    assert_eq!(user["id"], json!(1));
    assert_eq!(user["name"], json!("ada"));
    assert_eq!(user["email"], json!("ada@example.com"));
    assert_eq!(user["age"], json!(36));
    assert_eq!(user["profile_id"], json!(null));
    assert!(user["created_at"].is_string());
    assert_eq!(app.store.count("users"), 1);
}

#[tokio::test]
async fn test_create_accepts_json_body() {
    let app = setup_test_app();

    let request = Request::builder()
        .method("POST")
        .uri("/users")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({"name": "grace", "age": 85, "email": null}).to_string()))
        .unwrap();
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result(&body)["age"], json!(85));
    assert_eq!(result(&body)["email"], json!(null));
}

#[tokio::test]
async fn test_create_reports_every_invalid_field() {
    let app = setup_test_app();

    let (status, body) = app.form("POST", "/users", "email=nope&age=-1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["meta"]["success"], json!(false));
    assert_eq!(body["result"], json!(null));
    let details = error_details(&body);
    assert!(details.contains("Parameter 'name' is required"), "{}", details);
    assert!(details.contains("Parameter 'email' must be a valid email"), "{}", details);
    assert!(details.contains("Parameter 'age' must be at least 0"), "{}", details);
    assert_eq!(app.store.count("users"), 0);
}

#[tokio::test]
async fn test_create_rejects_non_integer() {
    let app = setup_test_app();

    let (status, body) = app.form("POST", "/users", "name=ada&profile_id=abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_details(&body), "Parameter 'profile_id' must be a valid integer");

    let (status, body) = app.form("POST", "/users", "name=ada&age=old").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_details(&body), "Parameter 'age' must be a number");
}

#[tokio::test]
async fn test_show_and_missing_record() {
    let app = setup_test_app();
    app.seed("users", &[("name", "ada".into())]).await;

    let (status, body) = app.get("/users/1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result(&body)["name"], json!("ada"));

    let (status, body) = app.get("/users/99").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["meta"]["status_text"], json!("Not Found"));

    let (status, body) = app.get("/users/abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_details(&body), "Parameter 'id' must be a valid integer");
}

#[tokio::test]
async fn test_index_uses_default_paging() {
    let app = setup_test_app();
    for name in ["a", "b", "c"] {
        app.seed("users", &[("name", name.into())]).await;
    }

    let (status, body) = app.get("/users").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result(&body).as_array().unwrap().len(), 3);

    let fetches = app.store.fetches();
    assert_eq!(fetches.len(), 1);
    assert_eq!(fetches[0].table, "users");
    assert_eq!(fetches[0].config.limit, Some(20));
    assert_eq!(fetches[0].config.offset, 0);
    assert_eq!(fetches[0].config.order_by[0].field, "created_at");
}

#[tokio::test]
async fn test_index_paging_and_sort() {
    let app = setup_test_app();
    for name in ["carol", "alice", "dave", "bob"] {
        app.seed("users", &[("name", name.into())]).await;
    }

    let (status, body) = app.get("/users?limit=2&offset=1&sort=-name").await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = result(&body)
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["carol", "bob"]);
    let config = &app.store.fetches()[0].config;
    assert_eq!(config.order_by[0].direction, Direction::Desc);
}

#[tokio::test]
async fn test_index_rejects_out_of_range_limits() {
    let app = setup_test_app();

    for limit in ["0", "5001"] {
        let (status, _) = app.get(&format!("/users?limit={}", limit)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "limit={}", limit);
    }
    let (status, _) = app.get("/users?limit=5000").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_index_rejects_unknown_sort_field() {
    let app = setup_test_app();

    let (status, body) = app.get("/users?sort=name,-password").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        error_details(&body),
        "Parameter 'sort' must only contain fields within the model. Input 'password' is invalid."
    );
    assert!(app.store.fetches().is_empty());
}

#[tokio::test]
async fn test_index_if_modified_since() {
    let app = setup_test_app();
    app.seed("users", &[("name", "ada".into())]).await;

    let request = Request::builder()
        .uri("/users")
        .header(header::IF_MODIFIED_SINCE, http_date(Utc::now() + Duration::hours(1)))
        .body(Body::empty())
        .unwrap();
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result(&body), &json!([]));

    let predicate = &app.store.fetches()[0].config.predicates[0];
    assert_eq!(predicate.field, "modified_at");
    assert_eq!(predicate.kind, PredicateKind::GreaterThan);
}

#[tokio::test]
async fn test_update_changes_only_submitted_fields() {
    let app = setup_test_app();
    app.seed("users", &[("name", "ada".into()), ("age", 36i64.into())]).await;

    let (status, body) = app.form("PUT", "/users/1", "age=37").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result(&body)["name"], json!("ada"));
    assert_eq!(result(&body)["age"], json!(37));

    let (status, body) = app.form("PUT", "/users/1", "name=").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_details(&body), "Parameter 'name' is required");
}

#[tokio::test]
async fn test_update_if_unmodified_since() {
    let app = setup_test_app();
    app.seed("users", &[("name", "ada".into())]).await;

    let stale = Request::builder()
        .method("PUT")
        .uri("/users/1")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header(header::IF_UNMODIFIED_SINCE, http_date(Utc::now() - Duration::hours(1)))
        .body(Body::from("name=eve"))
        .unwrap();
    let (status, body) = app.send(stale).await;
    assert_eq!(status, StatusCode::PRECONDITION_FAILED);
    assert_eq!(
        error_details(&body),
        "The `If-Unmodified-Since` condition is not satisfied"
    );
    let stored = app.store.get("users", 1).unwrap();
    assert_eq!(stored.get("name"), Some(&FieldValue::from("ada")));

    let fresh = Request::builder()
        .method("PUT")
        .uri("/users/1")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header(header::IF_UNMODIFIED_SINCE, http_date(Utc::now() + Duration::hours(1)))
        .body(Body::from("name=eve"))
        .unwrap();
    let (status, body) = app.send(fresh).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result(&body)["name"], json!("eve"));
}

#[tokio::test]
async fn test_update_missing_record_is_not_found() {
    let app = setup_test_app();
    app.seed("users", &[("name", "ada".into())]).await;

    let (status, _) = app.form("PUT", "/users/99", "name=eve").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let long_name = "x".repeat(41);
    let (status, _) = app.form("PUT", "/users/99", &format!("name={}&age=-1", long_name)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(app.store.count("users"), 1);
}

#[tokio::test]
async fn test_delete_then_show_is_not_found() {
    let app = setup_test_app();
    app.seed("users", &[("name", "ada".into())]).await;

    let (status, body) = app.delete("/users/1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result(&body), &json!(null));
    assert_eq!(app.store.count("users"), 0);

    let (status, _) = app.delete("/users/1").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_write_errors_map_to_http() {
    let app = setup_test_app();

    app.store.fail_next(StoreError::database(
        "23505",
        "duplicate key value violates unique constraint",
        Some("Key (email)=(ada@example.com) already exists."),
        Some("users_email_key"),
    ));
    let (status, body) = app.form("POST", "/users", "name=ada&email=ada%40example.com").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_details(&body), "Key (email)=(ada@example.com) already exists.");

    app.store.fail_next(StoreError::database("23514", "check failed", None, Some("age_positive")));
    let (status, body) = app.form("POST", "/users", "name=ada").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_details(&body), "Failed to satisfy constraint 'age_positive'");

    app.store.fail_next(StoreError::Backend("connection reset".into()));
    let (status, body) = app.get("/users/1").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["meta"]["success"], json!(false));
}

#[tokio::test]
async fn test_large_form_body_is_accepted() {
    let app = setup_test_app();
    app.seed("users", &[("name", "ada".into())]).await;
    let bio = "b".repeat(3 * 1024 * 1024);

    let (status, body) = app.form("POST", "/users/1/profile", &format!("bio={}", bio)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result(&body)["bio"].as_str().map(str::len), Some(bio.len()));
}

#[tokio::test]
async fn test_common_routes() {
    let app = setup_test_app();

    let (status, body) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("ok"));

    app.store.fail_next(StoreError::Backend("down".into()));
    let (status, _) = app.get("/ready").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}
