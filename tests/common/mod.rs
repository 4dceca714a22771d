#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use restcraft::{
    api_routes, load_from_str, resolve, AppState, Controller, FieldValue, LifecycleHooks, MemoryStore, Record, ResolvedApi, Store,
};
use serde_json::Value;
use tower::ServiceExt;

pub const USERS: usize = 0;
pub const PROFILE: usize = 1;
pub const POSTS: usize = 2;
pub const GROUPS: usize = 3;
pub const SETTINGS: usize = 4;

pub const API: &str = r#"{
    "models": [
        {"table": "users", "fields": [
            {"name": "name", "type": "string", "validation": {"max_length": 40}},
            {"name": "email", "type": "string", "nullable": true, "validation": {"format": "email"}},
            {"name": "age", "type": "int", "nullable": true, "validation": {"minimum": 0}},
            {"name": "profile_id", "type": "int", "nullable": true, "references": "profiles"}
        ], "unique": [["email"]]},
        {"table": "profiles", "fields": [
            {"name": "bio", "type": "string"}
        ]},
        {"table": "posts", "fields": [
            {"name": "user_id", "type": "int", "references": "users"},
            {"name": "title", "type": "string"}
        ]},
        {"table": "groups", "fields": [
            {"name": "name", "type": "string"}
        ]},
        {"table": "user_groups", "fields": [
            {"name": "user_id", "type": "int", "references": "users"},
            {"name": "group_id", "type": "int", "references": "groups"},
            {"name": "role", "type": "string", "nullable": true}
        ]},
        {"table": "settings", "fields": [
            {"name": "theme", "type": "string"}
        ]},
        {"table": "accounts", "fields": [
            {"name": "settings_id", "type": "int", "references": "settings"}
        ]}
    ],
    "controllers": [
        {"kind": "plain", "model": "users"},
        {"kind": "one_to_one", "base": "users", "nested": "profiles",
         "nested_name_singular": "profile", "foreign_reference": "profile_id"},
        {"kind": "one_to_many", "base": "users", "nested": "posts", "foreign_reference": "user_id"},
        {"kind": "many_to_many", "base": "users", "nested": "groups", "relation": "user_groups",
         "base_reference": "user_id", "nested_reference": "group_id"},
        {"kind": "one_to_one", "base": "accounts", "nested": "settings",
         "nested_name_singular": "settings", "foreign_reference": "settings_id"}
    ]
}"#;

pub struct TestApp {
    pub store: MemoryStore,
    pub api: ResolvedApi,
    pub router: Router,
}

pub fn setup_test_app() -> TestApp {
    setup_test_app_with_hooks(Vec::new())
}

/// Attach `hooks` to the controllers at the given indexes (see the constants above).
pub fn setup_test_app_with_hooks(hooks: Vec<(usize, LifecycleHooks)>) -> TestApp {
    setup_test_app_with(|controllers| {
        for (index, h) in hooks {
            controllers[index] = controllers[index].clone().with_hooks(h);
        }
    })
}

/// Let `customize` adjust the resolved controllers before they are routed.
pub fn setup_test_app_with(customize: impl FnOnce(&mut Vec<Controller>)) -> TestApp {
    let api = resolve(load_from_str(API).expect("Failed to parse API description"))
        .expect("Failed to resolve API description");
    let mut controllers = api.controllers.clone();
    customize(&mut controllers);
    let store = MemoryStore::new();
    let router = api_routes(controllers, AppState::new(store.clone()));
    TestApp { store, api, router }
}

impl TestApp {
    /// Insert a row directly through the store.
    pub async fn seed(&self, table: &str, values: &[(&str, FieldValue)]) -> Record {
        let mut record = self.api.model(table).expect("unknown table").build();
        for (name, value) in values {
            assert!(record.set(name, value.clone()), "unknown field {}", name);
        }
        self.store.insert(&mut record).await.expect("Failed to seed");
        record
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, json)
    }

    /// Request with an urlencoded body (already encoded).
    pub async fn form(&self, method: &str, uri: &str, body: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.form("GET", uri, "").await
    }

    pub async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        self.form("DELETE", uri, "").await
    }
}

/// The `result` of an envelope.
pub fn result(body: &Value) -> &Value {
    &body["result"]
}

pub fn error_details(body: &Value) -> &str {
    body["meta"]["error_details"].as_str().unwrap_or_default()
}

pub fn http_date(t: chrono::DateTime<chrono::Utc>) -> String {
    t.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
