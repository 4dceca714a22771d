//! Standard response envelope.

use crate::model::Record;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Serialize)]
pub struct Meta {
    pub success: bool,
    pub status_code: u16,
    pub status_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_details: Option<String>,
}

#[derive(Serialize)]
pub struct Envelope<T> {
    pub meta: Meta,
    pub result: T,
}

/// Render `result` inside the envelope with `status` as both HTTP status and `meta.status_code`.
pub fn envelope<T: Serialize>(status: StatusCode, result: T, error_details: Option<String>) -> Response {
    let body = Envelope {
        meta: Meta {
            success: status.is_success(),
            status_code: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            error_details,
        },
        result,
    };
    (status, Json(body)).into_response()
}

/// Successful pipeline outcome.
#[derive(Debug)]
pub enum Reply {
    One(Record),
    Many(Vec<Record>),
    Empty,
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        match self {
            Reply::One(record) => envelope(StatusCode::OK, record, None),
            Reply::Many(records) => envelope(StatusCode::OK, records, None),
            Reply::Empty => envelope(StatusCode::OK, serde_json::Value::Null, None),
        }
    }
}
