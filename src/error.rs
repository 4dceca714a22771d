//! Typed errors and HTTP mapping.

use crate::hooks::Halt;
use crate::response::envelope;
use crate::store::StoreError;
use crate::validation::ValidationErrors;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

const NOT_NULL_VIOLATION: &str = "23502";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const INVALID_TEXT_REPRESENTATION: &str = "22P02";
const UNIQUE_VIOLATION: &str = "23505";
const CHECK_VIOLATION: &str = "23514";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing reference: {kind} '{name}'")]
    MissingReference { kind: &'static str, name: String },
    #[error("invalid field {table}.{field}: {reason}")]
    InvalidField {
        table: String,
        field: String,
        reason: String,
    },
    #[error("duplicate {kind}: {name}")]
    Duplicate { kind: &'static str, name: String },
    #[error("config load: {0}")]
    Load(String),
    #[error("validation: {0}")]
    Validation(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    #[error("not found")]
    NotFound,
    #[error("conflict")]
    Conflict(Option<String>),
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),
    #[error("method not allowed")]
    MethodNotAllowed,
    #[error("internal error")]
    Internal(Option<String>),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("request handled by hook")]
    Halted(Halt),
}

impl From<Halt> for AppError {
    fn from(h: Halt) -> Self {
        AppError::Halted(h)
    }
}

impl AppError {
    /// Map a failed insert or update to a client-facing error by SQLSTATE.
    pub fn from_write(e: StoreError) -> Self {
        let mapped = match &e {
            StoreError::Database(failure) => match failure.code.as_str() {
                NOT_NULL_VIOLATION | FOREIGN_KEY_VIOLATION => Some(AppError::BadRequest(
                    failure.detail.clone().unwrap_or_else(|| failure.message.clone()),
                )),
                INVALID_TEXT_REPRESENTATION => Some(AppError::BadRequest(failure.message.clone())),
                UNIQUE_VIOLATION => Some(AppError::Conflict(failure.detail.clone())),
                CHECK_VIOLATION => Some(AppError::BadRequest(format!(
                    "Failed to satisfy constraint '{}'",
                    failure.constraint.as_deref().unwrap_or_default()
                ))),
                _ => None,
            },
            _ => None,
        };
        match mapped {
            Some(err) => err,
            None => AppError::Store(e),
        }
    }

    /// Map a failed load: a missing row is 404, anything else 500.
    pub fn from_load(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => AppError::NotFound,
            other => AppError::Store(other),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Config(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::PreconditionFailed(_) => StatusCode::PRECONDITION_FAILED,
            AppError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Halted(h) => h.status(),
        }
    }

    fn details(&self) -> Option<String> {
        match self {
            AppError::BadRequest(msg) | AppError::PreconditionFailed(msg) => Some(msg.clone()),
            AppError::Validation(errs) => Some(errs.to_string()),
            AppError::Conflict(detail) | AppError::Internal(detail) => detail.clone(),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            AppError::Halted(_) => {}
            AppError::Store(e) => tracing::error!(error = %e, "store failure"),
            AppError::Config(e) => tracing::error!(error = %e, "config failure"),
            AppError::Internal(detail) => tracing::error!(detail = ?detail, "internal error"),
            other => tracing::debug!(status = %status, error = %other, "request rejected"),
        }
        if let AppError::Halted(halt) = self {
            return halt.into_response();
        }
        let details = self.details();
        envelope(status, serde_json::Value::Null, details)
    }
}
