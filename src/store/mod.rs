//! Persistence contract used by the request pipeline, plus PostgreSQL and in-memory backends.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::{ensure_database_exists, PgStore};

use crate::model::{Model, Record};
use crate::query::BulkFetchConfig;
use async_trait::async_trait;
use sqlx::postgres::PgDatabaseError;
use thiserror::Error;

/// A backend constraint or data error, with the PostgreSQL SQLSTATE vocabulary.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
#[error("{message} (SQLSTATE {code})")]
pub struct DatabaseFailure {
    pub code: String,
    pub message: String,
    pub detail: Option<String>,
    pub constraint: Option<String>,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error(transparent)]
    Database(DatabaseFailure),
    #[error("unknown field '{field}' on {table}")]
    UnknownField { table: String, field: String },
    #[error("database: {0}")]
    Sqlx(sqlx::Error),
    #[error("store: {0}")]
    Backend(String),
}

impl StoreError {
    /// Build a `Database` failure by hand, as PostgreSQL would report it.
    pub fn database(
        code: impl Into<String>,
        message: impl Into<String>,
        detail: Option<&str>,
        constraint: Option<&str>,
    ) -> Self {
        StoreError::Database(DatabaseFailure {
            code: code.into(),
            message: message.into(),
            detail: detail.map(str::to_string),
            constraint: constraint.map(str::to_string),
        })
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &e {
            if let Some(pg) = db.try_downcast_ref::<PgDatabaseError>() {
                return StoreError::Database(DatabaseFailure {
                    code: pg.code().to_string(),
                    message: pg.message().to_string(),
                    detail: pg.detail().map(str::to_string),
                    constraint: pg.constraint().map(str::to_string),
                });
            }
        }
        match e {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            other => StoreError::Sqlx(other),
        }
    }
}

/// Record persistence. Records are addressed by their `id` field.
#[async_trait]
pub trait Store: Send + Sync {
    /// Fill `record` from the row with its id. `NotFound` when absent.
    async fn load(&self, record: &mut Record) -> Result<(), StoreError>;

    /// Insert the set fields of `record`, then write back the id and store defaults.
    async fn insert(&self, record: &mut Record) -> Result<(), StoreError>;

    /// Write updatable fields and refresh `modified_at`. `NotFound` when absent.
    async fn update(&self, record: &mut Record) -> Result<(), StoreError>;

    /// `NotFound` when the row no longer exists.
    async fn delete(&self, record: &Record) -> Result<(), StoreError>;

    async fn bulk_fetch(&self, model: &Model, config: &BulkFetchConfig) -> Result<Vec<Record>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}
