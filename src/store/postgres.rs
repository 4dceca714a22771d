//! PostgreSQL-backed store.

use super::{Store, StoreError};
use crate::model::{FieldKind, FieldValue, Model, ModelConfig, Primitive, Record};
use crate::query::BulkFetchConfig;
use crate::sql::{self, QueryBuf};
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgRow};
use sqlx::{ConnectOptions, Row};
use std::str::FromStr;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        PgStore { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(PgStore { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch_optional(&self, model: &ModelConfig, q: &QueryBuf) -> Result<Option<PgRow>, StoreError> {
        tracing::debug!(table = %model.table_name, sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(p.clone());
        }
        Ok(query.fetch_optional(&self.pool).await?)
    }

    async fn fetch_all(&self, model: &ModelConfig, q: &QueryBuf) -> Result<Vec<PgRow>, StoreError> {
        tracing::debug!(table = %model.table_name, sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(p.clone());
        }
        Ok(query.fetch_all(&self.pool).await?)
    }
}

#[async_trait]
impl Store for PgStore {
    async fn load(&self, record: &mut Record) -> Result<(), StoreError> {
        let q = sql::select_by_id(record.config(), record.id());
        let row = self
            .fetch_optional(record.config(), &q)
            .await?
            .ok_or(StoreError::NotFound)?;
        fill_record(&row, record)
    }

    async fn insert(&self, record: &mut Record) -> Result<(), StoreError> {
        let q = sql::insert(record);
        let row = self
            .fetch_optional(record.config(), &q)
            .await?
            .ok_or(StoreError::NotFound)?;
        fill_record(&row, record)
    }

    async fn update(&self, record: &mut Record) -> Result<(), StoreError> {
        let q = sql::update(record);
        let row = self
            .fetch_optional(record.config(), &q)
            .await?
            .ok_or(StoreError::NotFound)?;
        fill_record(&row, record)
    }

    async fn delete(&self, record: &Record) -> Result<(), StoreError> {
        let q = sql::delete(record.config(), record.id());
        match self.fetch_optional(record.config(), &q).await? {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound),
        }
    }

    async fn bulk_fetch(&self, model: &Model, config: &BulkFetchConfig) -> Result<Vec<Record>, StoreError> {
        let q = sql::select_list(model, config)?;
        let rows = self.fetch_all(model, &q).await?;
        rows.iter()
            .map(|row| {
                let mut record = model.build();
                fill_record(row, &mut record)?;
                Ok(record)
            })
            .collect()
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

fn fill_record(row: &PgRow, record: &mut Record) -> Result<(), StoreError> {
    let fields: Vec<(String, FieldKind)> = record
        .config()
        .fields
        .iter()
        .map(|f| (f.name.clone(), f.kind))
        .collect();
    for (name, kind) in fields {
        let value = cell_to_value(row, &name, kind.primitive())?;
        record.set(&name, value);
    }
    Ok(())
}

/// Decode one column, accepting the narrower PostgreSQL types a hand-made schema may use.
fn cell_to_value(row: &PgRow, name: &str, primitive: Primitive) -> Result<FieldValue, StoreError> {
    Ok(match primitive {
        Primitive::Int => {
            if let Ok(v) = row.try_get::<Option<i64>, _>(name) {
                v.into()
            } else if let Ok(v) = row.try_get::<Option<i32>, _>(name) {
                v.map(i64::from).into()
            } else {
                row.try_get::<Option<i16>, _>(name)?.map(i64::from).into()
            }
        }
        Primitive::Float => {
            if let Ok(v) = row.try_get::<Option<f64>, _>(name) {
                v.into()
            } else {
                row.try_get::<Option<f32>, _>(name)?.map(f64::from).into()
            }
        }
        Primitive::Bool => row.try_get::<Option<bool>, _>(name)?.into(),
        Primitive::String => row.try_get::<Option<String>, _>(name)?.into(),
        Primitive::Time => {
            if let Ok(v) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name) {
                v.into()
            } else {
                row.try_get::<Option<chrono::NaiveDateTime>, _>(name)?
                    .map(|t| t.and_utc())
                    .into()
            }
        }
    })
}

/// Ensure the database in `database_url` exists; create it if not. Connects to the
/// default `postgres` database to run CREATE DATABASE. Call before creating the main pool.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), StoreError> {
    let (admin_url, db_name) = parse_db_name_from_url(database_url)?;
    if db_name.is_empty() || db_name == "postgres" {
        return Ok(());
    }
    let opts = PgConnectOptions::from_str(&admin_url)
        .map_err(|e| StoreError::Backend(format!("invalid DATABASE_URL: {}", e)))?;
    let mut conn: sqlx::PgConnection = opts.connect().await?;
    let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
        .bind(&db_name)
        .fetch_one(&mut conn)
        .await?;
    if !exists.0 {
        tracing::info!(database = %db_name, "creating database");
        sqlx::query(&format!("CREATE DATABASE {}", quote_ident(&db_name)))
            .execute(&mut conn)
            .await?;
    }
    Ok(())
}

fn parse_db_name_from_url(url: &str) -> Result<(String, String), StoreError> {
    let path_start = url
        .rfind('/')
        .ok_or_else(|| StoreError::Backend("DATABASE_URL: no path".into()))?
        + 1;
    let path_and_query = url.get(path_start..).unwrap_or("");
    let db_name = path_and_query.split('?').next().unwrap_or("").trim();
    let base = url.get(..path_start).unwrap_or(url);
    Ok((format!("{}postgres", base), db_name.to_string()))
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
