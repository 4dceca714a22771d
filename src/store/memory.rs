//! In-memory store for tests and demos.
//!
//! Rows are kept per table in insertion order. Every `bulk_fetch` is logged so callers
//! can assert on what the pipeline asked for, and `fail_next` injects a one-shot error.

use super::{Store, StoreError};
use crate::model::{FieldValue, Model, Record, CREATED_AT_FIELD, ID_FIELD, MODIFIED_AT_FIELD};
use crate::query::{BulkFetchConfig, Direction};
use async_trait::async_trait;
use chrono::Utc;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

#[derive(Default)]
struct Table {
    next_id: i64,
    rows: Vec<Record>,
}

/// One logged `bulk_fetch` call.
#[derive(Clone, Debug)]
pub struct FetchLog {
    pub table: String,
    pub config: BulkFetchConfig,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<HashMap<String, Table>>>,
    fetches: Arc<Mutex<Vec<FetchLog>>>,
    /// Calls left to pass, then the error to return.
    fail_next: Arc<Mutex<Option<(usize, StoreError)>>>,
}

fn lock_err<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::Backend(format!("Failed to acquire lock: {}", e))
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next store call returns `err` instead of running.
    pub fn fail_next(&self, err: StoreError) {
        self.fail_after(0, err);
    }

    /// Let `calls` store calls run, then fail the one after with `err`.
    pub fn fail_after(&self, calls: usize, err: StoreError) {
        if let Ok(mut slot) = self.fail_next.lock() {
            *slot = Some((calls, err));
        }
    }

    /// Every `bulk_fetch` so far, oldest first.
    pub fn fetches(&self) -> Vec<FetchLog> {
        self.fetches.lock().map(|f| f.clone()).unwrap_or_default()
    }

    /// Snapshot of a row by id, bypassing the pipeline.
    pub fn get(&self, table: &str, id: i64) -> Option<Record> {
        let tables = self.tables.read().ok()?;
        tables.get(table)?.rows.iter().find(|r| r.id() == id).cloned()
    }

    pub fn count(&self, table: &str) -> usize {
        self.tables
            .read()
            .ok()
            .and_then(|t| t.get(table).map(|t| t.rows.len()))
            .unwrap_or(0)
    }

    fn take_failure(&self) -> Result<(), StoreError> {
        let mut slot = self.fail_next.lock().map_err(lock_err)?;
        match slot.take() {
            Some((0, err)) => Err(err),
            Some((n, err)) => {
                *slot = Some((n - 1, err));
                Ok(())
            }
            None => Ok(()),
        }
    }
}

fn compare(a: &Record, b: &Record, config: &BulkFetchConfig) -> Ordering {
    for o in &config.order_by {
        let ord = a
            .get(&o.field)
            .partial_cmp(&b.get(&o.field))
            .unwrap_or(Ordering::Equal);
        let ord = match o.direction {
            Direction::Asc => ord,
            Direction::Desc => ord.reverse(),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.id().cmp(&b.id())
}

#[async_trait]
impl Store for MemoryStore {
    async fn load(&self, record: &mut Record) -> Result<(), StoreError> {
        self.take_failure()?;
        let tables = self.tables.read().map_err(lock_err)?;
        let found = tables
            .get(record.table_name())
            .and_then(|t| t.rows.iter().find(|r| r.id() == record.id()))
            .ok_or(StoreError::NotFound)?;
        *record = found.clone();
        Ok(())
    }

    async fn insert(&self, record: &mut Record) -> Result<(), StoreError> {
        self.take_failure()?;
        let mut tables = self.tables.write().map_err(lock_err)?;
        let table = tables.entry(record.table_name().to_string()).or_default();
        table.next_id += 1;
        record.set_id(table.next_id);
        let now = Utc::now();
        for field in [CREATED_AT_FIELD, MODIFIED_AT_FIELD] {
            if record.get(field).is_some_and(FieldValue::is_null) {
                record.set(field, now);
            }
        }
        table.rows.push(record.clone());
        Ok(())
    }

    async fn update(&self, record: &mut Record) -> Result<(), StoreError> {
        self.take_failure()?;
        let mut tables = self.tables.write().map_err(lock_err)?;
        let stored = tables
            .get_mut(record.table_name())
            .and_then(|t| t.rows.iter_mut().find(|r| r.id() == record.id()))
            .ok_or(StoreError::NotFound)?;
        for (def, value) in record.iter() {
            if def.updatable && def.name != ID_FIELD {
                stored.set(&def.name, value.clone());
            }
        }
        if stored.config().has_field(MODIFIED_AT_FIELD) {
            stored.set(MODIFIED_AT_FIELD, Utc::now());
        }
        *record = stored.clone();
        Ok(())
    }

    async fn delete(&self, record: &Record) -> Result<(), StoreError> {
        self.take_failure()?;
        let mut tables = self.tables.write().map_err(lock_err)?;
        let table = tables.get_mut(record.table_name()).ok_or(StoreError::NotFound)?;
        let before = table.rows.len();
        table.rows.retain(|r| r.id() != record.id());
        if table.rows.len() == before {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn bulk_fetch(&self, model: &Model, config: &BulkFetchConfig) -> Result<Vec<Record>, StoreError> {
        self.fetches.lock().map_err(lock_err)?.push(FetchLog {
            table: model.table_name.clone(),
            config: config.clone(),
        });
        self.take_failure()?;
        for field in config
            .predicates
            .iter()
            .map(|p| &p.field)
            .chain(config.order_by.iter().map(|o| &o.field))
        {
            if !model.has_field(field) {
                return Err(StoreError::UnknownField {
                    table: model.table_name.clone(),
                    field: field.clone(),
                });
            }
        }
        let tables = self.tables.read().map_err(lock_err)?;
        let Some(table) = tables.get(&model.table_name) else {
            return Ok(Vec::new());
        };
        let mut rows: Vec<Record> = table
            .rows
            .iter()
            .filter(|r| {
                config
                    .predicates
                    .iter()
                    .all(|p| r.get(&p.field).is_some_and(|v| p.matches(v)))
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| compare(a, b, config));
        let offset = usize::try_from(config.offset).unwrap_or(0);
        let limit = config
            .limit
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(usize::MAX);
        Ok(rows.into_iter().skip(offset).take(limit).collect())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.take_failure()
    }
}
