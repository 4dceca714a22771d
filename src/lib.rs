//! Restcraft SDK: relationship-aware REST CRUD controllers derived from model descriptions.

pub mod config;
pub mod controller;
pub mod error;
pub mod extractors;
pub mod hooks;
pub mod migration;
pub mod model;
pub mod precondition;
pub mod query;
pub mod response;
pub mod routes;
pub mod sql;
pub mod state;
pub mod store;
pub mod validation;

pub use config::{load_from_file, load_from_str, resolve, ApiDescription, ResolvedApi};
pub use controller::{Controller, Method, Relationship};
pub use error::{AppError, ConfigError};
pub use hooks::{Halt, LifecycleHooks};
pub use migration::apply_migrations;
pub use model::{FieldDef, FieldKind, FieldValue, Model, ModelConfig, Primitive, Record};
pub use response::Reply;
pub use routes::{api_routes, common_routes};
pub use state::AppState;
pub use store::{ensure_database_exists, MemoryStore, PgStore, Store, StoreError};
