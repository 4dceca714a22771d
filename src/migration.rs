//! Apply a resolved API description to the database: one table per model, then foreign keys.

use crate::config::{ApiDescription, FieldDescription, ModelDescription};
use crate::model::{Primitive, CREATED_AT_FIELD, ID_FIELD, MODIFIED_AT_FIELD};
use crate::sql::quoted;
use crate::store::StoreError;
use sqlx::PgPool;

fn column_def(f: &FieldDescription) -> String {
    match f.name.as_str() {
        ID_FIELD => format!("{} BIGSERIAL PRIMARY KEY", quoted(ID_FIELD)),
        CREATED_AT_FIELD | MODIFIED_AT_FIELD => format!("{} TIMESTAMPTZ NOT NULL DEFAULT NOW()", quoted(&f.name)),
        _ => {
            let mut def = format!("{} {}", quoted(&f.name), Primitive::from(f.type_).pg_type().to_uppercase());
            if !f.nullable {
                def.push_str(" NOT NULL");
            }
            def
        }
    }
}

/// `CREATE TABLE IF NOT EXISTS` for one model, without foreign keys.
pub fn table_ddl(m: &ModelDescription) -> String {
    let mut defs: Vec<String> = m.fields.iter().map(column_def).collect();
    for columns in &m.unique {
        let cols: Vec<String> = columns.iter().map(|c| quoted(c)).collect();
        defs.push(format!("UNIQUE ({})", cols.join(", ")));
    }
    for ch in &m.check {
        defs.push(format!("CONSTRAINT {} CHECK ({})", quoted(&ch.name), ch.expression));
    }
    format!("CREATE TABLE IF NOT EXISTS {} (\n  {}\n)", quoted(&m.table), defs.join(",\n  "))
}

fn foreign_key_name(m: &ModelDescription, f: &FieldDescription) -> String {
    format!("{}_{}_fkey", m.table, f.name)
}

/// Drop-then-add statements for every `references` field of `m`.
pub fn foreign_key_ddl(m: &ModelDescription) -> Vec<String> {
    m.fields
        .iter()
        .filter_map(|f| f.references.as_ref().map(|target| (f, target)))
        .flat_map(|(f, target)| {
            let name = quoted(&foreign_key_name(m, f));
            let table = quoted(&m.table);
            [
                format!("ALTER TABLE {} DROP CONSTRAINT IF EXISTS {}", table, name),
                format!(
                    "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
                    table,
                    name,
                    quoted(&f.name),
                    quoted(target),
                    quoted(ID_FIELD)
                ),
            ]
        })
        .collect()
}

/// Create every model's table, then add foreign keys once all targets exist.
/// Expects a normalized description (see [`crate::config::resolve`]).
pub async fn apply_migrations(pool: &PgPool, desc: &ApiDescription) -> Result<(), StoreError> {
    for m in &desc.models {
        let sql = table_ddl(m);
        tracing::debug!(sql = %sql, "migration");
        sqlx::query(&sql).execute(pool).await?;
        tracing::info!(table = %m.table, "table ready");
    }
    for m in &desc.models {
        for sql in foreign_key_ddl(m) {
            tracing::debug!(sql = %sql, "migration");
            sqlx::query(&sql).execute(pool).await?;
        }
    }
    Ok(())
}
