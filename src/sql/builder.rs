//! Builds parameterized SELECT, INSERT, UPDATE, DELETE from a model and its records.

use super::PgBindValue;
use crate::model::{FieldValue, ModelConfig, Primitive, Record, ID_FIELD, MODIFIED_AT_FIELD};
use crate::query::{BulkFetchConfig, Direction, PredicateKind};
use crate::store::StoreError;

/// Quote identifier for PostgreSQL (safe: only from config).
pub fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

#[derive(Debug)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<PgBindValue>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: PgBindValue) -> u32 {
        let n = self.params.len() as u32 + 1;
        self.params.push(v);
        n
    }

    /// Push a value and return its placeholder cast to the field's column type.
    fn placeholder(&mut self, model: &ModelConfig, field: &str, v: FieldValue) -> String {
        let n = self.push_param(PgBindValue::from(&v));
        match model.field_def(field) {
            Some(def) => format!("${}::{}", n, def.kind.primitive().pg_type()),
            None => format!("${}", n),
        }
    }

    /// Push every value as one array parameter, whatever the list length.
    fn array_placeholder(&mut self, model: &ModelConfig, field: &str, values: &[FieldValue]) -> String {
        let primitive = model
            .field_def(field)
            .map(|def| def.kind.primitive())
            .unwrap_or(Primitive::String);
        let n = self.push_param(PgBindValue::array(primitive, values));
        format!("${}::{}[]", n, primitive.pg_type())
    }
}

fn select_column_list(model: &ModelConfig) -> String {
    model
        .fields
        .iter()
        .map(|f| quoted(&f.name))
        .collect::<Vec<_>>()
        .join(", ")
}

fn known_field(model: &ModelConfig, field: &str) -> Result<(), StoreError> {
    if model.has_field(field) {
        Ok(())
    } else {
        Err(StoreError::UnknownField {
            table: model.table_name.clone(),
            field: field.to_string(),
        })
    }
}

/// SELECT by primary key. The id is the sole param.
pub fn select_by_id(model: &ModelConfig, id: i64) -> QueryBuf {
    let mut q = QueryBuf::new();
    let ph = q.placeholder(model, ID_FIELD, FieldValue::Int(id));
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = {}",
        select_column_list(model),
        quoted(&model.table_name),
        quoted(ID_FIELD),
        ph
    );
    q
}

/// SELECT list with predicates, ordering and paging from `config`.
/// Membership predicates bind a single array (`= ANY`, `<> ALL`).
/// An empty `IN` list matches nothing; an empty `NOT IN` list matches everything.
pub fn select_list(model: &ModelConfig, config: &BulkFetchConfig) -> Result<QueryBuf, StoreError> {
    let mut q = QueryBuf::new();
    let mut where_parts = Vec::new();
    for p in &config.predicates {
        known_field(model, &p.field)?;
        let col = quoted(&p.field);
        let part = match p.kind {
            PredicateKind::IsNull | PredicateKind::IsNotNull => format!("{} {}", col, p.kind.sql_operator()),
            PredicateKind::In | PredicateKind::NotIn => {
                if p.values.is_empty() {
                    if p.kind == PredicateKind::In {
                        "1 = 0".to_string()
                    } else {
                        continue;
                    }
                } else {
                    let ph = q.array_placeholder(model, &p.field, &p.values);
                    let quantified = if p.kind == PredicateKind::In { "= ANY" } else { "<> ALL" };
                    format!("{} {}({})", col, quantified, ph)
                }
            }
            _ => {
                let v = p.values.first().cloned().unwrap_or(FieldValue::Null);
                let ph = q.placeholder(model, &p.field, v);
                format!("{} {} {}", col, p.kind.sql_operator(), ph)
            }
        };
        where_parts.push(part);
    }
    let where_clause = if where_parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", where_parts.join(" AND "))
    };

    let mut order_parts = Vec::new();
    for o in &config.order_by {
        known_field(model, &o.field)?;
        let dir = match o.direction {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        };
        order_parts.push(format!("{} {}", quoted(&o.field), dir));
    }
    // Stable paging across equal sort keys.
    if !config.order_by.iter().any(|o| o.field == ID_FIELD) && model.has_field(ID_FIELD) {
        order_parts.push(format!("{} ASC", quoted(ID_FIELD)));
    }
    let order_clause = if order_parts.is_empty() {
        String::new()
    } else {
        format!(" ORDER BY {}", order_parts.join(", "))
    };
    let limit_clause = config.limit.map(|n| format!(" LIMIT {}", n)).unwrap_or_default();
    let offset_clause = if config.offset > 0 {
        format!(" OFFSET {}", config.offset)
    } else {
        String::new()
    };
    q.sql = format!(
        "SELECT {} FROM {}{}{}{}{}",
        select_column_list(model),
        quoted(&model.table_name),
        where_clause,
        order_clause,
        limit_clause,
        offset_clause
    );
    Ok(q)
}

/// INSERT every set field except the id. Unset fields are omitted so column defaults apply.
pub fn insert(record: &Record) -> QueryBuf {
    let mut q = QueryBuf::new();
    let model = record.config();
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for (def, value) in record.iter() {
        if def.name == ID_FIELD || value.is_null() {
            continue;
        }
        placeholders.push(q.placeholder(model, &def.name, value.clone()));
        cols.push(quoted(&def.name));
    }
    let returning = select_column_list(model);
    q.sql = if cols.is_empty() {
        format!(
            "INSERT INTO {} DEFAULT VALUES RETURNING {}",
            quoted(&model.table_name),
            returning
        )
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            quoted(&model.table_name),
            cols.join(", "),
            placeholders.join(", "),
            returning
        )
    };
    q
}

/// UPDATE by id: SET every updatable field, and `modified_at = NOW()` when the model has it.
pub fn update(record: &Record) -> QueryBuf {
    let mut q = QueryBuf::new();
    let model = record.config();
    let mut sets = Vec::new();
    for (def, value) in record.iter() {
        if !def.updatable || def.name == ID_FIELD || def.name == MODIFIED_AT_FIELD {
            continue;
        }
        let rhs = q.placeholder(model, &def.name, value.clone());
        sets.push(format!("{} = {}", quoted(&def.name), rhs));
    }
    if model.has_field(MODIFIED_AT_FIELD) {
        sets.push(format!("{} = NOW()", quoted(MODIFIED_AT_FIELD)));
    }
    let returning = select_column_list(model);
    if sets.is_empty() {
        let ph = q.placeholder(model, ID_FIELD, FieldValue::Int(record.id()));
        q.sql = format!(
            "SELECT {} FROM {} WHERE {} = {}",
            returning,
            quoted(&model.table_name),
            quoted(ID_FIELD),
            ph
        );
        return q;
    }
    let id_ph = q.placeholder(model, ID_FIELD, FieldValue::Int(record.id()));
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = {} RETURNING {}",
        quoted(&model.table_name),
        sets.join(", "),
        quoted(ID_FIELD),
        id_ph,
        returning
    );
    q
}

/// DELETE by id.
pub fn delete(model: &ModelConfig, id: i64) -> QueryBuf {
    let mut q = QueryBuf::new();
    let ph = q.placeholder(model, ID_FIELD, FieldValue::Int(id));
    q.sql = format!(
        "DELETE FROM {} WHERE {} = {} RETURNING {}",
        quoted(&model.table_name),
        quoted(ID_FIELD),
        ph,
        quoted(ID_FIELD)
    );
    q
}
