//! Field definitions and model configuration.

use crate::model::{FieldValue, Record};
use crate::validation::Rule;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::sync::Arc;

/// Primary key column. Always `Required(Int)`.
pub const ID_FIELD: &str = "id";
/// Conventional last-modified column used by conditional requests.
pub const MODIFIED_AT_FIELD: &str = "modified_at";
/// Conventional creation timestamp, the default sort key.
pub const CREATED_AT_FIELD: &str = "created_at";

/// Shared handle to a model; cloned into every controller that exposes it.
pub type Model = Arc<ModelConfig>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Primitive {
    Int,
    Float,
    Bool,
    String,
    Time,
}

impl Primitive {
    /// PostgreSQL type used for casts and DDL.
    pub fn pg_type(self) -> &'static str {
        match self {
            Primitive::Int => "bigint",
            Primitive::Float => "double precision",
            Primitive::Bool => "boolean",
            Primitive::String => "text",
            Primitive::Time => "timestamptz",
        }
    }

    fn type_name(self) -> &'static str {
        match self {
            Primitive::Int => "integer",
            Primitive::Float => "number",
            Primitive::Bool => "boolean",
            Primitive::String => "string",
            Primitive::Time => "RFC 3339 timestamp",
        }
    }

    /// Parse a non-empty raw input into a value of this primitive.
    pub fn coerce(self, input: &str) -> Result<FieldValue, String> {
        let parsed = match self {
            Primitive::Int => input.trim().parse::<i64>().ok().map(FieldValue::Int),
            Primitive::Float => input.trim().parse::<f64>().ok().filter(|f| f.is_finite()).map(FieldValue::Float),
            Primitive::Bool => parse_bool(input).map(FieldValue::Bool),
            Primitive::String => Some(FieldValue::String(input.to_string())),
            Primitive::Time => parse_time(input).map(FieldValue::Time),
        };
        parsed.ok_or_else(|| format!("must be a valid {}", self.type_name()))
    }
}

fn parse_bool(input: &str) -> Option<bool> {
    match input.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "1" => Some(true),
        "false" | "f" | "0" => Some(false),
        _ => None,
    }
}

fn parse_time(input: &str) -> Option<DateTime<Utc>> {
    let input = input.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(input) {
        return Some(t.with_timezone(&Utc));
    }
    if let Ok(t) = NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(t.and_utc());
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|t| t.and_utc())
}

/// Value kind of a field. Nullable kinds accept an empty input as `Null`;
/// required kinds must be set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Required(Primitive),
    Nullable(Primitive),
}

impl FieldKind {
    pub fn primitive(self) -> Primitive {
        match self {
            FieldKind::Required(p) | FieldKind::Nullable(p) => p,
        }
    }

    pub fn is_nullable(self) -> bool {
        matches!(self, FieldKind::Nullable(_))
    }

    /// Rules every input of this kind carries before config-supplied ones.
    /// Required strings use a length rule so an empty string is rejected
    /// while still distinguishing them from nullable strings.
    pub fn default_rules(self) -> Vec<Rule> {
        match self {
            FieldKind::Nullable(_) => Vec::new(),
            FieldKind::Required(Primitive::String) => vec![Rule::MinLen(1)],
            FieldKind::Required(_) => vec![Rule::IsSet],
        }
    }

    /// Coerce a raw form input. Empty input is `Null` for nullable kinds.
    pub fn coerce(self, input: &str) -> Result<FieldValue, String> {
        match self {
            FieldKind::Nullable(_) if input.is_empty() => Ok(FieldValue::Null),
            kind => kind.primitive().coerce(input),
        }
    }
}

#[derive(Clone, Debug)]
pub struct FieldDef {
    pub name: String,
    pub kind: FieldKind,
    pub insertable: bool,
    pub updatable: bool,
    pub skip_validation: bool,
    /// Extra rules from the model description, applied after the kind's defaults.
    pub rules: Vec<Rule>,
}

impl FieldDef {
    /// A field that is both insertable and updatable.
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        FieldDef {
            name: name.into(),
            kind,
            insertable: true,
            updatable: true,
            skip_validation: false,
            rules: Vec::new(),
        }
    }

    /// A store-managed field (id, timestamps) that clients never write.
    pub fn managed(name: impl Into<String>, kind: FieldKind) -> Self {
        FieldDef {
            insertable: false,
            updatable: false,
            ..FieldDef::new(name, kind)
        }
    }

    pub fn insertable(mut self, insertable: bool) -> Self {
        self.insertable = insertable;
        self
    }

    pub fn updatable(mut self, updatable: bool) -> Self {
        self.updatable = updatable;
        self
    }

    pub fn skip_validation(mut self, skip: bool) -> Self {
        self.skip_validation = skip;
        self
    }

    pub fn rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }
}

#[derive(Clone, Debug)]
pub struct ModelConfig {
    pub table_name: String,
    pub fields: Vec<FieldDef>,
}

impl ModelConfig {
    pub fn new(table_name: impl Into<String>) -> Self {
        ModelConfig {
            table_name: table_name.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn field_def(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field_index(name).is_some()
    }

    /// Sort key used when an index request does not name one.
    pub fn default_sort(&self) -> &'static str {
        if self.has_field(CREATED_AT_FIELD) {
            CREATED_AT_FIELD
        } else {
            ID_FIELD
        }
    }

    /// Fresh, unset record for this model.
    pub fn build(self: &Arc<Self>) -> Record {
        Record::new(Arc::clone(self))
    }
}
