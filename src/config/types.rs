//! Raw API description types matching the JSON document.

use crate::controller::Method;
use crate::model::{Primitive, CREATED_AT_FIELD, ID_FIELD, MODIFIED_AT_FIELD};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Int,
    Float,
    Bool,
    String,
    Time,
}

impl From<FieldType> for Primitive {
    fn from(t: FieldType) -> Self {
        match t {
            FieldType::Int => Primitive::Int,
            FieldType::Float => Primitive::Float,
            FieldType::Bool => Primitive::Bool,
            FieldType::String => Primitive::String,
            FieldType::Time => Primitive::Time,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ValidationRule {
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub min_length: Option<u32>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub allowed: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub minimum: Option<f64>,
    #[serde(default)]
    pub maximum: Option<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FieldDescription {
    pub name: String,
    #[serde(rename = "type")]
    pub type_: FieldType,
    #[serde(default)]
    pub nullable: bool,
    /// Defaults to true except for managed columns.
    #[serde(default)]
    pub insertable: Option<bool>,
    #[serde(default)]
    pub updatable: Option<bool>,
    #[serde(default)]
    pub skip_validation: bool,
    /// Table whose `id` this field points at.
    #[serde(default)]
    pub references: Option<String>,
    #[serde(default)]
    pub validation: ValidationRule,
}

impl FieldDescription {
    pub fn is_managed(&self) -> bool {
        is_managed(&self.name)
    }

    pub fn insertable(&self) -> bool {
        self.insertable.unwrap_or(!self.is_managed())
    }

    pub fn updatable(&self) -> bool {
        self.updatable.unwrap_or(!self.is_managed())
    }
}

pub fn is_managed(name: &str) -> bool {
    name == ID_FIELD || name == CREATED_AT_FIELD || name == MODIFIED_AT_FIELD
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TableCheck {
    pub name: String,
    pub expression: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelDescription {
    pub table: String,
    pub fields: Vec<FieldDescription>,
    #[serde(default)]
    pub unique: Vec<Vec<String>>,
    #[serde(default)]
    pub check: Vec<TableCheck>,
}

impl ModelDescription {
    pub fn field(&self, name: &str) -> Option<&FieldDescription> {
        self.fields.iter().find(|f| f.name == name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RelationshipDescription {
    Plain {
        model: String,
    },
    OneToOne {
        base: String,
        nested: String,
        nested_name_singular: String,
        foreign_reference: String,
    },
    OneToMany {
        base: String,
        nested: String,
        foreign_reference: String,
    },
    ManyToMany {
        base: String,
        nested: String,
        relation: String,
        base_reference: String,
        nested_reference: String,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ControllerDescription {
    #[serde(flatten)]
    pub relationship: RelationshipDescription,
    /// Empty means every verb.
    #[serde(default)]
    pub methods: Vec<Method>,
}

/// The whole document: models first, then the controllers exposing them.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ApiDescription {
    pub models: Vec<ModelDescription>,
    #[serde(default)]
    pub controllers: Vec<ControllerDescription>,
}

impl ApiDescription {
    pub fn model(&self, table: &str) -> Option<&ModelDescription> {
        self.models.iter().find(|m| m.table == table)
    }
}
