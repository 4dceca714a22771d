//! Load an API description from JSON and resolve it into runtime models and controllers.

use crate::config::types::*;
use crate::config::validate;
use crate::controller::{Controller, Relationship};
use crate::error::ConfigError;
use crate::model::{FieldDef, FieldKind, Model, ModelConfig, Primitive, CREATED_AT_FIELD, ID_FIELD, MODIFIED_AT_FIELD};
use crate::validation::{Format, Rule};
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Models and controllers ready to serve, plus the normalized description they came from.
#[derive(Clone, Debug)]
pub struct ResolvedApi {
    pub description: ApiDescription,
    pub models: HashMap<String, Model>,
    pub controllers: Vec<Controller>,
}

impl ResolvedApi {
    pub fn model(&self, table: &str) -> Option<&Model> {
        self.models.get(table)
    }
}

pub fn load_from_str(json: &str) -> Result<ApiDescription, ConfigError> {
    serde_json::from_str(json).map_err(|e| ConfigError::Load(e.to_string()))
}

pub async fn load_from_file(path: impl AsRef<Path>) -> Result<ApiDescription, ConfigError> {
    let path = path.as_ref();
    let json = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    load_from_str(&json)
}

fn managed_field(name: &str, type_: FieldType) -> FieldDescription {
    FieldDescription {
        name: name.to_string(),
        type_,
        nullable: false,
        insertable: None,
        updatable: None,
        skip_validation: false,
        references: None,
        validation: ValidationRule::default(),
    }
}

/// Add `id`, `created_at` and `modified_at` to models that omit them.
pub fn normalize(mut desc: ApiDescription) -> ApiDescription {
    for m in &mut desc.models {
        if m.field(ID_FIELD).is_none() {
            m.fields.insert(0, managed_field(ID_FIELD, FieldType::Int));
        }
        for name in [CREATED_AT_FIELD, MODIFIED_AT_FIELD] {
            if m.field(name).is_none() {
                m.fields.push(managed_field(name, FieldType::Time));
            }
        }
    }
    desc
}

fn rules_for(model: &ModelDescription, f: &FieldDescription) -> Result<Vec<Rule>, ConfigError> {
    let v = &f.validation;
    let mut rules = Vec::new();
    if v.required == Some(true) && f.nullable {
        rules.push(Rule::IsSet);
    }
    if let Some(n) = v.min_length {
        rules.push(Rule::MinLen(n as usize));
    }
    if let Some(n) = v.max_length {
        rules.push(Rule::MaxLen(n as usize));
    }
    if let Some(n) = v.minimum {
        rules.push(Rule::MinValue(n));
    }
    if let Some(n) = v.maximum {
        rules.push(Rule::MaxValue(n));
    }
    if let Some(pattern) = &v.pattern {
        let re = Regex::new(pattern).map_err(|e| ConfigError::InvalidField {
            table: model.table.clone(),
            field: f.name.clone(),
            reason: format!("invalid pattern: {}", e),
        })?;
        rules.push(Rule::Pattern(re));
    }
    if let Some(allowed) = &v.allowed {
        let values = allowed
            .iter()
            .map(|a| match a {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect();
        rules.push(Rule::OneOf(values));
    }
    if let Some(format) = v.format.as_deref().and_then(Format::parse) {
        rules.push(Rule::Format(format));
    }
    Ok(rules)
}

fn build_model(m: &ModelDescription) -> Result<Model, ConfigError> {
    let mut config = ModelConfig::new(m.table.as_str());
    for f in &m.fields {
        let primitive = Primitive::from(f.type_);
        let kind = if f.nullable {
            FieldKind::Nullable(primitive)
        } else {
            FieldKind::Required(primitive)
        };
        let mut def = FieldDef::new(f.name.as_str(), kind)
            .insertable(f.insertable())
            .updatable(f.updatable())
            .skip_validation(f.skip_validation);
        def.rules = rules_for(m, f)?;
        config = config.field(def);
    }
    Ok(Arc::new(config))
}

fn lookup(models: &HashMap<String, Model>, table: &str) -> Result<Model, ConfigError> {
    models.get(table).cloned().ok_or_else(|| ConfigError::MissingReference {
        kind: "model",
        name: table.to_string(),
    })
}

fn build_relationship(models: &HashMap<String, Model>, rel: &RelationshipDescription) -> Result<Relationship, ConfigError> {
    Ok(match rel {
        RelationshipDescription::Plain { model } => Relationship::plain(lookup(models, model)?),
        RelationshipDescription::OneToOne {
            base,
            nested,
            nested_name_singular,
            foreign_reference,
        } => Relationship::one_to_one(
            lookup(models, base)?,
            lookup(models, nested)?,
            nested_name_singular.as_str(),
            foreign_reference.as_str(),
        ),
        RelationshipDescription::OneToMany {
            base,
            nested,
            foreign_reference,
        } => Relationship::one_to_many(lookup(models, base)?, lookup(models, nested)?, foreign_reference.as_str()),
        RelationshipDescription::ManyToMany {
            base,
            nested,
            relation,
            base_reference,
            nested_reference,
        } => Relationship::many_to_many(
            lookup(models, base)?,
            lookup(models, nested)?,
            lookup(models, relation)?,
            base_reference.as_str(),
            nested_reference.as_str(),
        ),
    })
}

/// Normalize, validate and build runtime models and controllers.
pub fn resolve(desc: ApiDescription) -> Result<ResolvedApi, ConfigError> {
    let description = normalize(desc);
    validate(&description)?;

    let mut models = HashMap::new();
    for m in &description.models {
        models.insert(m.table.clone(), build_model(m)?);
    }
    let controllers = description
        .controllers
        .iter()
        .map(|c| {
            let relationship = build_relationship(&models, &c.relationship)?;
            Ok(Controller::new(relationship).with_methods(c.methods.iter().copied()))
        })
        .collect::<Result<Vec<_>, ConfigError>>()?;

    tracing::info!(models = models.len(), controllers = controllers.len(), "api description resolved");
    Ok(ResolvedApi {
        description,
        models,
        controllers,
    })
}
