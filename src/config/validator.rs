//! Description validation: referential integrity and controller consistency.

use crate::config::{ApiDescription, FieldDescription, FieldType, ModelDescription, RelationshipDescription};
use crate::error::ConfigError;
use crate::model::ID_FIELD;
use crate::validation::Format;
use regex::Regex;
use std::collections::HashSet;

fn model<'a>(desc: &'a ApiDescription, table: &str) -> Result<&'a ModelDescription, ConfigError> {
    desc.model(table).ok_or_else(|| ConfigError::MissingReference {
        kind: "model",
        name: table.to_string(),
    })
}

fn field<'a>(model: &'a ModelDescription, name: &str) -> Result<&'a FieldDescription, ConfigError> {
    model.field(name).ok_or_else(|| ConfigError::MissingReference {
        kind: "field",
        name: format!("{}.{}", model.table, name),
    })
}

fn invalid(model: &ModelDescription, field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidField {
        table: model.table.clone(),
        field: field.to_string(),
        reason: reason.into(),
    }
}

/// A field linking two models: must exist and hold an integer.
fn linkage<'a>(model: &'a ModelDescription, name: &str) -> Result<&'a FieldDescription, ConfigError> {
    let f = field(model, name)?;
    if f.type_ != FieldType::Int {
        return Err(invalid(model, name, "linkage fields must be int"));
    }
    Ok(f)
}

fn validate_model(desc: &ApiDescription, m: &ModelDescription) -> Result<(), ConfigError> {
    let mut names = HashSet::new();
    for f in &m.fields {
        if !names.insert(f.name.as_str()) {
            return Err(ConfigError::Duplicate {
                kind: "field",
                name: format!("{}.{}", m.table, f.name),
            });
        }
        if f.name == ID_FIELD && (f.type_ != FieldType::Int || f.nullable) {
            return Err(invalid(m, &f.name, "id must be a non-nullable int"));
        }
        if let Some(target) = &f.references {
            model(desc, target)?;
            if f.type_ != FieldType::Int {
                return Err(invalid(m, &f.name, "references require an int field"));
            }
        }
        if let Some(pattern) = &f.validation.pattern {
            Regex::new(pattern).map_err(|e| invalid(m, &f.name, format!("invalid pattern: {}", e)))?;
        }
        if let Some(format) = &f.validation.format {
            if Format::parse(format).is_none() {
                return Err(invalid(m, &f.name, format!("unknown format '{}'", format)));
            }
        }
    }
    if !names.contains(ID_FIELD) {
        return Err(invalid(m, ID_FIELD, "missing id field"));
    }
    for columns in &m.unique {
        for c in columns {
            field(m, c)?;
        }
    }
    Ok(())
}

/// Collection path a controller mounts at; two controllers may not share one.
fn collection_path(rel: &RelationshipDescription) -> String {
    match rel {
        RelationshipDescription::Plain { model } => format!("/{}", model),
        RelationshipDescription::OneToOne {
            base,
            nested_name_singular,
            ..
        } => format!("/{}/:id/{}", base, nested_name_singular),
        RelationshipDescription::OneToMany { base, nested, .. }
        | RelationshipDescription::ManyToMany { base, nested, .. } => format!("/{}/:id/{}", base, nested),
    }
}

fn validate_relationship(desc: &ApiDescription, rel: &RelationshipDescription) -> Result<(), ConfigError> {
    match rel {
        RelationshipDescription::Plain { model: table } => {
            model(desc, table)?;
        }
        RelationshipDescription::OneToOne {
            base,
            nested,
            foreign_reference,
            ..
        } => {
            let base = model(desc, base)?;
            model(desc, nested)?;
            let fk = linkage(base, foreign_reference)?;
            if !fk.updatable() {
                return Err(invalid(base, foreign_reference, "one-to-one reference must be updatable"));
            }
        }
        RelationshipDescription::OneToMany {
            base,
            nested,
            foreign_reference,
        } => {
            model(desc, base)?;
            linkage(model(desc, nested)?, foreign_reference)?;
        }
        RelationshipDescription::ManyToMany {
            base,
            nested,
            relation,
            base_reference,
            nested_reference,
        } => {
            model(desc, base)?;
            model(desc, nested)?;
            let relation = model(desc, relation)?;
            for name in [base_reference, nested_reference] {
                if !linkage(relation, name)?.insertable() {
                    return Err(invalid(relation, name, "many-to-many references must be insertable"));
                }
            }
        }
    }
    Ok(())
}

pub fn validate(desc: &ApiDescription) -> Result<(), ConfigError> {
    if desc.models.is_empty() {
        return Err(ConfigError::Validation("at least one model required".into()));
    }
    let mut tables = HashSet::new();
    for m in &desc.models {
        if !tables.insert(m.table.as_str()) {
            return Err(ConfigError::Duplicate {
                kind: "model",
                name: m.table.clone(),
            });
        }
    }
    for m in &desc.models {
        validate_model(desc, m)?;
    }

    let mut paths = HashSet::new();
    for c in &desc.controllers {
        validate_relationship(desc, &c.relationship)?;
        let path = collection_path(&c.relationship);
        if !paths.insert(path.clone()) {
            return Err(ConfigError::Duplicate { kind: "route", name: path });
        }
    }
    Ok(())
}
