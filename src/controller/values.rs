//! Turn a model's declared fields into validator inputs read from the request form.

use crate::extractors::RequestContext;
use crate::model::{FieldDef, FieldValue, ModelConfig, Record};
use crate::validation::InputValue;

fn field_input(ctx: &RequestContext, def: &FieldDef) -> InputValue {
    InputValue::new(def.name.as_str(), ctx.form.get(&def.name).map(str::to_string))
        .with_rules(def.kind.default_rules())
        .with_rules(def.rules.iter().cloned())
        .with_kind(def.kind)
}

fn considered(def: &FieldDef, exclusions: &[&str]) -> bool {
    !def.skip_validation && !exclusions.iter().any(|e| *e == def.name)
}

/// Inputs for every insertable field not excluded. Absent form keys read as empty input.
pub(crate) fn insert_values(ctx: &RequestContext, model: &ModelConfig, exclusions: &[&str]) -> Vec<InputValue> {
    model
        .fields
        .iter()
        .filter(|def| def.insertable && considered(def, exclusions))
        .map(|def| field_input(ctx, def))
        .collect()
}

/// Inputs for updatable fields whose names appear as form keys.
pub(crate) fn update_values(ctx: &RequestContext, model: &ModelConfig, exclusions: &[&str]) -> Vec<InputValue> {
    model
        .fields
        .iter()
        .filter(|def| def.updatable && ctx.form.contains(&def.name) && considered(def, exclusions))
        .map(|def| field_input(ctx, def))
        .collect()
}

pub(crate) fn apply(record: &mut Record, values: Vec<(String, FieldValue)>) {
    for (name, value) in values {
        record.set(&name, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::FormValues;
    use crate::model::{FieldKind, Primitive, ID_FIELD};
    use crate::validation::{validate, Rule};
    use axum::http::{HeaderMap, Method, Uri};

    fn ctx(form: &[(&str, &str)]) -> RequestContext {
        let form = FormValues::new(form.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect());
        RequestContext {
            method: Method::POST,
            uri: Uri::from_static("/"),
            headers: HeaderMap::new(),
            params: FormValues::default(),
            query: FormValues::default(),
            form,
        }
    }

    fn posts() -> ModelConfig {
        ModelConfig::new("posts")
            .field(FieldDef::managed(ID_FIELD, FieldKind::Required(Primitive::Int)))
            .field(FieldDef::new("user_id", FieldKind::Required(Primitive::Int)))
            .field(FieldDef::new("title", FieldKind::Required(Primitive::String)).rule(Rule::MaxLen(5)))
            .field(FieldDef::new("subtitle", FieldKind::Nullable(Primitive::String)))
            .field(FieldDef::new("slug", FieldKind::Required(Primitive::String)).skip_validation(true))
    }

    fn names(inputs: &[InputValue]) -> Vec<&str> {
        inputs.iter().map(|i| i.name.as_str()).collect()
    }

    #[test]
    fn insert_skips_managed_excluded_and_unvalidated_fields() {
        let inputs = insert_values(&ctx(&[]), &posts(), &["user_id"]);
        assert_eq!(names(&inputs), vec!["title", "subtitle"]);
        let err = validate(inputs).unwrap_err();
        assert_eq!(err.to_string(), "Parameter 'title' is required");
    }

    #[test]
    fn config_rules_follow_kind_rules() {
        let inputs = insert_values(&ctx(&[("title", "too long")]), &posts(), &["user_id"]);
        let err = validate(inputs).unwrap_err();
        assert_eq!(err.to_string(), "Parameter 'title' must be at most 5 characters");
    }

    #[test]
    fn update_only_considers_present_keys() {
        let inputs = update_values(&ctx(&[("subtitle", ""), ("id", "4")]), &posts(), &[]);
        assert_eq!(names(&inputs), vec!["subtitle"]);
        let values = validate(inputs).unwrap();
        assert_eq!(values, vec![("subtitle".to_string(), FieldValue::Null)]);
    }
}
