//! Validation engine: named raw inputs, rule evaluation and type coercion.

mod rules;

pub use rules::*;

use crate::model::{FieldKind, FieldValue};
use thiserror::Error;

/// One named raw input and the rules it must satisfy.
#[derive(Clone, Debug)]
pub struct InputValue {
    pub name: String,
    /// `None` when the request did not carry the parameter at all.
    pub input: Option<String>,
    /// Used when `input` is absent or empty.
    pub default: Option<String>,
    pub rules: Vec<Rule>,
    /// Coercion target. Without one the raw string is returned as-is.
    pub kind: Option<FieldKind>,
}

impl InputValue {
    pub fn new(name: impl Into<String>, input: Option<String>) -> Self {
        InputValue {
            name: name.into(),
            input,
            default: None,
            rules: Vec::new(),
            kind: None,
        }
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn with_rules(mut self, rules: impl IntoIterator<Item = Rule>) -> Self {
        self.rules.extend(rules);
        self
    }

    pub fn with_kind(mut self, kind: FieldKind) -> Self {
        self.kind = Some(kind);
        self
    }

    fn raw(&self) -> &str {
        self.input
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(self.default.as_deref())
            .unwrap_or("")
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Every violation found in one validation pass.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
#[error("{}", join_messages(.0))]
pub struct ValidationErrors(pub Vec<FieldError>);

impl ValidationErrors {
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|e| e.field.as_str())
    }
}

fn join_messages(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Evaluate all inputs, collecting every failure. On success returns the coerced
/// values in input order.
pub fn validate(inputs: Vec<InputValue>) -> Result<Vec<(String, FieldValue)>, ValidationErrors> {
    let mut values = Vec::with_capacity(inputs.len());
    let mut errors: Vec<FieldError> = Vec::new();
    for input in inputs {
        let raw = input.raw();
        let before = errors.len();
        for rule in &input.rules {
            if let Err(message) = rule.check(&input.name, raw) {
                // Several rules can fail on the same parse error.
                if errors[before..].iter().any(|e| e.message == message) {
                    continue;
                }
                errors.push(FieldError {
                    field: input.name.clone(),
                    message,
                });
            }
        }
        if errors.len() > before {
            continue;
        }
        let coerced = match input.kind {
            Some(kind) => kind.coerce(raw),
            None => Ok(FieldValue::String(raw.to_string())),
        };
        match coerced {
            Ok(value) => values.push((input.name, value)),
            Err(msg) => errors.push(FieldError {
                message: format!("Parameter '{}' {}", input.name, msg),
                field: input.name,
            }),
        }
    }
    if errors.is_empty() {
        Ok(values)
    } else {
        Err(ValidationErrors(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Primitive;

    #[test]
    fn aggregates_all_failures() {
        let err = validate(vec![
            InputValue::new("name", None).with_rule(Rule::MinLen(1)),
            InputValue::new("age", Some("x".into())).with_kind(FieldKind::Required(Primitive::Int)),
            InputValue::new("ok", Some("1".into())),
        ])
        .unwrap_err();
        assert_eq!(err.fields().collect::<Vec<_>>(), vec!["name", "age"]);
        assert_eq!(
            err.to_string(),
            "Parameter 'name' is required; Parameter 'age' must be a valid integer"
        );
    }

    #[test]
    fn default_applies_when_absent() {
        let out = validate(vec![InputValue::new("limit", None)
            .with_default("20")
            .with_kind(FieldKind::Required(Primitive::Int))])
        .unwrap();
        assert_eq!(out, vec![("limit".to_string(), FieldValue::Int(20))]);
    }

    #[test]
    fn rule_failure_skips_coercion() {
        let err = validate(vec![InputValue::new("id", Some(String::new()))
            .with_rule(Rule::IsSet)
            .with_kind(FieldKind::Required(Primitive::Int))])
        .unwrap_err();
        assert_eq!(err.0.len(), 1);
    }

    #[test]
    fn same_message_reported_once_per_input() {
        let err = validate(vec![InputValue::new("limit", Some("many".into()))
            .with_rule(Rule::MinValue(1.0))
            .with_rule(Rule::MaxValue(5000.0))])
        .unwrap_err();
        assert_eq!(err.to_string(), "Parameter 'limit' must be a number");
    }
}
