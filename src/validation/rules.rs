//! Validation rules evaluated against raw string inputs.

use regex::Regex;
use std::fmt;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    Email,
    Uuid,
}

impl Format {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "email" => Some(Format::Email),
            "uuid" => Some(Format::Uuid),
            _ => None,
        }
    }
}

pub type CustomCheck = Arc<dyn Fn(&str) -> Result<(), String> + Send + Sync>;

#[derive(Clone)]
pub enum Rule {
    /// Input must be present and non-empty.
    IsSet,
    /// Minimum length in characters. Applies to empty input too.
    MinLen(usize),
    MaxLen(usize),
    MinValue(f64),
    MaxValue(f64),
    Pattern(Regex),
    OneOf(Vec<String>),
    Format(Format),
    Custom(CustomCheck),
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::IsSet => f.write_str("IsSet"),
            Rule::MinLen(n) => f.debug_tuple("MinLen").field(n).finish(),
            Rule::MaxLen(n) => f.debug_tuple("MaxLen").field(n).finish(),
            Rule::MinValue(n) => f.debug_tuple("MinValue").field(n).finish(),
            Rule::MaxValue(n) => f.debug_tuple("MaxValue").field(n).finish(),
            Rule::Pattern(re) => f.debug_tuple("Pattern").field(&re.as_str()).finish(),
            Rule::OneOf(v) => f.debug_tuple("OneOf").field(v).finish(),
            Rule::Format(fmt) => f.debug_tuple("Format").field(fmt).finish(),
            Rule::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl Rule {
    /// Wrap a closure as a rule.
    pub fn custom<F>(check: F) -> Self
    where
        F: Fn(&str) -> Result<(), String> + Send + Sync + 'static,
    {
        Rule::Custom(Arc::new(check))
    }

    /// Check `input` for parameter `name`. Only `IsSet` and `MinLen` look at empty input;
    /// every other rule passes it.
    pub fn check(&self, name: &str, input: &str) -> Result<(), String> {
        match self {
            Rule::IsSet => {
                if input.is_empty() {
                    return Err(format!("Parameter '{}' is required", name));
                }
            }
            Rule::MinLen(min) => {
                if input.chars().count() < *min {
                    return Err(if input.is_empty() {
                        format!("Parameter '{}' is required", name)
                    } else {
                        format!("Parameter '{}' must be at least {} characters", name, min)
                    });
                }
            }
            _ if input.is_empty() => {}
            Rule::MaxLen(max) => {
                if input.chars().count() > *max {
                    return Err(format!("Parameter '{}' must be at most {} characters", name, max));
                }
            }
            Rule::MinValue(min) => match input.trim().parse::<f64>() {
                Ok(n) if n >= *min => {}
                Ok(_) => return Err(format!("Parameter '{}' must be at least {}", name, min)),
                Err(_) => return Err(format!("Parameter '{}' must be a number", name)),
            },
            Rule::MaxValue(max) => match input.trim().parse::<f64>() {
                Ok(n) if n <= *max => {}
                Ok(_) => return Err(format!("Parameter '{}' must be at most {}", name, max)),
                Err(_) => return Err(format!("Parameter '{}' must be a number", name)),
            },
            Rule::Pattern(re) => {
                if !re.is_match(input) {
                    return Err(format!("Parameter '{}' does not match required pattern", name));
                }
            }
            Rule::OneOf(allowed) => {
                if !allowed.iter().any(|a| a == input) {
                    return Err(format!(
                        "Parameter '{}' must be one of: {}",
                        name,
                        allowed.iter().take(5).cloned().collect::<Vec<_>>().join(", ")
                    ));
                }
            }
            Rule::Format(Format::Email) => {
                if !input.contains('@') || input.len() < 3 {
                    return Err(format!("Parameter '{}' must be a valid email", name));
                }
            }
            Rule::Format(Format::Uuid) => {
                if uuid::Uuid::parse_str(input).is_err() {
                    return Err(format!("Parameter '{}' must be a valid UUID", name));
                }
            }
            Rule::Custom(check) => {
                check(input).map_err(|msg| format!("Parameter '{}' {}", name, msg))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_only_fails_presence_rules() {
        assert!(Rule::IsSet.check("name", "").is_err());
        assert_eq!(
            Rule::MinLen(1).check("name", "").unwrap_err(),
            "Parameter 'name' is required"
        );
        assert!(Rule::MaxLen(2).check("name", "").is_ok());
        assert!(Rule::Format(Format::Email).check("email", "").is_ok());
    }

    #[test]
    fn numeric_bounds() {
        assert!(Rule::MinValue(1.0).check("age", "0").is_err());
        assert!(Rule::MaxValue(10.0).check("age", "10").is_ok());
        assert!(Rule::MaxValue(10.0).check("age", "ten").is_err());
    }

    #[test]
    fn pattern_and_one_of() {
        let re = Regex::new("^[a-z]+$").unwrap();
        assert!(Rule::Pattern(re).check("slug", "Abc").is_err());
        let allowed = Rule::OneOf(vec!["draft".into(), "published".into()]);
        assert!(allowed.check("state", "draft").is_ok());
        assert_eq!(
            allowed.check("state", "gone").unwrap_err(),
            "Parameter 'state' must be one of: draft, published"
        );
    }

    #[test]
    fn custom_rule_prefixes_parameter() {
        let even = Rule::custom(|s| match s.parse::<i64>() {
            Ok(n) if n % 2 == 0 => Ok(()),
            _ => Err("must be even".to_string()),
        });
        assert_eq!(even.check("n", "3").unwrap_err(), "Parameter 'n' must be even");
    }
}
