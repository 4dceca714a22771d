//! Path and query parameters shared by every controller shape.

use crate::error::AppError;
use crate::extractors::RequestContext;
use crate::model::{FieldKind, FieldValue, ModelConfig, Primitive};
use crate::query::{sort_fields, BulkFetchConfig, DEFAULT_LIMIT, MAX_LIMIT};
use crate::validation::{validate, InputValue, Rule};

pub const ID_PARAM: &str = "id";
pub const NESTED_ID_PARAM: &str = "nested_id";

fn id_input(ctx: &RequestContext, name: &str) -> InputValue {
    InputValue::new(name, ctx.param(name).map(str::to_string))
        .with_rule(Rule::IsSet)
        .with_kind(FieldKind::Required(Primitive::Int))
}

/// Rejects sort expressions naming fields the model does not declare.
fn sort_rule(model: &ModelConfig) -> Rule {
    let fields: Vec<String> = model.fields.iter().map(|f| f.name.clone()).collect();
    Rule::custom(move |input| {
        match sort_fields(input).find(|name| !fields.iter().any(|f| f == name)) {
            Some(bad) => Err(format!(
                "must only contain fields within the model. Input '{}' is invalid.",
                bad
            )),
            None => Ok(()),
        }
    })
}

fn as_i64(value: &FieldValue) -> i64 {
    value.as_i64().unwrap_or_default()
}

/// Validate path identifiers, then `inputs`, in one pass so every failure is reported.
/// Returns the identifiers in `id_names` order and the coerced field values.
pub(crate) fn validate_request(
    ctx: &RequestContext,
    id_names: &[&str],
    inputs: Vec<InputValue>,
) -> Result<(Vec<i64>, Vec<(String, FieldValue)>), AppError> {
    let mut all: Vec<InputValue> = id_names.iter().map(|name| id_input(ctx, name)).collect();
    all.extend(inputs);
    let mut values = validate(all)?;
    let fields = values.split_off(id_names.len());
    let ids = values.iter().map(|(_, v)| as_i64(v)).collect();
    Ok((ids, fields))
}

/// Validate only path identifiers.
pub(crate) fn validate_ids(ctx: &RequestContext, id_names: &[&str]) -> Result<Vec<i64>, AppError> {
    validate_request(ctx, id_names, Vec::new()).map(|(ids, _)| ids)
}

/// Paging and sort for an index request over `model`, validated together with any path ids.
#[derive(Debug)]
pub(crate) struct IndexParams {
    pub ids: Vec<i64>,
    pub limit: i64,
    pub offset: i64,
    pub sort: String,
}

impl IndexParams {
    pub fn fetch_config(&self) -> BulkFetchConfig {
        let mut config = BulkFetchConfig::new(self.limit, self.offset);
        config.consume_sort_query(&self.sort);
        config
    }
}

pub(crate) fn index_params(
    ctx: &RequestContext,
    id_names: &[&str],
    model: &ModelConfig,
) -> Result<IndexParams, AppError> {
    let query = |name: &str| ctx.query.get(name).map(str::to_string);
    let inputs = vec![
        InputValue::new("limit", query("limit"))
            .with_default(DEFAULT_LIMIT.to_string())
            .with_rule(Rule::MinValue(1.0))
            .with_rule(Rule::MaxValue(MAX_LIMIT as f64))
            .with_kind(FieldKind::Required(Primitive::Int)),
        InputValue::new("offset", query("offset"))
            .with_default("0")
            .with_rule(Rule::MinValue(0.0))
            .with_kind(FieldKind::Required(Primitive::Int)),
        InputValue::new("sort", query("sort"))
            .with_default(model.default_sort())
            .with_rule(sort_rule(model)),
    ];
    let (ids, values) = validate_request(ctx, id_names, inputs)?;
    let mut params = IndexParams {
        ids,
        limit: DEFAULT_LIMIT,
        offset: 0,
        sort: String::new(),
    };
    for (name, value) in values {
        match (name.as_str(), value) {
            ("limit", v) => params.limit = as_i64(&v),
            ("offset", v) => params.offset = as_i64(&v),
            ("sort", FieldValue::String(s)) => params.sort = s,
            _ => {}
        }
    }
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::FormValues;
    use crate::model::{FieldDef, CREATED_AT_FIELD, ID_FIELD};
    use axum::http::{HeaderMap, Method, Uri};

    fn ctx(params: &[(&str, &str)], query: &[(&str, &str)]) -> RequestContext {
        let pairs = |p: &[(&str, &str)]| {
            FormValues::new(p.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
        };
        RequestContext {
            method: Method::GET,
            uri: Uri::from_static("/"),
            headers: HeaderMap::new(),
            params: pairs(params),
            query: pairs(query),
            form: pairs(query),
        }
    }

    fn model() -> ModelConfig {
        ModelConfig::new("posts")
            .field(FieldDef::managed(ID_FIELD, FieldKind::Required(Primitive::Int)))
            .field(FieldDef::new("title", FieldKind::Required(Primitive::String)))
            .field(FieldDef::managed(CREATED_AT_FIELD, FieldKind::Required(Primitive::Time)))
    }

    #[test]
    fn defaults_apply() {
        let p = index_params(&ctx(&[], &[]), &[], &model()).unwrap();
        assert_eq!((p.limit, p.offset, p.sort.as_str()), (20, 0, CREATED_AT_FIELD));
    }

    #[test]
    fn limit_bounds() {
        for bad in ["0", "5001", "-1"] {
            let err = index_params(&ctx(&[], &[("limit", bad)]), &[], &model()).unwrap_err();
            assert!(matches!(err, AppError::Validation(_)), "limit={}", bad);
        }
        let p = index_params(&ctx(&[], &[("limit", "5000")]), &[], &model()).unwrap();
        assert_eq!(p.limit, 5000);
    }

    #[test]
    fn non_numeric_limit_reported_once() {
        let err = index_params(&ctx(&[], &[("limit", "ten")]), &[], &model()).unwrap_err();
        assert_eq!(err.to_string(), "Parameter 'limit' must be a number");
    }

    #[test]
    fn unknown_sort_field_is_named() {
        let err = index_params(&ctx(&[], &[("sort", "title,-bogus")]), &[], &model()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Parameter 'sort' must only contain fields within the model. Input 'bogus' is invalid."
        );
    }

    #[test]
    fn path_ids_validate_in_same_pass() {
        let err = index_params(&ctx(&[("id", "abc")], &[("offset", "-2")]), &[ID_PARAM], &model()).unwrap_err();
        let AppError::Validation(errs) = err else {
            panic!("expected validation error");
        };
        assert_eq!(errs.fields().collect::<Vec<_>>(), vec!["id", "offset"]);

        let p = index_params(&ctx(&[("id", "7")], &[]), &[ID_PARAM], &model()).unwrap();
        assert_eq!(p.ids, vec![7]);
    }
}
