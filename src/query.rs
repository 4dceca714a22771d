//! Bulk-fetch description: paging, predicates and ordering handed to `Store::bulk_fetch`.

use crate::model::FieldValue;

pub const DEFAULT_LIMIT: i64 = 20;
pub const MAX_LIMIT: i64 = 5000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PredicateKind {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    In,
    NotIn,
    IsNull,
    IsNotNull,
}

impl PredicateKind {
    pub fn sql_operator(self) -> &'static str {
        match self {
            PredicateKind::Equal => "=",
            PredicateKind::NotEqual => "<>",
            PredicateKind::GreaterThan => ">",
            PredicateKind::GreaterThanOrEqual => ">=",
            PredicateKind::LessThan => "<",
            PredicateKind::LessThanOrEqual => "<=",
            PredicateKind::In => "IN",
            PredicateKind::NotIn => "NOT IN",
            PredicateKind::IsNull => "IS NULL",
            PredicateKind::IsNotNull => "IS NOT NULL",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Predicate {
    pub field: String,
    pub kind: PredicateKind,
    pub values: Vec<FieldValue>,
}

impl Predicate {
    pub fn new(field: impl Into<String>, kind: PredicateKind, values: Vec<FieldValue>) -> Self {
        Predicate {
            field: field.into(),
            kind,
            values,
        }
    }

    pub fn equal(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Predicate::new(field, PredicateKind::Equal, vec![value.into()])
    }

    pub fn greater_than(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Predicate::new(field, PredicateKind::GreaterThan, vec![value.into()])
    }

    pub fn is_in(field: impl Into<String>, values: Vec<FieldValue>) -> Self {
        Predicate::new(field, PredicateKind::In, values)
    }

    /// Evaluate against a single value. Used by in-process stores.
    pub fn matches(&self, value: &FieldValue) -> bool {
        let first = self.values.first();
        match self.kind {
            PredicateKind::Equal => first.is_some_and(|v| value == v),
            PredicateKind::NotEqual => first.is_some_and(|v| value != v),
            PredicateKind::GreaterThan => first.is_some_and(|v| !value.is_null() && value > v),
            PredicateKind::GreaterThanOrEqual => first.is_some_and(|v| !value.is_null() && value >= v),
            PredicateKind::LessThan => first.is_some_and(|v| !value.is_null() && value < v),
            PredicateKind::LessThanOrEqual => first.is_some_and(|v| !value.is_null() && value <= v),
            PredicateKind::In => self.values.contains(value),
            PredicateKind::NotIn => !self.values.contains(value),
            PredicateKind::IsNull => value.is_null(),
            PredicateKind::IsNotNull => !value.is_null(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BulkFetchConfig {
    /// Row cap. `None` fetches everything.
    pub limit: Option<i64>,
    pub offset: i64,
    pub predicates: Vec<Predicate>,
    pub order_by: Vec<OrderBy>,
}

impl Default for BulkFetchConfig {
    fn default() -> Self {
        BulkFetchConfig {
            limit: Some(DEFAULT_LIMIT),
            offset: 0,
            predicates: Vec::new(),
            order_by: Vec::new(),
        }
    }
}

impl BulkFetchConfig {
    pub fn new(limit: i64, offset: i64) -> Self {
        BulkFetchConfig {
            limit: Some(limit),
            offset,
            ..Default::default()
        }
    }

    /// No limit, no offset.
    pub fn unbounded() -> Self {
        BulkFetchConfig {
            limit: None,
            ..Default::default()
        }
    }

    pub fn predicate(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn push_predicate(&mut self, predicate: Predicate) {
        self.predicates.push(predicate);
    }

    /// Append orderings from a comma-separated sort expression such as `name,-created_at`.
    /// A leading `-` sorts descending. Empty segments are skipped.
    pub fn consume_sort_query(&mut self, sort: &str) {
        for part in sort.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let (field, direction) = match part.strip_prefix('-') {
                Some(field) => (field, Direction::Desc),
                None => (part, Direction::Asc),
            };
            self.order_by.push(OrderBy {
                field: field.to_string(),
                direction,
            });
        }
    }
}

/// Field names referenced by a sort expression, without direction prefixes.
pub fn sort_fields(sort: &str) -> impl Iterator<Item = &str> {
    sort.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.strip_prefix('-').unwrap_or(s))
}
