//! `If-Modified-Since` / `If-Unmodified-Since` evaluation.

use crate::model::{FieldValue, Record, MODIFIED_AT_FIELD};
use crate::query::{BulkFetchConfig, Predicate};
use axum::http::{header, HeaderMap};
use chrono::{DateTime, DurationRound, TimeDelta, Utc};

/// Parse an RFC 1123 HTTP-date such as `Sun, 06 Nov 1994 08:49:37 GMT`.
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

fn header_date(headers: &HeaderMap, name: header::HeaderName) -> Option<DateTime<Utc>> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_http_date)
}

/// Restrict an index fetch to rows modified after `If-Modified-Since`.
/// A missing or unparsable header leaves the config unchanged.
pub fn apply_modified_since(headers: &HeaderMap, config: &mut BulkFetchConfig) {
    if let Some(t) = header_date(headers, header::IF_MODIFIED_SINCE) {
        config.push_predicate(Predicate::greater_than(MODIFIED_AT_FIELD, t));
    }
}

/// Whether an update may proceed under `If-Unmodified-Since`.
/// A missing or unparsable header always passes. An unset `modified_at` always fails.
/// `modified_at` is compared at whole-second precision.
pub fn is_unmodified_since(headers: &HeaderMap, record: &Record) -> bool {
    let Some(since) = header_date(headers, header::IF_UNMODIFIED_SINCE) else {
        return true;
    };
    let modified = match record.get(MODIFIED_AT_FIELD) {
        Some(FieldValue::Time(t)) => *t,
        _ => return false,
    };
    let modified = modified
        .duration_trunc(TimeDelta::seconds(1))
        .unwrap_or(modified);
    modified <= since
}
