//! Convert field values to types that sqlx can bind.

use crate::model::{FieldValue, Primitive};
use chrono::{DateTime, Utc};
use sqlx::encode::{Encode, IsNull};
use sqlx::postgres::{PgTypeInfo, Postgres};
use sqlx::{Database, Type};

/// A value that can be bound to a PostgreSQL query. Each value reports its own
/// wire type; placeholders also carry an explicit cast.
#[derive(Clone, Debug, PartialEq)]
pub enum PgBindValue {
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    String(String),
    Time(DateTime<Utc>),
    BoolArray(Vec<bool>),
    I64Array(Vec<i64>),
    F64Array(Vec<f64>),
    StringArray(Vec<String>),
    TimeArray(Vec<DateTime<Utc>>),
}

impl PgBindValue {
    /// One array parameter holding every value of `primitive`'s type. Nulls and values of
    /// another type can never equal a column of that type and are left out.
    pub fn array(primitive: Primitive, values: &[FieldValue]) -> Self {
        match primitive {
            Primitive::Bool => PgBindValue::BoolArray(
                values
                    .iter()
                    .filter_map(|v| match v {
                        FieldValue::Bool(b) => Some(*b),
                        _ => None,
                    })
                    .collect(),
            ),
            Primitive::Int => PgBindValue::I64Array(
                values
                    .iter()
                    .filter_map(|v| match v {
                        FieldValue::Int(n) => Some(*n),
                        _ => None,
                    })
                    .collect(),
            ),
            Primitive::Float => PgBindValue::F64Array(
                values
                    .iter()
                    .filter_map(|v| match v {
                        FieldValue::Float(f) => Some(*f),
                        FieldValue::Int(n) => Some(*n as f64),
                        _ => None,
                    })
                    .collect(),
            ),
            Primitive::String => PgBindValue::StringArray(
                values
                    .iter()
                    .filter_map(|v| match v {
                        FieldValue::String(s) => Some(s.clone()),
                        _ => None,
                    })
                    .collect(),
            ),
            Primitive::Time => PgBindValue::TimeArray(
                values
                    .iter()
                    .filter_map(|v| match v {
                        FieldValue::Time(t) => Some(*t),
                        _ => None,
                    })
                    .collect(),
            ),
        }
    }
}

impl From<&FieldValue> for PgBindValue {
    fn from(v: &FieldValue) -> Self {
        match v {
            FieldValue::Null => PgBindValue::Null,
            FieldValue::Int(n) => PgBindValue::I64(*n),
            FieldValue::Float(f) => PgBindValue::F64(*f),
            FieldValue::Bool(b) => PgBindValue::Bool(*b),
            FieldValue::String(s) => PgBindValue::String(s.clone()),
            FieldValue::Time(t) => PgBindValue::Time(*t),
        }
    }
}

impl<'q> Encode<'q, Postgres> for PgBindValue {
    fn encode_by_ref(
        &self,
        buf: &mut <Postgres as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, Box<dyn std::error::Error + Send + Sync>> {
        Ok(match self {
            PgBindValue::Null => IsNull::Yes,
            PgBindValue::Bool(b) => <bool as Encode<Postgres>>::encode_by_ref(b, buf)?,
            PgBindValue::I64(n) => <i64 as Encode<Postgres>>::encode_by_ref(n, buf)?,
            PgBindValue::F64(n) => <f64 as Encode<Postgres>>::encode_by_ref(n, buf)?,
            PgBindValue::String(s) => <&str as Encode<Postgres>>::encode_by_ref(&s.as_str(), buf)?,
            PgBindValue::Time(t) => <DateTime<Utc> as Encode<Postgres>>::encode_by_ref(t, buf)?,
            PgBindValue::BoolArray(v) => <Vec<bool> as Encode<Postgres>>::encode_by_ref(v, buf)?,
            PgBindValue::I64Array(v) => <Vec<i64> as Encode<Postgres>>::encode_by_ref(v, buf)?,
            PgBindValue::F64Array(v) => <Vec<f64> as Encode<Postgres>>::encode_by_ref(v, buf)?,
            PgBindValue::StringArray(v) => <Vec<String> as Encode<Postgres>>::encode_by_ref(v, buf)?,
            PgBindValue::TimeArray(v) => <Vec<DateTime<Utc>> as Encode<Postgres>>::encode_by_ref(v, buf)?,
        })
    }

    fn produces(&self) -> Option<PgTypeInfo> {
        match self {
            PgBindValue::Null => None,
            PgBindValue::Bool(_) => Some(<bool as Type<Postgres>>::type_info()),
            PgBindValue::I64(_) => Some(<i64 as Type<Postgres>>::type_info()),
            PgBindValue::F64(_) => Some(<f64 as Type<Postgres>>::type_info()),
            PgBindValue::String(_) => Some(<String as Type<Postgres>>::type_info()),
            PgBindValue::Time(_) => Some(<DateTime<Utc> as Type<Postgres>>::type_info()),
            PgBindValue::BoolArray(_) => Some(<Vec<bool> as Type<Postgres>>::type_info()),
            PgBindValue::I64Array(_) => Some(<Vec<i64> as Type<Postgres>>::type_info()),
            PgBindValue::F64Array(_) => Some(<Vec<f64> as Type<Postgres>>::type_info()),
            PgBindValue::StringArray(_) => Some(<Vec<String> as Type<Postgres>>::type_info()),
            PgBindValue::TimeArray(_) => Some(<Vec<DateTime<Utc>> as Type<Postgres>>::type_info()),
        }
    }
}

impl Type<Postgres> for PgBindValue {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_name("TEXT")
    }

    fn compatible(_ty: &PgTypeInfo) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_keeps_values_of_the_column_type() {
        let values = vec![FieldValue::Int(3), FieldValue::Null, FieldValue::from("x"), FieldValue::Int(5)];
        assert_eq!(PgBindValue::array(Primitive::Int, &values), PgBindValue::I64Array(vec![3, 5]));
        assert_eq!(
            PgBindValue::array(Primitive::String, &values),
            PgBindValue::StringArray(vec!["x".to_string()])
        );
    }
}
