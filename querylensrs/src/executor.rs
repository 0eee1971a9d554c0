//! Raw statement results and row hydration.
//!
//! Backends return positional rows of [`SqlValue`]s. [`HydratedRows`] turns
//! them, one at a time, into [`ResultRow`]s keyed by projection alias, with
//! each value coerced to the column's declared [`ValueType`].

use std::collections::BTreeMap;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
#[cfg(feature = "duckdb")]
use duckdb::types::{TimeUnit, Value as DuckValue};
use serde::Serialize;
use serde_json::Value;

use crate::error::{QueryLensError, Result};
use crate::models::ValueType;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

impl SqlValue {
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => SqlValue::Null,
            Value::Bool(b) => SqlValue::Boolean(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => SqlValue::Integer(i),
                None => SqlValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => SqlValue::Text(s.clone()),
            other => SqlValue::Text(other.to_string()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => f.write_str("NULL"),
            SqlValue::Boolean(b) => write!(f, "{b}"),
            SqlValue::Integer(i) => write!(f, "{i}"),
            SqlValue::Float(v) => write!(f, "{v}"),
            SqlValue::Text(s) => f.write_str(s),
            SqlValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            SqlValue::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S%.f")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMeta {
    pub name: String,
}

/// Rows exactly as the backing store returned them.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<ColumnMeta>,
    pub rows: Vec<Vec<SqlValue>>,
}

impl QueryResult {
    /// First column of the first row, for single-value statements.
    pub fn scalar(&self) -> Option<&SqlValue> {
        self.rows.first().and_then(|row| row.first())
    }
}

/// One result object: projection alias to coerced value.
pub type ResultRow = BTreeMap<String, SqlValue>;

/// Alias and declared type for one position of the select list.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnBinding {
    pub alias: String,
    pub value_type: Option<ValueType>,
}

/// Lazily hydrated result rows. Consuming; cannot be restarted.
#[derive(Debug)]
pub struct HydratedRows {
    bindings: Vec<ColumnBinding>,
    rows: std::vec::IntoIter<Vec<SqlValue>>,
}

impl HydratedRows {
    pub fn new(bindings: Vec<ColumnBinding>, result: QueryResult) -> Self {
        HydratedRows {
            bindings,
            rows: result.rows.into_iter(),
        }
    }

    fn hydrate(&self, row: Vec<SqlValue>) -> Result<ResultRow> {
        if row.len() != self.bindings.len() {
            return Err(QueryLensError::Execution(format!(
                "row has {} values but {} columns were projected",
                row.len(),
                self.bindings.len()
            )));
        }
        self.bindings
            .iter()
            .zip(row)
            .map(|(binding, value)| {
                let coerced = coerce(value, binding.value_type).map_err(|e| {
                    QueryLensError::Execution(format!("column '{}': {e}", binding.alias))
                })?;
                Ok((binding.alias.clone(), coerced))
            })
            .collect()
    }
}

impl Iterator for HydratedRows {
    type Item = Result<ResultRow>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.rows.next()?;
        Some(self.hydrate(row))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}

impl ExactSizeIterator for HydratedRows {}

const TIMESTAMP_FORMATS: [&str; 3] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| parse_date(s).and_then(|d| d.and_hms_opt(0, 0, 0)))
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.get(..10)?, "%Y-%m-%d").ok()
}

/// Convert a raw value to the declared type. Untyped columns pass through.
pub fn coerce(value: SqlValue, value_type: Option<ValueType>) -> std::result::Result<SqlValue, String> {
    let Some(ty) = value_type else {
        return Ok(value);
    };
    let fail = |v: &SqlValue| format!("cannot read {v:?} as {ty:?}");
    match (ty, value) {
        (_, SqlValue::Null) => Ok(SqlValue::Null),
        (ValueType::Integer, v @ SqlValue::Integer(_)) => Ok(v),
        (ValueType::Integer, SqlValue::Float(f)) if f.fract() == 0.0 => {
            Ok(SqlValue::Integer(f as i64))
        }
        (ValueType::Integer, SqlValue::Boolean(b)) => Ok(SqlValue::Integer(i64::from(b))),
        (ValueType::Integer, SqlValue::Text(s)) => s
            .trim()
            .parse()
            .map(SqlValue::Integer)
            .map_err(|_| fail(&SqlValue::Text(s))),
        (ValueType::Decimal, v @ SqlValue::Float(_)) => Ok(v),
        (ValueType::Decimal, SqlValue::Integer(i)) => Ok(SqlValue::Float(i as f64)),
        (ValueType::Decimal, SqlValue::Text(s)) => s
            .trim()
            .parse()
            .map(SqlValue::Float)
            .map_err(|_| fail(&SqlValue::Text(s))),
        (ValueType::Text, v @ SqlValue::Text(_)) => Ok(v),
        (ValueType::Text, v) => Ok(SqlValue::Text(v.to_string())),
        (ValueType::Boolean, v @ SqlValue::Boolean(_)) => Ok(v),
        (ValueType::Boolean, SqlValue::Integer(i)) => Ok(SqlValue::Boolean(i != 0)),
        (ValueType::Boolean, SqlValue::Text(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "t" | "1" => Ok(SqlValue::Boolean(true)),
            "false" | "f" | "0" => Ok(SqlValue::Boolean(false)),
            _ => Err(fail(&SqlValue::Text(s))),
        },
        (ValueType::Date, v @ SqlValue::Date(_)) => Ok(v),
        (ValueType::Date, SqlValue::Timestamp(ts)) => Ok(SqlValue::Date(ts.date())),
        (ValueType::Date, SqlValue::Text(s)) => parse_date(&s)
            .map(SqlValue::Date)
            .ok_or_else(|| fail(&SqlValue::Text(s))),
        (ValueType::Timestamp, v @ SqlValue::Timestamp(_)) => Ok(v),
        (ValueType::Timestamp, SqlValue::Date(d)) => d
            .and_hms_opt(0, 0, 0)
            .map(SqlValue::Timestamp)
            .ok_or_else(|| fail(&SqlValue::Date(d))),
        (ValueType::Timestamp, SqlValue::Text(s)) => parse_timestamp(&s)
            .map(SqlValue::Timestamp)
            .ok_or_else(|| fail(&SqlValue::Text(s))),
        (_, v) => Err(fail(&v)),
    }
}

#[cfg(feature = "duckdb")]
pub(crate) fn duck_value_to_sql(value: DuckValue) -> SqlValue {
    match value {
        DuckValue::Null => SqlValue::Null,
        DuckValue::Boolean(b) => SqlValue::Boolean(b),
        DuckValue::TinyInt(i) => SqlValue::Integer(i.into()),
        DuckValue::SmallInt(i) => SqlValue::Integer(i.into()),
        DuckValue::Int(i) => SqlValue::Integer(i.into()),
        DuckValue::BigInt(i) => SqlValue::Integer(i),
        DuckValue::UTinyInt(i) => SqlValue::Integer(i.into()),
        DuckValue::USmallInt(i) => SqlValue::Integer(i.into()),
        DuckValue::UInt(i) => SqlValue::Integer(i.into()),
        DuckValue::UBigInt(i) => match i64::try_from(i) {
            Ok(v) => SqlValue::Integer(v),
            Err(_) => SqlValue::Text(i.to_string()),
        },
        DuckValue::HugeInt(i) => match i64::try_from(i) {
            Ok(v) => SqlValue::Integer(v),
            Err(_) => SqlValue::Text(i.to_string()),
        },
        DuckValue::Float(f) => SqlValue::Float(f.into()),
        DuckValue::Double(f) => SqlValue::Float(f),
        DuckValue::Decimal(d) => match d.to_string().parse() {
            Ok(f) => SqlValue::Float(f),
            Err(_) => SqlValue::Text(d.to_string()),
        },
        DuckValue::Timestamp(unit, t) => {
            let micros = match unit {
                TimeUnit::Second => t.saturating_mul(1_000_000),
                TimeUnit::Millisecond => t.saturating_mul(1_000),
                TimeUnit::Microsecond => t,
                TimeUnit::Nanosecond => t / 1_000,
            };
            match chrono::DateTime::from_timestamp_micros(micros) {
                Some(dt) => SqlValue::Timestamp(dt.naive_utc()),
                None => SqlValue::Text(format!("{t} ({unit:?})")),
            }
        }
        DuckValue::Date32(days) => {
            // DuckDB counts days from 1970-01-01; chrono counts from 0001-01-01.
            match NaiveDate::from_num_days_from_ce_opt(days + 719_163) {
                Some(d) => SqlValue::Date(d),
                None => SqlValue::Text(days.to_string()),
            }
        }
        DuckValue::Text(s) => SqlValue::Text(s),
        DuckValue::Enum(s) => SqlValue::Text(s),
        DuckValue::Blob(bytes) => SqlValue::Text(hex::encode(bytes)),
        other => SqlValue::Text(format!("{other:?}")),
    }
}

#[cfg(feature = "duckdb")]
pub(crate) fn sql_value_to_duck(value: &SqlValue) -> DuckValue {
    match value {
        SqlValue::Null => DuckValue::Null,
        SqlValue::Boolean(b) => DuckValue::Boolean(*b),
        SqlValue::Integer(i) => DuckValue::BigInt(*i),
        SqlValue::Float(f) => DuckValue::Double(*f),
        SqlValue::Text(s) => DuckValue::Text(s.clone()),
        // Temporal values bind as ISO text and are cast by the comparison.
        SqlValue::Date(_) | SqlValue::Timestamp(_) => DuckValue::Text(value.to_string()),
    }
}
