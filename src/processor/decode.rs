//! Turning raw column values into positions, values and identifiers.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::db::SqlValue;
use crate::model::{ColumnSpec, Value, ValueType};

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Parse a date or timestamp into epoch milliseconds (UTC).
///
/// Accepts RFC 3339, `yyyy-MM-dd HH:mm:ss[.fff]`, `yyyy-MM-dd'T'HH:mm:ss[.fff]`,
/// `yyyy-MM-dd HH:mm`, `yyyy-MM-dd`, and bare integer milliseconds.
pub fn parse_datetime_millis(text: &str) -> Option<i64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(millis) = text.parse::<i64>() {
        return Some(millis);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.timestamp_millis());
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt.and_utc().timestamp_millis());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis())
}

/// Text form of a column value; `None` for SQL NULL.
pub fn text_of(value: &SqlValue) -> Option<String> {
    match value {
        SqlValue::Null => None,
        SqlValue::Integer(i) => Some(i.to_string()),
        SqlValue::Real(f) => Some(crate::model::value::format_number(*f)),
        SqlValue::Text(s) => Some(s.clone()),
        SqlValue::Boolean(b) => Some(b.to_string()),
        SqlValue::Timestamp(ms) => Some(ms.to_string()),
        SqlValue::Blob(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
    }
}

/// Position (epoch milliseconds) of a start or finish column.
pub fn position_of(value: &SqlValue) -> Option<i64> {
    match value {
        SqlValue::Integer(i) => Some(*i),
        SqlValue::Real(f) if f.is_finite() => Some(*f as i64),
        SqlValue::Timestamp(ms) => Some(*ms),
        SqlValue::Text(s) => parse_datetime_millis(s),
        _ => None,
    }
}

/// Value of the value column, mapped through the column's code map first.
pub fn decode_value(spec: &ColumnSpec, value_type: ValueType, raw: &SqlValue) -> Option<Value> {
    match (value_type, raw) {
        (_, SqlValue::Null) => None,
        (ValueType::Date, _) => position_of(raw).map(Value::Date),
        (ValueType::Number, SqlValue::Integer(i)) => Some(Value::Number(*i as f64)),
        (ValueType::Number, SqlValue::Real(f)) => Some(Value::Number(*f)),
        (ValueType::Boolean, SqlValue::Boolean(b)) => Some(Value::Boolean(*b)),
        _ => {
            let text = text_of(raw)?;
            let mapped = spec.terminal().id_for_code(&text).unwrap_or(&text);
            Value::parse(value_type, mapped)
        }
    }
}
