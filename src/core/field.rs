//! Field value types and upstream value coercion

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;

/// A coerced field value, as produced by the row mapper
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FieldValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl FieldValue {
    /// Get the value as a string if possible
    pub fn as_string(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the value as an integer if possible
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// JSON form used in domain records
    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::String(s) => Value::String(s.clone()),
            FieldValue::Integer(i) => Value::from(*i),
            FieldValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            FieldValue::Boolean(b) => Value::Bool(*b),
            FieldValue::Date(d) => Value::String(d.format(DATE_FORMAT).to_string()),
            FieldValue::DateTime(dt) => Value::String(dt.format(RECORD_DATETIME_FORMAT).to_string()),
        }
    }
}

/// Canonical date rendering used in records and query literals
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Timestamp rendering in domain records (ISO 8601, what chrono deserializes)
pub const RECORD_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Timestamp rendering inside upstream query literals
pub const SQL_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Declared type of a mapped column
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// Infer from the value: numbers, dates, then trimmed text
    #[default]
    Auto,
    Text,
    Integer,
    Decimal,
    Date,
    DateTime,
    /// Upstream `S`/`N` column, surfaced as a boolean
    Flag,
}

/// A cell that does not fit its declared kind
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("value {value} is not a valid {kind:?}")]
pub struct CoercionError {
    pub kind: FieldKind,
    pub value: String,
}

impl FieldKind {
    /// Coerce one upstream cell.
    ///
    /// `Ok(None)` means the value is absent: upstream `NULL`, an empty string
    /// or whitespace-only fixed-width padding.
    pub fn coerce(self, raw: &Value) -> Result<Option<FieldValue>, CoercionError> {
        let raw = match raw {
            Value::Null => return Ok(None),
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Ok(None);
                }
                Value::String(trimmed.to_string())
            }
            other => other.clone(),
        };

        let fail = || CoercionError {
            kind: self,
            value: raw.to_string(),
        };

        let value = match self {
            FieldKind::Auto => infer(&raw),
            FieldKind::Text => match &raw {
                Value::String(s) => FieldValue::String(s.clone()),
                Value::Number(n) => FieldValue::String(n.to_string()),
                Value::Bool(b) => FieldValue::String(b.to_string()),
                _ => return Err(fail()),
            },
            FieldKind::Integer => match &raw {
                Value::Number(n) => n
                    .as_i64()
                    .or_else(|| n.as_f64().and_then(integral))
                    .map(FieldValue::Integer)
                    .ok_or_else(fail)?,
                Value::String(s) => parse_integer(s).map(FieldValue::Integer).ok_or_else(fail)?,
                _ => return Err(fail()),
            },
            FieldKind::Decimal => match &raw {
                Value::Number(n) => n.as_f64().map(FieldValue::Float).ok_or_else(fail)?,
                Value::String(s) => parse_decimal(s).map(FieldValue::Float).ok_or_else(fail)?,
                _ => return Err(fail()),
            },
            FieldKind::Date => match &raw {
                Value::String(s) => parse_date(s)
                    .or_else(|| parse_datetime(s).map(|dt| dt.date()))
                    .map(FieldValue::Date)
                    .ok_or_else(fail)?,
                _ => return Err(fail()),
            },
            FieldKind::DateTime => match &raw {
                Value::String(s) => parse_datetime(s)
                    .or_else(|| parse_date(s).map(|d| d.and_time(NaiveTime::MIN)))
                    .map(FieldValue::DateTime)
                    .ok_or_else(fail)?,
                _ => return Err(fail()),
            },
            FieldKind::Flag => match &raw {
                Value::Bool(b) => FieldValue::Boolean(*b),
                Value::String(s) => parse_flag(s).map(FieldValue::Boolean).ok_or_else(fail)?,
                _ => return Err(fail()),
            },
        };

        Ok(Some(value))
    }

    /// Reverse a domain value into the cell the upstream would have sent
    pub fn to_upstream(self, value: &Value) -> Value {
        match (self, value) {
            (FieldKind::Flag, Value::Bool(b)) => Value::String(if *b { "S" } else { "N" }.into()),
            _ => value.clone(),
        }
    }
}

fn infer(raw: &Value) -> FieldValue {
    match raw {
        Value::Bool(b) => FieldValue::Boolean(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => FieldValue::Integer(i),
            None => FieldValue::Float(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => infer_from_text(s),
        other => FieldValue::String(other.to_string()),
    }
}

fn infer_from_text(s: &str) -> FieldValue {
    if looks_numeric(s) {
        if let Ok(i) = s.parse::<i64>() {
            return FieldValue::Integer(i);
        }
        if let Ok(f) = s.parse::<f64>() {
            return FieldValue::Float(f);
        }
    }
    if looks_like_date(s) {
        if let Some(dt) = parse_datetime(s) {
            return FieldValue::DateTime(dt);
        }
        if let Some(d) = parse_date(s) {
            return FieldValue::Date(d);
        }
    }
    FieldValue::String(s.to_string())
}

/// Numeric-looking text: optional sign, digits, optional fraction.
///
/// Codes with a leading zero (`"0042"`) stay text so they survive a round trip.
pub fn looks_numeric(s: &str) -> bool {
    static NUMERIC_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = NUMERIC_REGEX
        .get_or_init(|| Regex::new(r"^-?(0|[1-9]\d*)(\.\d+)?$").expect("numeric regex"));
    regex.is_match(s)
}

fn looks_like_date(s: &str) -> bool {
    static DATE_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = DATE_REGEX.get_or_init(|| {
        Regex::new(r"^(\d{4}-\d{2}-\d{2}|\d{2}/\d{2}/\d{4}|\d{8} \d{2}:\d{2})")
            .expect("date regex")
    });
    regex.is_match(s)
}

/// Whole `f64` strictly inside the `i64` range; anything else is not an integer
fn integral(f: f64) -> Option<i64> {
    let in_range = f >= i64::MIN as f64 && f < i64::MAX as f64;
    (in_range && f.fract() == 0.0).then_some(f as i64)
}

/// Parse an integer literal, accepting `"12.0"`
pub fn parse_integer(s: &str) -> Option<i64> {
    let s = s.trim();
    s.parse::<i64>()
        .ok()
        .or_else(|| parse_decimal(s).and_then(integral))
}

/// Parse a decimal literal; only plain decimal notation is accepted
pub fn parse_decimal(s: &str) -> Option<f64> {
    static DECIMAL_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex =
        DECIMAL_REGEX.get_or_init(|| Regex::new(r"^-?\d+(\.\d+)?$").expect("decimal regex"));
    let s = s.trim();
    if !regex.is_match(s) {
        return None;
    }
    s.parse::<f64>().ok().filter(|f| f.is_finite())
}

/// Parse a Sankhya-style `S`/`N` flag (also `true`/`false`)
pub fn parse_flag(s: &str) -> Option<bool> {
    match s.trim().to_ascii_uppercase().as_str() {
        "S" | "TRUE" | "1" => Some(true),
        "N" | "FALSE" | "0" => Some(false),
        _ => None,
    }
}

/// Parse a date in ISO (`2024-01-15`) or Brazilian (`15/01/2024`) order
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    const FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d%m%Y"];
    let s = s.trim();
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

/// Parse a timestamp; RFC 3339 values are converted to naive UTC
pub fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    const FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%d/%m/%Y %H:%M:%S",
        "%d/%m/%Y %H:%M",
        "%d%m%Y %H:%M:%S",
    ];
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}
