//! Literal rendering
//!
//! The upstream has no bind parameters, so every caller-supplied value is
//! interpolated as text. [`quote_literal`] is the one escaping primitive;
//! every predicate renders its operands through it.

use crate::core::field::{
    DATE_FORMAT, FieldKind, SQL_DATETIME_FORMAT, parse_date, parse_datetime, parse_decimal,
    parse_flag, parse_integer,
};
use chrono::NaiveTime;

/// A value that cannot be rendered as a literal of its field's kind
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LiteralError {
    #[error("value contains a NUL character")]
    NulCharacter,

    #[error("'{0}' is not a number")]
    NotANumber(String),

    #[error("'{0}' is not a date")]
    NotADate(String),

    #[error("'{0}' is not a S/N flag")]
    NotAFlag(String),
}

/// Quote a string literal, doubling embedded single quotes
pub fn quote_literal(raw: &str) -> Result<String, LiteralError> {
    if raw.contains('\0') {
        return Err(LiteralError::NulCharacter);
    }
    Ok(format!("'{}'", raw.replace('\'', "''")))
}

/// `'%term%'` for `LIKE`; `%` and `_` inside the term stay wildcards
pub fn like_pattern(raw: &str) -> Result<String, LiteralError> {
    quote_literal(&format!("%{}%", raw.trim()))
}

/// Render a predicate operand according to the field's declared kind
pub fn render_literal(kind: FieldKind, raw: &str) -> Result<String, LiteralError> {
    let trimmed = raw.trim();
    match kind {
        FieldKind::Text | FieldKind::Auto => quote_literal(raw),
        FieldKind::Integer => parse_integer(trimmed)
            .map(|i| i.to_string())
            .ok_or_else(|| LiteralError::NotANumber(raw.to_string())),
        FieldKind::Decimal => parse_decimal(trimmed)
            .map(|f| f.to_string())
            .ok_or_else(|| LiteralError::NotANumber(raw.to_string())),
        FieldKind::Date => parse_date(trimmed)
            .or_else(|| parse_datetime(trimmed).map(|dt| dt.date()))
            .ok_or_else(|| LiteralError::NotADate(raw.to_string()))
            .and_then(|d| quote_literal(&d.format(DATE_FORMAT).to_string())),
        FieldKind::DateTime => parse_datetime(trimmed)
            .or_else(|| parse_date(trimmed).map(|d| d.and_time(NaiveTime::MIN)))
            .ok_or_else(|| LiteralError::NotADate(raw.to_string()))
            .and_then(|dt| quote_literal(&dt.format(SQL_DATETIME_FORMAT).to_string())),
        FieldKind::Flag => match parse_flag(trimmed) {
            Some(true) => Ok("'S'".to_string()),
            Some(false) => Ok("'N'".to_string()),
            None => Err(LiteralError::NotAFlag(raw.to_string())),
        },
    }
}
