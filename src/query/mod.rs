//! Upstream query text: building, literal escaping and the read-only guard

pub mod builder;
pub mod guard;
pub mod literal;

pub use builder::QueryBuilder;
pub use guard::{GuardViolation, ensure_read_only, is_forbidden_field};
pub use literal::{LiteralError, like_pattern, quote_literal, render_literal};

use crate::core::error::QueryError;
use std::fmt;

/// Query text that passed the read-only guard.
///
/// The only way to obtain one is [`QueryText::new`], so executors can send
/// it without re-checking.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryText(String);

impl QueryText {
    pub fn new(text: impl Into<String>) -> Result<Self, QueryError> {
        let text = text.into();
        ensure_read_only(&text).map_err(|violation| QueryError::ForbiddenQuery {
            reason: violation.to_string(),
        })?;
        Ok(Self(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for QueryText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueryText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
