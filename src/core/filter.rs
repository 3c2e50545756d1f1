//! Filter and sort specifications
//!
//! Caller input arrives as a JSON object keyed by domain field names. An
//! operator suffix on the key selects the predicate:
//!
//! ```text
//! {"status": "E"}                             equals
//! {"description~": "bolt"}                    like (%bolt%)
//! {"createdAt>=": "2024-01-01"}               gte
//! {"createdAt<=": "2024-01-31"}               lte
//! {"createdAt": ["2024-01-01", "2024-01-31"]} between
//! ```
//!
//! Specifications are immutable once built. Field names are validated
//! against a resource's allow-lists by the query builder, not here.

use crate::core::error::QueryError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Predicate operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOperator {
    Equals,
    Like,
    Between,
    Gte,
    Lte,
}

impl FilterOperator {
    /// Split an operator suffix off a filter key
    fn split_key(key: &str) -> (&str, FilterOperator) {
        if let Some(field) = key.strip_suffix(">=") {
            (field, FilterOperator::Gte)
        } else if let Some(field) = key.strip_suffix("<=") {
            (field, FilterOperator::Lte)
        } else if let Some(field) = key.strip_suffix('~') {
            (field, FilterOperator::Like)
        } else {
            (key, FilterOperator::Equals)
        }
    }
}

/// Predicate operand, kept in its textual form until literal rendering
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Single(String),
    Range(String, String),
}

/// One named predicate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Predicate {
    pub field: String,
    pub operator: FilterOperator,
    pub value: FilterValue,
}

impl Predicate {
    pub fn equals(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::single(field, FilterOperator::Equals, value)
    }

    pub fn like(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::single(field, FilterOperator::Like, value)
    }

    pub fn gte(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::single(field, FilterOperator::Gte, value)
    }

    pub fn lte(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::single(field, FilterOperator::Lte, value)
    }

    pub fn between(
        field: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            operator: FilterOperator::Between,
            value: FilterValue::Range(from.into(), to.into()),
        }
    }

    fn single(field: impl Into<String>, operator: FilterOperator, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: FilterValue::Single(value.into()),
        }
    }
}

/// Ordered predicates plus an optional free-text search term
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSpecification {
    predicates: Vec<Predicate>,
    search: Option<String>,
}

impl FilterSpecification {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a predicate
    pub fn with(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Set the free-text search term; blank terms are dropped
    pub fn with_search(mut self, term: impl Into<String>) -> Self {
        let term = term.into().trim().to_string();
        self.search = (!term.is_empty()).then_some(term);
        self
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty() && self.search.is_none()
    }

    /// Parse the `filter` query parameter (a JSON object)
    pub fn from_json(filter: &Value) -> Result<Self, QueryError> {
        let object = filter.as_object().ok_or_else(|| QueryError::InvalidFilterValue {
            field: "filter".to_string(),
            message: "expected a JSON object".to_string(),
        })?;

        let mut spec = Self::new();
        for (key, value) in object {
            let (field, operator) = FilterOperator::split_key(key.trim());
            let field = field.trim();
            if field.is_empty() {
                return Err(QueryError::InvalidFilterValue {
                    field: key.clone(),
                    message: "empty field name".to_string(),
                });
            }

            let predicate = match (operator, value) {
                (FilterOperator::Equals, Value::Array(bounds)) => match bounds.as_slice() {
                    [from, to] => Predicate::between(
                        field,
                        scalar_text(field, from)?,
                        scalar_text(field, to)?,
                    ),
                    _ => {
                        return Err(QueryError::InvalidFilterValue {
                            field: field.to_string(),
                            message: "a range needs exactly two bounds".to_string(),
                        });
                    }
                },
                (operator, value) => Predicate::single(field, operator, scalar_text(field, value)?),
            };
            spec.predicates.push(predicate);
        }
        Ok(spec)
    }
}

fn scalar_text(field: &str, value: &Value) -> Result<String, QueryError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(QueryError::InvalidFilterValue {
            field: field.to_string(),
            message: format!("unsupported value {}", value),
        }),
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// A `(field, direction)` pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpecification {
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl SortSpecification {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }

    /// Parse `field` or `field:asc|desc`
    pub fn parse(raw: &str) -> Result<Self, QueryError> {
        let (field, direction) = match raw.trim().split_once(':') {
            Some((field, dir)) => (field.trim(), dir.trim()),
            None => (raw.trim(), "asc"),
        };
        let direction = match direction.to_ascii_lowercase().as_str() {
            "asc" => SortDirection::Asc,
            "desc" => SortDirection::Desc,
            other => {
                return Err(QueryError::InvalidFilterValue {
                    field: "sort".to_string(),
                    message: format!("unknown direction '{}'", other),
                });
            }
        };
        if field.is_empty() {
            return Err(QueryError::InvalidFilterValue {
                field: "sort".to_string(),
                message: "empty sort field".to_string(),
            });
        }
        Ok(Self {
            field: field.to_string(),
            direction,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_operators() {
        let spec = FilterSpecification::from_json(&json!({
            "status": "E",
            "description~": "bolt",
            "createdAt>=": "2024-01-01",
            "amount<=": 100,
            "period": ["2024-01-01", "2024-01-31"]
        }))
        .unwrap();

        let predicates = spec.predicates();
        assert_eq!(predicates.len(), 5);
        assert_eq!(predicates[0], Predicate::equals("status", "E"));
        assert_eq!(predicates[1], Predicate::like("description", "bolt"));
        assert_eq!(predicates[2], Predicate::gte("createdAt", "2024-01-01"));
        assert_eq!(predicates[3], Predicate::lte("amount", "100"));
        assert_eq!(
            predicates[4],
            Predicate::between("period", "2024-01-01", "2024-01-31")
        );
    }

    #[test]
    fn test_from_json_rejects_bad_shapes() {
        assert!(FilterSpecification::from_json(&json!(["status"])).is_err());
        assert!(FilterSpecification::from_json(&json!({ "status": null })).is_err());
        assert!(FilterSpecification::from_json(&json!({ "status": { "$ne": 1 } })).is_err());
        assert!(FilterSpecification::from_json(&json!({ "period": ["a", "b", "c"] })).is_err());
        assert!(FilterSpecification::from_json(&json!({ "~": "x" })).is_err());
    }

    #[test]
    fn test_blank_search_is_dropped() {
        assert_eq!(FilterSpecification::new().with_search("   ").search(), None);
        assert_eq!(
            FilterSpecification::new().with_search(" abc ").search(),
            Some("abc")
        );
    }

    #[test]
    fn test_sort_parse() {
        assert_eq!(
            SortSpecification::parse("createdAt:desc").unwrap(),
            SortSpecification::desc("createdAt")
        );
        assert_eq!(
            SortSpecification::parse("name").unwrap(),
            SortSpecification::asc("name")
        );
        assert_eq!(
            SortSpecification::parse("name:DESC").unwrap().direction,
            SortDirection::Desc
        );
        assert!(SortSpecification::parse("name:sideways").is_err());
        assert!(SortSpecification::parse(":desc").is_err());
    }
}
