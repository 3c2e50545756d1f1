//! Resource declarations
//!
//! A resource is plain data: upstream table, primary key, field mapping and
//! the allow-lists callers are held to. New resources are added by declaring
//! a [`ResourceSchema`] (in code or YAML), never by subclassing a service.

use crate::core::error::ConfigError;
use crate::core::field::FieldKind;
use crate::core::filter::SortSpecification;
use crate::query::is_forbidden_field;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::OnceLock;

/// Upstream column to domain field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMapping {
    /// Upstream column name (uppercase identifier)
    pub column: String,

    /// Domain field name (camelCase)
    pub field: String,

    #[serde(default)]
    pub kind: FieldKind,
}

impl FieldMapping {
    pub fn new(column: impl Into<String>, field: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            column: column.into(),
            field: field.into(),
            kind,
        }
    }
}

/// What to do with a sort field outside the allow-list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortPolicy {
    /// Use the resource's default sort and log a warning
    #[default]
    Fallback,
    /// Fail with `InvalidSortField`
    Reject,
}

/// How pages are emulated against a "top N only" upstream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum PaginationStrategy {
    /// One bounded query for the whole result, sliced in the gateway.
    /// Only for resources whose filtered result stays under `max_rows`.
    FetchAllThenSlice { max_rows: usize },

    /// A `COUNT(*)` query for the total, then `TOP page*perPage` rows.
    /// The two queries are not transactional.
    #[default]
    CountThenFetch,
}

/// Declaration of one resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSchema {
    /// Route name (e.g. "work-orders")
    pub name: String,

    pub table_name: String,

    /// Domain field holding the primary key
    pub primary_key: String,

    pub fields: Vec<FieldMapping>,

    #[serde(default)]
    pub filterable_fields: Vec<String>,

    #[serde(default)]
    pub sortable_fields: Vec<String>,

    /// Fields matched by the free-text `search` term
    #[serde(default)]
    pub search_fields: Vec<String>,

    pub default_sort: SortSpecification,

    #[serde(default)]
    pub sort_policy: SortPolicy,

    #[serde(default)]
    pub pagination: PaginationStrategy,
}

impl ResourceSchema {
    /// Start a declaration; the default sort is the primary key ascending
    pub fn new(
        name: impl Into<String>,
        table_name: impl Into<String>,
        primary_key: impl Into<String>,
    ) -> Self {
        let primary_key = primary_key.into();
        Self {
            name: name.into(),
            table_name: table_name.into(),
            default_sort: SortSpecification::asc(primary_key.clone()),
            primary_key,
            fields: Vec::new(),
            filterable_fields: Vec::new(),
            sortable_fields: Vec::new(),
            search_fields: Vec::new(),
            sort_policy: SortPolicy::default(),
            pagination: PaginationStrategy::default(),
        }
    }

    pub fn field(mut self, column: &str, field: &str, kind: FieldKind) -> Self {
        self.fields.push(FieldMapping::new(column, field, kind));
        self
    }

    pub fn filterable(mut self, fields: &[&str]) -> Self {
        self.filterable_fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn sortable(mut self, fields: &[&str]) -> Self {
        self.sortable_fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn searchable(mut self, fields: &[&str]) -> Self {
        self.search_fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn default_sort(mut self, sort: SortSpecification) -> Self {
        self.default_sort = sort;
        self
    }

    pub fn sort_policy(mut self, policy: SortPolicy) -> Self {
        self.sort_policy = policy;
        self
    }

    pub fn pagination(mut self, strategy: PaginationStrategy) -> Self {
        self.pagination = strategy;
        self
    }

    /// Mapping for a domain field
    pub fn mapping(&self, field: &str) -> Option<&FieldMapping> {
        self.fields.iter().find(|m| m.field == field)
    }

    pub fn primary_key_mapping(&self) -> Option<&FieldMapping> {
        self.mapping(&self.primary_key)
    }

    pub fn is_filterable(&self, field: &str) -> bool {
        self.filterable_fields.iter().any(|f| f == field)
    }

    pub fn is_sortable(&self, field: &str) -> bool {
        self.sortable_fields.iter().any(|f| f == field)
    }

    /// Check identifiers and cross references.
    ///
    /// Table and column names are interpolated into query text verbatim, so
    /// only plain uppercase identifiers are accepted.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &str, message: String| ConfigError::Invalid {
            key: format!("resources.{}.{}", self.name, key),
            message,
        };

        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "resources".to_string(),
                message: "resource name cannot be empty".to_string(),
            });
        }
        if !is_identifier(&self.table_name) {
            return Err(invalid(
                "table_name",
                format!("'{}' is not a valid identifier", self.table_name),
            ));
        }
        if self.fields.is_empty() {
            return Err(invalid("fields", "at least one field is required".to_string()));
        }

        let mut seen = HashSet::new();
        for mapping in &self.fields {
            if !is_identifier(&mapping.column) {
                return Err(invalid(
                    "fields",
                    format!("column '{}' is not a valid identifier", mapping.column),
                ));
            }
            if is_forbidden_field(&mapping.column) {
                return Err(invalid(
                    "fields",
                    format!("column '{}' holds binary data and cannot be selected", mapping.column),
                ));
            }
            if mapping.field.trim().is_empty() {
                return Err(invalid(
                    "fields",
                    format!("column '{}' maps to an empty field name", mapping.column),
                ));
            }
            if !seen.insert(mapping.field.as_str()) {
                return Err(invalid(
                    "fields",
                    format!("field '{}' is declared twice", mapping.field),
                ));
            }
        }

        let ensure_mapped = |key: &str, field: &str| {
            if self.mapping(field).is_some() {
                Ok(())
            } else {
                Err(invalid(key, format!("field '{}' is not mapped", field)))
            }
        };

        ensure_mapped("primary_key", &self.primary_key)?;
        ensure_mapped("default_sort", &self.default_sort.field)?;
        for field in &self.filterable_fields {
            ensure_mapped("filterable_fields", field)?;
        }
        for field in &self.sortable_fields {
            ensure_mapped("sortable_fields", field)?;
        }
        for field in &self.search_fields {
            ensure_mapped("search_fields", field)?;
        }

        if let PaginationStrategy::FetchAllThenSlice { max_rows: 0 } = self.pagination {
            return Err(invalid("pagination", "max_rows must be positive".to_string()));
        }

        Ok(())
    }
}

/// Plain upstream identifier: `^[A-Z_][A-Z0-9_]*$`
pub fn is_identifier(name: &str) -> bool {
    static IDENTIFIER_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = IDENTIFIER_REGEX
        .get_or_init(|| Regex::new(r"^[A-Z_][A-Z0-9_]*$").expect("identifier regex"));
    regex.is_match(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ResourceSchema {
        ResourceSchema::new("items", "TGFITE", "id")
            .field("CODITE", "id", FieldKind::Integer)
            .field("DESCR", "description", FieldKind::Text)
            .filterable(&["id", "description"])
            .sortable(&["id"])
    }

    #[test]
    fn test_valid_schema() {
        assert!(sample().validate().is_ok());
        assert_eq!(sample().default_sort, SortSpecification::asc("id"));
        assert_eq!(sample().primary_key_mapping().unwrap().column, "CODITE");
    }

    #[test]
    fn test_rejects_injected_identifiers() {
        let schema = ResourceSchema::new("items", "TGFITE; DROP TABLE X", "id")
            .field("CODITE", "id", FieldKind::Integer);
        assert!(schema.validate().is_err());

        let schema = ResourceSchema::new("items", "TGFITE", "id")
            .field("codite", "id", FieldKind::Integer);
        assert!(schema.validate().is_err());
    }

    #[test]
    fn test_rejects_unmapped_references() {
        let err = sample().filterable(&["ghost"]).validate().unwrap_err();
        assert!(err.to_string().contains("ghost"));

        let schema = sample().default_sort(SortSpecification::desc("ghost"));
        assert!(schema.validate().is_err());
    }

    #[test]
    fn test_rejects_binary_columns() {
        let err = sample()
            .field("IMAGEM", "picture", FieldKind::Auto)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("IMAGEM"));
        assert!(err.to_string().contains("resources.items.fields"));
    }

    #[test]
    fn test_rejects_zero_row_ceiling() {
        let schema = sample().pagination(PaginationStrategy::FetchAllThenSlice { max_rows: 0 });
        let err = schema.validate().unwrap_err();
        assert!(err.to_string().contains("resources.items.pagination"));

        let schema = sample().pagination(PaginationStrategy::FetchAllThenSlice { max_rows: 1 });
        assert!(schema.validate().is_ok());
    }

    #[test]
    fn test_rejects_duplicate_fields() {
        let schema = sample().field("OTHER", "description", FieldKind::Text);
        assert!(schema.validate().is_err());
    }

    #[test]
    fn test_yaml_declaration() {
        let yaml = r#"
name: suppliers
table_name: TGFPAR
primary_key: id
fields:
  - { column: CODPARC, field: id, kind: integer }
  - { column: NOMEPARC, field: name }
filterable_fields: [name]
sortable_fields: [id, name]
default_sort: { field: name }
sort_policy: reject
pagination: { strategy: fetch_all_then_slice, max_rows: 500 }
"#;
        let schema: ResourceSchema = serde_yaml::from_str(yaml).unwrap();
        assert!(schema.validate().is_ok());
        assert_eq!(schema.fields[1].kind, FieldKind::Auto);
        assert_eq!(schema.sort_policy, SortPolicy::Reject);
        assert_eq!(
            schema.pagination,
            PaginationStrategy::FetchAllThenSlice { max_rows: 500 }
        );
    }
}
