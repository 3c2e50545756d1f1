//! Compiles filter, sort and limit specifications into upstream query text

use crate::core::error::{GatewayResult, QueryError};
use crate::core::filter::{
    FilterOperator, FilterSpecification, FilterValue, Predicate, SortDirection, SortSpecification,
};
use crate::core::resource::{FieldMapping, ResourceSchema, SortPolicy};
use crate::query::QueryText;
use crate::query::literal::{LiteralError, like_pattern, render_literal};

/// Stateless query compiler.
///
/// Identifiers come from validated resource declarations only; caller
/// values reach the text exclusively through [`render_literal`] and
/// [`like_pattern`].
pub struct QueryBuilder;

impl QueryBuilder {
    /// `SELECT TOP {limit} {columns} FROM {table} [WHERE ...] ORDER BY {column} {dir}`
    ///
    /// No `OFFSET` is ever emitted; callers slice windows out of the top N.
    pub fn build(
        resource: &ResourceSchema,
        filters: &FilterSpecification,
        sort: Option<&SortSpecification>,
        limit: usize,
    ) -> GatewayResult<QueryText> {
        if limit == 0 {
            return Err(QueryError::InvalidPage {
                message: "limit must be at least 1".to_string(),
            }
            .into());
        }

        let where_clause = Self::where_clause(resource, filters)?;
        let (sort_column, direction) = Self::resolve_sort(resource, sort)?;

        let mut text = format!(
            "SELECT TOP {} {} FROM {}",
            limit,
            Self::select_list(resource),
            resource.table_name
        );
        if let Some(where_clause) = where_clause {
            text.push_str(" WHERE ");
            text.push_str(&where_clause);
        }
        text.push_str(&format!(" ORDER BY {} {}", sort_column, direction.as_sql()));

        Ok(QueryText::new(text)?)
    }

    /// `SELECT COUNT(*) AS TOTAL FROM {table} [WHERE ...]`
    pub fn build_count(
        resource: &ResourceSchema,
        filters: &FilterSpecification,
    ) -> GatewayResult<QueryText> {
        let mut text = format!("SELECT COUNT(*) AS TOTAL FROM {}", resource.table_name);
        if let Some(where_clause) = Self::where_clause(resource, filters)? {
            text.push_str(" WHERE ");
            text.push_str(&where_clause);
        }
        Ok(QueryText::new(text)?)
    }

    /// Equality on the primary key, `TOP 1`.
    ///
    /// The primary key need not be filterable by callers.
    pub fn build_by_id(resource: &ResourceSchema, id: &str) -> GatewayResult<QueryText> {
        let mapping = Self::mapping(resource, &resource.primary_key)?;
        let condition = Self::condition(mapping, &Predicate::equals(&resource.primary_key, id))?;
        Ok(QueryText::new(format!(
            "SELECT TOP 1 {} FROM {} WHERE {}",
            Self::select_list(resource),
            resource.table_name,
            condition
        ))?)
    }

    fn select_list(resource: &ResourceSchema) -> String {
        resource
            .fields
            .iter()
            .map(|m| m.column.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn where_clause(
        resource: &ResourceSchema,
        filters: &FilterSpecification,
    ) -> GatewayResult<Option<String>> {
        let mut conditions = Vec::with_capacity(filters.predicates().len() + 1);

        for predicate in filters.predicates() {
            if !resource.is_filterable(&predicate.field) {
                return Err(QueryError::InvalidFilterField {
                    resource: resource.name.clone(),
                    field: predicate.field.clone(),
                }
                .into());
            }
            let mapping = Self::mapping(resource, &predicate.field)?;
            conditions.push(Self::condition(mapping, predicate)?);
        }

        if let Some(term) = filters.search() {
            if resource.search_fields.is_empty() {
                return Err(QueryError::InvalidFilterField {
                    resource: resource.name.clone(),
                    field: "search".to_string(),
                }
                .into());
            }
            let pattern = like_pattern(term).map_err(|e| invalid_value("search", e))?;
            let alternatives = resource
                .search_fields
                .iter()
                .map(|field| {
                    Self::mapping(resource, field).map(|m| format!("{} LIKE {}", m.column, pattern))
                })
                .collect::<GatewayResult<Vec<_>>>()?;
            conditions.push(format!("({})", alternatives.join(" OR ")));
        }

        Ok((!conditions.is_empty()).then(|| conditions.join(" AND ")))
    }

    fn condition(mapping: &FieldMapping, predicate: &Predicate) -> GatewayResult<String> {
        let field = predicate.field.as_str();
        let literal =
            |raw: &str| render_literal(mapping.kind, raw).map_err(|e| invalid_value(field, e));
        let column = mapping.column.as_str();

        let condition = match (predicate.operator, &predicate.value) {
            (FilterOperator::Equals, FilterValue::Single(v)) => {
                format!("{} = {}", column, literal(v.as_str())?)
            }
            (FilterOperator::Like, FilterValue::Single(v)) => {
                let pattern = like_pattern(v).map_err(|e| invalid_value(field, e))?;
                format!("{} LIKE {}", column, pattern)
            }
            (FilterOperator::Gte, FilterValue::Single(v)) => {
                format!("{} >= {}", column, literal(v.as_str())?)
            }
            (FilterOperator::Lte, FilterValue::Single(v)) => {
                format!("{} <= {}", column, literal(v.as_str())?)
            }
            (FilterOperator::Between, FilterValue::Range(from, to)) => {
                let (from, to) = (literal(from.as_str())?, literal(to.as_str())?);
                format!("{} BETWEEN {} AND {}", column, from, to)
            }
            (operator, _) => {
                return Err(QueryError::InvalidFilterValue {
                    field: field.to_string(),
                    message: format!("operand does not fit operator {:?}", operator),
                }
                .into());
            }
        };
        Ok(condition)
    }

    fn resolve_sort<'r>(
        resource: &'r ResourceSchema,
        sort: Option<&SortSpecification>,
    ) -> GatewayResult<(&'r str, SortDirection)> {
        if let Some(sort) = sort {
            if resource.is_sortable(&sort.field) {
                let mapping = Self::mapping(resource, &sort.field)?;
                return Ok((mapping.column.as_str(), sort.direction));
            }
            match resource.sort_policy {
                SortPolicy::Reject => {
                    return Err(QueryError::InvalidSortField {
                        resource: resource.name.clone(),
                        field: sort.field.clone(),
                    }
                    .into());
                }
                SortPolicy::Fallback => {
                    tracing::warn!(
                        resource = %resource.name,
                        field = %sort.field,
                        fallback = %resource.default_sort.field,
                        "sort field not allowed, using default sort"
                    );
                }
            }
        }

        let mapping = Self::mapping(resource, &resource.default_sort.field)?;
        Ok((mapping.column.as_str(), resource.default_sort.direction))
    }

    fn mapping<'r>(resource: &'r ResourceSchema, field: &str) -> GatewayResult<&'r FieldMapping> {
        resource.mapping(field).ok_or_else(|| {
            QueryError::InvalidFilterField {
                resource: resource.name.clone(),
                field: field.to_string(),
            }
            .into()
        })
    }
}

fn invalid_value(field: &str, err: LiteralError) -> crate::core::error::GatewayError {
    QueryError::InvalidFilterValue {
        field: field.to_string(),
        message: err.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::field::FieldKind;

    fn work_orders() -> ResourceSchema {
        ResourceSchema::new("work-orders", "TCFOSCAB", "id")
            .field("NUOS", "id", FieldKind::Integer)
            .field("STATUS", "status", FieldKind::Text)
            .field("PLACA", "plate", FieldKind::Text)
            .field("DTABERTURA", "createdAt", FieldKind::DateTime)
            .field("ATIVO", "active", FieldKind::Flag)
            .filterable(&["id", "status", "plate", "createdAt", "active"])
            .sortable(&["id", "createdAt"])
            .searchable(&["plate", "status"])
            .default_sort(SortSpecification::desc("createdAt"))
    }

    #[test]
    fn test_build_full_query() {
        let filters = FilterSpecification::new()
            .with(Predicate::equals("status", "E"))
            .with(Predicate::between("createdAt", "2024-01-01", "2024-01-31"))
            .with(Predicate::equals("active", "true"));
        let text = QueryBuilder::build(
            &work_orders(),
            &filters,
            Some(&SortSpecification::asc("id")),
            30,
        )
        .unwrap();

        assert_eq!(
            text.as_str(),
            "SELECT TOP 30 NUOS, STATUS, PLACA, DTABERTURA, ATIVO FROM TCFOSCAB \
             WHERE STATUS = 'E' \
             AND DTABERTURA BETWEEN '2024-01-01 00:00:00' AND '2024-01-31 00:00:00' \
             AND ATIVO = 'S' \
             ORDER BY NUOS ASC"
        );
    }

    #[test]
    fn test_every_predicate_appears_once() {
        let filters = FilterSpecification::new()
            .with(Predicate::equals("status", "E"))
            .with(Predicate::like("plate", "ABC"))
            .with(Predicate::gte("id", "10"))
            .with(Predicate::lte("id", "99"));
        let text = QueryBuilder::build(&work_orders(), &filters, None, 10).unwrap();
        let text = text.as_str();

        assert_eq!(text.matches("STATUS = 'E'").count(), 1);
        assert_eq!(text.matches("PLACA LIKE '%ABC%'").count(), 1);
        assert_eq!(text.matches("NUOS >= 10").count(), 1);
        assert_eq!(text.matches("NUOS <= 99").count(), 1);
        assert_eq!(text.matches(" AND ").count(), 3);
        assert!(!text.contains("OFFSET"));
    }

    #[test]
    fn test_quotes_are_doubled_in_every_predicate() {
        let filters = FilterSpecification::new()
            .with(Predicate::equals("status", "O'Brien"))
            .with(Predicate::like("plate", "O'Brien"))
            .with_search("O'Brien");
        let text = QueryBuilder::build(&work_orders(), &filters, None, 10).unwrap();

        assert!(text.as_str().contains("STATUS = 'O''Brien'"));
        assert!(text.as_str().contains("PLACA LIKE '%O''Brien%'"));
        assert!(
            text.as_str()
                .contains("(PLACA LIKE '%O''Brien%' OR STATUS LIKE '%O''Brien%')")
        );
    }

    #[test]
    fn test_injection_attempt_stays_inside_the_literal() {
        let filters =
            FilterSpecification::new().with(Predicate::equals("status", "x' OR '1'='1"));
        let text = QueryBuilder::build(&work_orders(), &filters, None, 10).unwrap();
        assert!(text.as_str().contains("STATUS = 'x'' OR ''1''=''1'"));
    }

    #[test]
    fn test_unknown_filter_field_is_rejected() {
        let filters = FilterSpecification::new().with(Predicate::equals("password", "x"));
        let err = QueryBuilder::build(&work_orders(), &filters, None, 10).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_FILTER_FIELD");
    }

    #[test]
    fn test_mapped_but_not_filterable_is_rejected() {
        let resource = work_orders().filterable(&["status"]);
        let filters = FilterSpecification::new().with(Predicate::equals("plate", "X"));
        assert!(QueryBuilder::build(&resource, &filters, None, 10).is_err());
    }

    #[test]
    fn test_invalid_numeric_value() {
        let filters = FilterSpecification::new().with(Predicate::gte("id", "1; DROP"));
        let err = QueryBuilder::build(&work_orders(), &filters, None, 10).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_FILTER_VALUE");
    }

    #[test]
    fn test_unknown_sort_falls_back_to_default() {
        let text = QueryBuilder::build(
            &work_orders(),
            &FilterSpecification::new(),
            Some(&SortSpecification::asc("secret")),
            5,
        )
        .unwrap();
        assert!(text.as_str().ends_with("ORDER BY DTABERTURA DESC"));
        assert!(!text.as_str().contains("secret"));
    }

    #[test]
    fn test_unknown_sort_rejected_by_policy() {
        let resource = work_orders().sort_policy(SortPolicy::Reject);
        let err = QueryBuilder::build(
            &resource,
            &FilterSpecification::new(),
            Some(&SortSpecification::asc("secret")),
            5,
        )
        .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_SORT_FIELD");
    }

    #[test]
    fn test_search_without_search_fields() {
        let resource = work_orders().searchable(&[]);
        let filters = FilterSpecification::new().with_search("abc");
        let err = QueryBuilder::build(&resource, &filters, None, 5).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_FILTER_FIELD");
    }

    #[test]
    fn test_count_query() {
        let filters = FilterSpecification::new().with(Predicate::equals("status", "E"));
        let text = QueryBuilder::build_count(&work_orders(), &filters).unwrap();
        assert_eq!(
            text.as_str(),
            "SELECT COUNT(*) AS TOTAL FROM TCFOSCAB WHERE STATUS = 'E'"
        );
    }

    #[test]
    fn test_by_id_query() {
        let text = QueryBuilder::build_by_id(&work_orders(), "42").unwrap();
        assert_eq!(
            text.as_str(),
            "SELECT TOP 1 NUOS, STATUS, PLACA, DTABERTURA, ATIVO FROM TCFOSCAB WHERE NUOS = 42"
        );
        assert!(QueryBuilder::build_by_id(&work_orders(), "42 OR 1=1").is_err());
    }
}
