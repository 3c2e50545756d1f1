//! Caller query parameters and page requests

use crate::core::error::{GatewayResult, QueryError};
use crate::core::filter::{FilterSpecification, SortSpecification};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::Validate;

/// Query parameters of a listing request
///
/// # Example
/// ```text
/// GET /api/work-orders?page=2&perPage=10
/// GET /api/work-orders?filter={"status": "E"}&sort=createdAt:desc
/// GET /api/products?search=parafuso&fields=id,description
/// GET /api/products?fields=-grossWeight,-netWeight
/// ```
///
/// Unknown parameters are rejected, which keeps the legacy `pagina`,
/// `itensPorPagina` and `offset` spellings out of the contract.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct QueryParams {
    /// Page number (starts at 1)
    pub page: Option<usize>,

    /// Number of records per page
    pub per_page: Option<usize>,

    /// Filters as a JSON object keyed by field name
    pub filter: Option<String>,

    /// `field` or `field:asc|desc`
    pub sort: Option<String>,

    /// Free-text search over the resource's search fields
    pub search: Option<String>,

    /// Projection: `a,b` keeps fields, `-a,-b` drops them, `*` keeps all
    pub fields: Option<String>,
}

impl QueryParams {
    /// Page request, defaulted and bounded by the configured limits
    pub fn page_request(&self, limits: &PageLimits) -> GatewayResult<PageRequest> {
        PageRequest::new(
            self.page.unwrap_or(1),
            self.per_page.unwrap_or(limits.default_per_page),
        )
        .bounded(limits.max_per_page)
    }

    /// Filter specification from `filter` and `search`
    pub fn filters(&self) -> Result<FilterSpecification, QueryError> {
        let spec = match self.filter.as_deref().map(str::trim) {
            None | Some("") => FilterSpecification::new(),
            Some(raw) => {
                let value: Value =
                    serde_json::from_str(raw).map_err(|e| QueryError::InvalidFilterValue {
                        field: "filter".to_string(),
                        message: e.to_string(),
                    })?;
                FilterSpecification::from_json(&value)?
            }
        };
        Ok(match &self.search {
            Some(term) => spec.with_search(term.as_str()),
            None => spec,
        })
    }

    pub fn sort(&self) -> Result<Option<SortSpecification>, QueryError> {
        match self.sort.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => SortSpecification::parse(raw).map(Some),
        }
    }

    pub fn projection(&self) -> Projection {
        self.fields
            .as_deref()
            .map(Projection::parse)
            .unwrap_or_default()
    }
}

/// Defaults and bounds applied to caller page requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub default_per_page: usize,
    pub max_per_page: usize,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_per_page: 20,
            max_per_page: 100,
        }
    }
}

/// `{page ≥ 1, perPage ≥ 1}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    #[validate(range(min = 1))]
    pub page: usize,

    #[validate(range(min = 1))]
    pub per_page: usize,
}

impl PageRequest {
    pub fn new(page: usize, per_page: usize) -> Self {
        Self { page, per_page }
    }

    /// Validate and check `per_page` against the configured maximum
    pub fn bounded(self, max_per_page: usize) -> GatewayResult<Self> {
        self.validate()?;
        if self.per_page > max_per_page {
            return Err(QueryError::InvalidPage {
                message: format!(
                    "perPage {} exceeds the maximum of {}",
                    self.per_page, max_per_page
                ),
            }
            .into());
        }
        Ok(self)
    }

    /// Zero-based index of the first row of the page
    pub fn start(&self) -> usize {
        (self.page - 1).saturating_mul(self.per_page)
    }

    /// Exclusive end of the page window; also the "top N" needed to reach it
    pub fn end(&self) -> usize {
        self.page.saturating_mul(self.per_page)
    }
}

/// Record projection from the `fields` parameter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Projection {
    #[default]
    All,
    Include(Vec<String>),
    Exclude(Vec<String>),
}

impl Projection {
    /// Parse `a,b` / `-a,-b` / `*`. A list mixing both forms keeps only
    /// the included names.
    pub fn parse(raw: &str) -> Self {
        let names: Vec<&str> = raw
            .split(',')
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .collect();

        if names.is_empty() || names.contains(&"*") {
            return Projection::All;
        }

        let include: Vec<String> = names
            .iter()
            .filter(|n| !n.starts_with('-'))
            .map(|n| n.to_string())
            .collect();
        if !include.is_empty() {
            return Projection::Include(include);
        }

        Projection::Exclude(
            names
                .iter()
                .filter_map(|n| n.strip_prefix('-'))
                .map(|n| n.trim().to_string())
                .collect(),
        )
    }

    /// Apply to one record; non-object values pass through unchanged
    pub fn apply(&self, record: Value) -> Value {
        let Value::Object(map) = record else {
            return record;
        };
        let projected: Map<String, Value> = match self {
            Projection::All => map,
            Projection::Include(keep) => map
                .into_iter()
                .filter(|(k, _)| keep.iter().any(|f| f == k))
                .collect(),
            Projection::Exclude(drop) => map
                .into_iter()
                .filter(|(k, _)| !drop.iter().any(|f| f == k))
                .collect(),
        };
        Value::Object(projected)
    }
}
