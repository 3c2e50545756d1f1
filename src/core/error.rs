//! Typed error handling for the gateway
//!
//! Every failure the gateway can surface is one variant of [`GatewayError`].
//! The caller-facing layer only has to match on it (or let axum turn it into a
//! response); nothing below the service boundary throws untyped errors.
//!
//! # Error Categories
//!
//! - [`QueryError`]: caller input rejected before any upstream call
//! - [`CredentialError`]: no usable upstream credential for this request
//! - [`UpstreamError`]: the ERP query endpoint failed or timed out
//! - [`ResourceError`]: unknown resources and by-id misses at the API layer
//! - [`ConfigError`]: configuration loading and validation
//!
//! # Example
//!
//! ```rust,ignore
//! match service.find_all(&credential, &filters, None, page).await {
//!     Ok(page) => println!("{} of {}", page.data.len(), page.total),
//!     Err(GatewayError::Credential(CredentialError::Expired { .. })) => {
//!         println!("log in again");
//!     }
//!     Err(e) => eprintln!("{}", e),
//! }
//! ```

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Maximum number of characters of upstream diagnostic text kept on an error.
pub const MAX_DIAGNOSTIC_CHARS: usize = 500;

/// The main error type for the gateway
#[derive(Debug)]
pub enum GatewayError {
    /// Caller input rejected before reaching the upstream
    Query(QueryError),

    /// Missing, expired or malformed upstream credential
    Credential(CredentialError),

    /// Upstream call failed
    Upstream(UpstreamError),

    /// Resource lookup errors (API layer)
    Resource(ResourceError),

    /// Configuration errors
    Config(ConfigError),

    /// Internal errors (should not happen in normal operation)
    Internal(String),
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::Query(e) => write!(f, "{}", e),
            GatewayError::Credential(e) => write!(f, "{}", e),
            GatewayError::Upstream(e) => write!(f, "{}", e),
            GatewayError::Resource(e) => write!(f, "{}", e),
            GatewayError::Config(e) => write!(f, "{}", e),
            GatewayError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for GatewayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GatewayError::Query(e) => Some(e),
            GatewayError::Credential(e) => Some(e),
            GatewayError::Upstream(e) => Some(e),
            GatewayError::Resource(e) => Some(e),
            GatewayError::Config(e) => Some(e),
            GatewayError::Internal(_) => None,
        }
    }
}

/// Error response structure for HTTP responses
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl GatewayError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Query(e) => e.status_code(),
            GatewayError::Credential(_) => StatusCode::UNAUTHORIZED,
            GatewayError::Upstream(e) => e.status_code(),
            GatewayError::Resource(e) => e.status_code(),
            GatewayError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            GatewayError::Query(e) => e.error_code(),
            GatewayError::Credential(e) => e.error_code(),
            GatewayError::Upstream(e) => e.error_code(),
            GatewayError::Resource(e) => e.error_code(),
            GatewayError::Config(_) => "CONFIG_ERROR",
            GatewayError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether a second attempt may succeed without any change to the request
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GatewayError::Upstream(UpstreamError::Timeout { .. })
                | GatewayError::Upstream(UpstreamError::Unavailable { .. })
        )
    }

    /// Convert to an error response
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            code: self.error_code().to_string(),
            message: self.to_string(),
            details: self.details(),
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            GatewayError::Query(QueryError::InvalidFilterField { resource, field })
            | GatewayError::Query(QueryError::InvalidSortField { resource, field }) => {
                Some(serde_json::json!({ "resource": resource, "field": field }))
            }
            GatewayError::Query(QueryError::RowCeilingExceeded {
                resource,
                requested,
                ceiling,
            }) => Some(serde_json::json!({
                "resource": resource,
                "requested": requested,
                "ceiling": ceiling
            })),
            GatewayError::Resource(ResourceError::NotFound { resource, id }) => {
                Some(serde_json::json!({ "resource": resource, "id": id }))
            }
            GatewayError::Upstream(UpstreamError::QueryFailed { status, .. }) => {
                status.map(|s| serde_json::json!({ "upstream_status": s }))
            }
            _ => None,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self.to_response());
        (status, body).into_response()
    }
}

// =============================================================================
// Query Errors
// =============================================================================

/// Caller input that cannot be compiled into upstream query text
#[derive(Debug)]
pub enum QueryError {
    /// Filter field is not in the resource's filterable allow-list
    InvalidFilterField { resource: String, field: String },

    /// Sort field is not in the resource's sortable allow-list
    InvalidSortField { resource: String, field: String },

    /// Filter value does not fit the field or operator
    InvalidFilterValue { field: String, message: String },

    /// Page request out of range
    InvalidPage { message: String },

    /// Request would fetch more rows than the configured ceiling
    RowCeilingExceeded {
        resource: String,
        requested: usize,
        ceiling: usize,
    },

    /// Compiled text failed the read-only guard
    ForbiddenQuery { reason: String },
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryError::InvalidFilterField { resource, field } => {
                write!(f, "Field '{}' cannot be filtered on {}", field, resource)
            }
            QueryError::InvalidSortField { resource, field } => {
                write!(f, "Field '{}' cannot be sorted on {}", field, resource)
            }
            QueryError::InvalidFilterValue { field, message } => {
                write!(f, "Invalid value for filter '{}': {}", field, message)
            }
            QueryError::InvalidPage { message } => {
                write!(f, "Invalid page request: {}", message)
            }
            QueryError::RowCeilingExceeded {
                resource,
                requested,
                ceiling,
            } => {
                write!(
                    f,
                    "Request on {} needs {} rows, above the ceiling of {}",
                    resource, requested, ceiling
                )
            }
            QueryError::ForbiddenQuery { reason } => {
                write!(f, "Query rejected: {}", reason)
            }
        }
    }
}

impl std::error::Error for QueryError {}

impl QueryError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            QueryError::ForbiddenQuery { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            QueryError::RowCeilingExceeded { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            QueryError::InvalidFilterField { .. } => "INVALID_FILTER_FIELD",
            QueryError::InvalidSortField { .. } => "INVALID_SORT_FIELD",
            QueryError::InvalidFilterValue { .. } => "INVALID_FILTER_VALUE",
            QueryError::InvalidPage { .. } => "INVALID_PAGE",
            QueryError::RowCeilingExceeded { .. } => "ROW_CEILING_EXCEEDED",
            QueryError::ForbiddenQuery { .. } => "FORBIDDEN_QUERY",
        }
    }
}

impl From<QueryError> for GatewayError {
    fn from(err: QueryError) -> Self {
        GatewayError::Query(err)
    }
}

// =============================================================================
// Credential Errors
// =============================================================================

/// No usable credential in the current request's context
#[derive(Debug)]
pub enum CredentialError {
    /// No bearer token on the request
    Missing,

    /// Token expiry is in the past
    Expired { expired_at: DateTime<Utc> },

    /// Token looks like a JWT but its claims cannot be read
    Malformed { message: String },
}

impl fmt::Display for CredentialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialError::Missing => write!(f, "Missing upstream credential"),
            CredentialError::Expired { expired_at } => {
                write!(f, "Upstream credential expired at {}", expired_at.to_rfc3339())
            }
            CredentialError::Malformed { message } => {
                write!(f, "Malformed upstream credential: {}", message)
            }
        }
    }
}

impl std::error::Error for CredentialError {}

impl CredentialError {
    pub fn error_code(&self) -> &'static str {
        match self {
            CredentialError::Missing => "MISSING_CREDENTIAL",
            CredentialError::Expired { .. } => "EXPIRED_CREDENTIAL",
            CredentialError::Malformed { .. } => "MALFORMED_CREDENTIAL",
        }
    }
}

impl From<CredentialError> for GatewayError {
    fn from(err: CredentialError) -> Self {
        GatewayError::Credential(err)
    }
}

// =============================================================================
// Upstream Errors
// =============================================================================

/// Failures of the ERP query endpoint
#[derive(Debug)]
pub enum UpstreamError {
    /// No response within the deadline
    Timeout { elapsed_ms: u64 },

    /// Upstream accepted the call but reported a query-execution failure
    QueryFailed {
        status: Option<u16>,
        diagnostic: String,
    },

    /// Upstream refused the credential
    Rejected { status: u16 },

    /// Upstream could not be reached or is down
    Unavailable { message: String },

    /// Upstream answered with a body that is neither rows nor an error envelope
    InvalidResponse { message: String },
}

impl UpstreamError {
    /// Build a `QueryFailed` keeping at most [`MAX_DIAGNOSTIC_CHARS`] of the text
    pub fn query_failed(status: Option<u16>, diagnostic: &str) -> Self {
        UpstreamError::QueryFailed {
            status,
            diagnostic: truncate_chars(diagnostic, MAX_DIAGNOSTIC_CHARS),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            UpstreamError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            UpstreamError::QueryFailed { .. } => StatusCode::BAD_GATEWAY,
            UpstreamError::Rejected { .. } => StatusCode::UNAUTHORIZED,
            UpstreamError::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            UpstreamError::InvalidResponse { .. } => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            UpstreamError::Timeout { .. } => "UPSTREAM_TIMEOUT",
            UpstreamError::QueryFailed { .. } => "UPSTREAM_QUERY_FAILED",
            UpstreamError::Rejected { .. } => "UPSTREAM_REJECTED_CREDENTIAL",
            UpstreamError::Unavailable { .. } => "UPSTREAM_UNAVAILABLE",
            UpstreamError::InvalidResponse { .. } => "UPSTREAM_INVALID_RESPONSE",
        }
    }
}

impl fmt::Display for UpstreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpstreamError::Timeout { elapsed_ms } => {
                write!(f, "Upstream query timed out after {}ms", elapsed_ms)
            }
            UpstreamError::QueryFailed { status, diagnostic } => match status {
                Some(status) => write!(f, "Upstream query failed (HTTP {}): {}", status, diagnostic),
                None => write!(f, "Upstream query failed: {}", diagnostic),
            },
            UpstreamError::Rejected { status } => {
                write!(f, "Upstream rejected the credential (HTTP {})", status)
            }
            UpstreamError::Unavailable { message } => {
                write!(f, "Upstream unavailable: {}", message)
            }
            UpstreamError::InvalidResponse { message } => {
                write!(f, "Upstream returned an invalid response: {}", message)
            }
        }
    }
}

impl std::error::Error for UpstreamError {}

impl From<UpstreamError> for GatewayError {
    fn from(err: UpstreamError) -> Self {
        GatewayError::Upstream(err)
    }
}

// =============================================================================
// Resource Errors
// =============================================================================

/// Errors related to resource routing at the API layer
#[derive(Debug)]
pub enum ResourceError {
    /// A by-id lookup returned zero rows
    NotFound { resource: String, id: String },

    /// Resource name is not registered
    UnknownResource { resource: String },
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::NotFound { resource, id } => {
                write!(f, "{} with id '{}' not found", resource, id)
            }
            ResourceError::UnknownResource { resource } => {
                write!(f, "Unknown resource: {}", resource)
            }
        }
    }
}

impl std::error::Error for ResourceError {}

impl ResourceError {
    pub fn status_code(&self) -> StatusCode {
        StatusCode::NOT_FOUND
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ResourceError::NotFound { .. } => "RESOURCE_NOT_FOUND",
            ResourceError::UnknownResource { .. } => "UNKNOWN_RESOURCE",
        }
    }
}

impl From<ResourceError> for GatewayError {
    fn from(err: ResourceError) -> Self {
        GatewayError::Resource(err)
    }
}

// =============================================================================
// Config Errors
// =============================================================================

/// Errors related to configuration
#[derive(Debug)]
pub enum ConfigError {
    /// Configuration file not found
    FileNotFound { path: String },

    /// Failed to parse configuration
    ParseError {
        file: Option<String>,
        message: String,
    },

    /// Configuration value rejected
    Invalid { key: String, message: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound { path } => {
                write!(f, "Configuration file not found: {}", path)
            }
            ConfigError::ParseError { file, message } => match file {
                Some(file) => write!(f, "Failed to parse {}: {}", file, message),
                None => write!(f, "Failed to parse configuration: {}", message),
            },
            ConfigError::Invalid { key, message } => {
                write!(f, "Invalid configuration '{}': {}", key, message)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for GatewayError {
    fn from(err: ConfigError) -> Self {
        GatewayError::Config(err)
    }
}

// =============================================================================
// Conversions from external errors
// =============================================================================

impl From<serde_yaml::Error> for GatewayError {
    fn from(err: serde_yaml::Error) -> Self {
        GatewayError::Config(ConfigError::ParseError {
            file: None,
            message: err.to_string(),
        })
    }
}

impl From<validator::ValidationErrors> for GatewayError {
    fn from(err: validator::ValidationErrors) -> Self {
        GatewayError::Query(QueryError::InvalidPage {
            message: err.to_string(),
        })
    }
}

/// Truncate to `max` characters, marking the cut with an ellipsis
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

// =============================================================================
// Result type alias
// =============================================================================

/// A specialized Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_filter_field_display() {
        let err = QueryError::InvalidFilterField {
            resource: "work-orders".to_string(),
            field: "password".to_string(),
        };
        assert!(err.to_string().contains("password"));
        assert!(err.to_string().contains("work-orders"));
    }

    #[test]
    fn test_status_codes() {
        let err: GatewayError = CredentialError::Missing.into();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);

        let err: GatewayError = UpstreamError::Timeout { elapsed_ms: 10 }.into();
        assert_eq!(err.status_code(), StatusCode::GATEWAY_TIMEOUT);

        let err: GatewayError = ResourceError::NotFound {
            resource: "products".to_string(),
            id: "42".to_string(),
        }
        .into();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.error_code(), "RESOURCE_NOT_FOUND");
    }

    #[test]
    fn test_query_failed_truncates_diagnostic() {
        let long = "x".repeat(MAX_DIAGNOSTIC_CHARS * 2);
        let UpstreamError::QueryFailed { diagnostic, .. } =
            UpstreamError::query_failed(Some(500), &long)
        else {
            panic!("expected QueryFailed");
        };
        assert_eq!(diagnostic.chars().count(), MAX_DIAGNOSTIC_CHARS + 3);
        assert!(diagnostic.ends_with("..."));
    }

    #[test]
    fn test_truncate_chars_respects_char_boundaries() {
        assert_eq!(truncate_chars("ação", 2), "aç...");
        assert_eq!(truncate_chars("abc", 5), "abc");
    }

    #[test]
    fn test_transient_classification() {
        assert!(GatewayError::from(UpstreamError::Timeout { elapsed_ms: 1 }).is_transient());
        assert!(!GatewayError::from(UpstreamError::Rejected { status: 401 }).is_transient());
        assert!(!GatewayError::from(UpstreamError::query_failed(None, "bad")).is_transient());
    }

    #[test]
    fn test_error_response_details() {
        let err = GatewayError::Query(QueryError::InvalidSortField {
            resource: "products".to_string(),
            field: "secret".to_string(),
        });
        let response = err.to_response();
        assert_eq!(response.code, "INVALID_SORT_FIELD");
        assert_eq!(response.details.unwrap()["field"], "secret");
    }
}
