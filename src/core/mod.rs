//! Core types: resources, specifications, credentials, errors and the
//! query service built from them

pub mod credential;
pub mod error;
pub mod field;
pub mod filter;
pub mod mapper;
pub mod pagination;
pub mod query;
pub mod resource;
pub mod service;

pub use credential::{CredentialContext, with_credential};
pub use error::{GatewayError, GatewayResult};
pub use field::{FieldKind, FieldValue};
pub use filter::{FilterSpecification, Predicate, SortDirection, SortSpecification};
pub use mapper::{RowMapper, UpstreamRow};
pub use pagination::{PageResult, Paginator};
pub use query::{PageLimits, PageRequest, Projection, QueryParams};
pub use resource::{FieldMapping, PaginationStrategy, ResourceSchema, SortPolicy};
pub use service::{EntityQueryService, ResourceFetcher};
