//! # ERP Gateway
//!
//! A read gateway in front of an ERP whose only interface is an HTTP endpoint
//! that runs SQL-like query text and returns rows.
//!
//! ## Features
//!
//! - **Safe query building**: allow-listed fields, one escaping primitive for
//!   every literal, and a read-only guard on the final text
//! - **Emulated pagination**: fetch-all-then-slice or count-then-fetch, with a
//!   hard row ceiling, over an upstream that only knows "top N"
//! - **Request-scoped credentials**: the caller's bearer token travels with
//!   each call and is never stored on shared state
//! - **Typed errors**: one closed taxonomy from query building to HTTP status
//! - **Declarative resources**: table, mapping and allow-lists are data
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use erp_gateway::prelude::*;
//!
//! let service = EntityQueryService::<JobRole>::new(
//!     Arc::new(JobRole::schema()),
//!     Arc::new(HttpQueryExecutor::new(&config.upstream)?),
//!     config.limits.max_fetch_rows,
//! );
//!
//! let page = with_credential(token, |credential| async move {
//!     service
//!         .find_all(
//!             &credential,
//!             &FilterSpecification::new().with(Predicate::equals("active", "S")),
//!             Some(&SortSpecification::asc("description")),
//!             PageRequest::new(1, 20),
//!         )
//!         .await
//! })
//! .await?;
//! ```

pub mod config;
pub mod core;
pub mod query;
pub mod resources;
pub mod server;
pub mod upstream;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Core ===
    pub use crate::core::{
        credential::{CredentialContext, with_credential},
        error::{
            ConfigError, CredentialError, GatewayError, GatewayResult, QueryError, ResourceError,
            UpstreamError,
        },
        field::{FieldKind, FieldValue},
        filter::{FilterSpecification, Predicate, SortDirection, SortSpecification},
        mapper::{RowMapper, UpstreamRow},
        pagination::{PageResult, Paginator},
        query::{PageLimits, PageRequest, Projection, QueryParams},
        resource::{FieldMapping, PaginationStrategy, ResourceSchema, SortPolicy},
        service::{EntityQueryService, ResourceFetcher},
    };

    // === Query text ===
    pub use crate::query::{QueryBuilder, QueryText};

    // === Upstream ===
    pub use crate::upstream::{HttpQueryExecutor, InMemoryExecutor, QueryExecutor};

    // === Resources ===
    pub use crate::resources::{JobRole, Product, Resource, WorkOrder};

    // === Config ===
    pub use crate::config::GatewayConfig;

    // === Server ===
    pub use crate::server::{ResourceRegistry, ServerBuilder, ServerHost};

    // === External dependencies ===
    pub use async_trait::async_trait;
    pub use serde::{Deserialize, Serialize};
    pub use std::sync::Arc;
}
