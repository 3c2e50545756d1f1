//! HTTP exposure of the registered resources
//!
//! `ServerBuilder` collects resources and configuration, builds a
//! [`ServerHost`] and serves it through the REST router.

pub mod builder;
pub mod extractors;
pub mod handlers;
pub mod host;
pub mod registry;
pub mod router;

pub use builder::ServerBuilder;
pub use host::ServerHost;
pub use registry::ResourceRegistry;
pub use router::build_router;
