//! Built-in resources with typed records
//!
//! Each resource pairs a record type with its [`ResourceSchema`]. Resources
//! declared only in configuration are served as JSON records instead.

pub mod job_roles;
pub mod products;
pub mod work_orders;

pub use job_roles::JobRole;
pub use products::Product;
pub use work_orders::WorkOrder;

use crate::core::resource::ResourceSchema;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// A record type served by the gateway
pub trait Resource: Serialize + DeserializeOwned + Send + 'static {
    /// Route name used in URLs (e.g. "work-orders")
    fn resource_name() -> &'static str;

    /// Table, mapping and allow-lists of this resource
    fn schema() -> ResourceSchema;
}

/// Schemas of every built-in resource
pub fn builtin_schemas() -> Vec<ResourceSchema> {
    vec![WorkOrder::schema(), JobRole::schema(), Product::schema()]
}
