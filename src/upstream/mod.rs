//! Query executors: the only components that talk to the upstream

pub mod http;
pub mod in_memory;

pub use crate::core::mapper::UpstreamRow;
pub use http::HttpQueryExecutor;
pub use in_memory::{InMemoryExecutor, RecordedCall};

use crate::core::credential::CredentialContext;
use crate::core::error::GatewayResult;
use crate::query::QueryText;
use async_trait::async_trait;

/// Sends compiled query text under one request's credential.
///
/// Implementations are shared across requests and hold no per-request
/// state; the credential arrives with every call.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Run `query` and return the raw rows; an empty result is `Ok(vec![])`
    async fn execute(
        &self,
        query: &QueryText,
        credential: &CredentialContext,
    ) -> GatewayResult<Vec<UpstreamRow>>;
}
