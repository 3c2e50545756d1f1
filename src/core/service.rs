//! Entity query service: one per resource
//!
//! Orchestrates credential check, query building, execution, pagination and
//! row mapping. Everything resource-specific comes from the
//! [`ResourceSchema`]; the service itself holds no per-request state.

use crate::core::credential::CredentialContext;
use crate::core::error::{GatewayError, GatewayResult, UpstreamError};
use crate::core::filter::{FilterSpecification, SortSpecification};
use crate::core::mapper::{RowMapper, UpstreamRow};
use crate::core::pagination::{PageResult, Paginator};
use crate::core::query::PageRequest;
use crate::core::resource::{PaginationStrategy, ResourceSchema};
use crate::query::{QueryBuilder, QueryText};
use crate::upstream::QueryExecutor;
use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;

/// Read operations over one resource, producing records of type `T`.
///
/// `T` is any deserializable record; `serde_json::Value` serves resources
/// declared only in configuration.
pub struct EntityQueryService<T> {
    resource: Arc<ResourceSchema>,
    executor: Arc<dyn QueryExecutor>,
    paginator: Paginator,
    _record: PhantomData<fn() -> T>,
}

impl<T> Clone for EntityQueryService<T> {
    fn clone(&self) -> Self {
        Self {
            resource: self.resource.clone(),
            executor: self.executor.clone(),
            paginator: self.paginator,
            _record: PhantomData,
        }
    }
}

impl<T: DeserializeOwned> EntityQueryService<T> {
    pub fn new(
        resource: Arc<ResourceSchema>,
        executor: Arc<dyn QueryExecutor>,
        max_fetch_rows: usize,
    ) -> Self {
        let paginator = Paginator::new(resource.pagination, max_fetch_rows);
        Self {
            resource,
            executor,
            paginator,
            _record: PhantomData,
        }
    }

    pub fn resource(&self) -> &ResourceSchema {
        &self.resource
    }

    /// One page of records matching `filters`, ordered by `sort` (or the
    /// resource's default sort).
    ///
    /// The credential is checked and every query is compiled before the
    /// first upstream call, so caller mistakes never reach the upstream.
    pub async fn find_all(
        &self,
        credential: &CredentialContext,
        filters: &FilterSpecification,
        sort: Option<&SortSpecification>,
        page: PageRequest,
    ) -> GatewayResult<PageResult<T>> {
        credential.ensure_usable(Utc::now())?;
        let started = Instant::now();

        let page_query =
            QueryBuilder::build(&self.resource, filters, sort, self.fetch_limit(page))?;
        let count_query = match self.resource.pagination {
            PaginationStrategy::CountThenFetch => {
                Some(QueryBuilder::build_count(&self.resource, filters)?)
            }
            PaginationStrategy::FetchAllThenSlice { .. } => None,
        };

        let rows = self
            .paginator
            .paginate(
                &self.resource.name,
                page,
                // The page query already carries the limit the paginator asks for.
                |_top| self.executor.execute(&page_query, credential),
                || async {
                    match &count_query {
                        Some(query) => self.count(query, credential).await,
                        None => Err(GatewayError::Internal(
                            "count requested by a fetch-all resource".to_string(),
                        )),
                    }
                },
            )
            .await?;

        let mapper = RowMapper::new(&self.resource.fields);
        let result = rows.try_map(|row| mapper.map::<T>(&row))?;

        tracing::debug!(
            resource = %self.resource.name,
            page = result.page,
            per_page = result.per_page,
            rows = result.data.len(),
            total = result.total,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "find_all completed"
        );
        Ok(result)
    }

    /// The record whose primary key equals `id`, or `None`.
    ///
    /// Issues exactly one upstream call.
    pub async fn find_by_id(
        &self,
        credential: &CredentialContext,
        id: &str,
    ) -> GatewayResult<Option<T>> {
        credential.ensure_usable(Utc::now())?;

        let query = QueryBuilder::build_by_id(&self.resource, id)?;
        let rows = self.executor.execute(&query, credential).await?;

        let mapper = RowMapper::new(&self.resource.fields);
        let record = rows.first().map(|row| mapper.map::<T>(row)).transpose()?;

        tracing::debug!(
            resource = %self.resource.name,
            found = record.is_some(),
            "find_by_id completed"
        );
        Ok(record)
    }

    /// The "top N" the paginator will request for `page`
    fn fetch_limit(&self, page: PageRequest) -> usize {
        match self.resource.pagination {
            PaginationStrategy::FetchAllThenSlice { .. } => {
                self.paginator.ceiling().saturating_add(1)
            }
            PaginationStrategy::CountThenFetch => page.end(),
        }
    }

    async fn count(&self, query: &QueryText, credential: &CredentialContext) -> GatewayResult<usize> {
        let rows = self.executor.execute(query, credential).await?;
        read_total(rows.first())
    }
}

/// The single cell of a `COUNT(*)` result; an empty result counts zero
fn read_total(row: Option<&UpstreamRow>) -> GatewayResult<usize> {
    let Some(row) = row else {
        return Ok(0);
    };
    let cell = row
        .iter()
        .find(|(column, _)| column.trim().eq_ignore_ascii_case("TOTAL"))
        .or_else(|| row.first())
        .map(|(_, value)| value);

    let total = match cell {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.trim().parse::<u64>().ok(),
        Some(Value::Null) | None => Some(0),
        _ => None,
    };
    total.map(|t| t as usize).ok_or_else(|| {
        UpstreamError::InvalidResponse {
            message: format!("count query returned {:?}", cell),
        }
        .into()
    })
}

/// Type-erased access to a resource, for the HTTP layer
///
/// Records come back as JSON so routes can be registered uniformly for
/// typed and configuration-declared resources.
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    fn schema(&self) -> &ResourceSchema;

    /// A page of records serialized as JSON
    async fn list_as_json(
        &self,
        credential: &CredentialContext,
        filters: &FilterSpecification,
        sort: Option<&SortSpecification>,
        page: PageRequest,
    ) -> GatewayResult<PageResult<Value>>;

    /// One record serialized as JSON, or `None`
    async fn fetch_as_json(
        &self,
        credential: &CredentialContext,
        id: &str,
    ) -> GatewayResult<Option<Value>>;
}

#[async_trait]
impl<T> ResourceFetcher for EntityQueryService<T>
where
    T: DeserializeOwned + Serialize + Send + 'static,
{
    fn schema(&self) -> &ResourceSchema {
        self.resource()
    }

    async fn list_as_json(
        &self,
        credential: &CredentialContext,
        filters: &FilterSpecification,
        sort: Option<&SortSpecification>,
        page: PageRequest,
    ) -> GatewayResult<PageResult<Value>> {
        self.find_all(credential, filters, sort, page)
            .await?
            .try_map(to_json)
    }

    async fn fetch_as_json(
        &self,
        credential: &CredentialContext,
        id: &str,
    ) -> GatewayResult<Option<Value>> {
        self.find_by_id(credential, id).await?.map(to_json).transpose()
    }
}

fn to_json<T: Serialize>(record: T) -> GatewayResult<Value> {
    serde_json::to_value(record)
        .map_err(|e| GatewayError::Internal(format!("Failed to serialize record: {}", e)))
}
