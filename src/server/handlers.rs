//! HTTP handlers for the read API
//!
//! Handlers are generic over resources: the route name selects a
//! [`ResourceFetcher`](crate::core::service::ResourceFetcher) from the
//! registry and the rest is the same for every resource.

use crate::core::credential::CredentialContext;
use crate::core::error::{GatewayResult, ResourceError};
use crate::core::pagination::PageResult;
use crate::core::resource::PaginationStrategy;
use crate::server::extractors::ListParams;
use crate::server::host::ServerHost;
use axum::Json;
use axum::extract::{Path, State};
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;

pub type AppState = Arc<ServerHost>;

/// Declared resource, as listed by `GET /api/resources`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSummary {
    pub name: String,
    pub primary_key: String,
    pub fields: Vec<String>,
    pub filterable_fields: Vec<String>,
    pub sortable_fields: Vec<String>,
    pub search_fields: Vec<String>,
    pub default_sort: String,
    pub pagination: &'static str,
}

/// Liveness; `degraded` when no resource is registered
pub async fn health_check(State(host): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": if host.is_ready() { "ok" } else { "degraded" },
        "service": "erp-gateway",
        "resources": host.resource_names().len()
    }))
}

pub async fn list_resources(State(host): State<AppState>) -> Json<Vec<ResourceSummary>> {
    let summaries = host
        .registry
        .fetchers()
        .map(|fetcher| {
            let schema = fetcher.schema();
            ResourceSummary {
                name: schema.name.clone(),
                primary_key: schema.primary_key.clone(),
                fields: schema.fields.iter().map(|m| m.field.clone()).collect(),
                filterable_fields: schema.filterable_fields.clone(),
                sortable_fields: schema.sortable_fields.clone(),
                search_fields: schema.search_fields.clone(),
                default_sort: format!(
                    "{}:{}",
                    schema.default_sort.field, schema.default_sort.direction
                ),
                pagination: match schema.pagination {
                    PaginationStrategy::FetchAllThenSlice { .. } => "fetch_all_then_slice",
                    PaginationStrategy::CountThenFetch => "count_then_fetch",
                },
            }
        })
        .collect();
    Json(summaries)
}

/// `GET /api/{resource}`
pub async fn list_records(
    State(host): State<AppState>,
    Path(resource): Path<String>,
    credential: CredentialContext,
    ListParams(params): ListParams,
) -> GatewayResult<Json<PageResult<Value>>> {
    let fetcher = host.registry.get(&resource)?;

    let page = params.page_request(&host.limits)?;
    let filters = params.filters()?;
    let sort = params.sort()?;
    let projection = params.projection();

    let result = fetcher
        .list_as_json(&credential, &filters, sort.as_ref(), page)
        .await?;
    Ok(Json(result.map(|record| projection.apply(record))))
}

/// `GET /api/{resource}/{id}`
pub async fn get_record(
    State(host): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
    credential: CredentialContext,
    ListParams(params): ListParams,
) -> GatewayResult<Json<Value>> {
    let fetcher = host.registry.get(&resource)?;

    let record = fetcher
        .fetch_as_json(&credential, &id)
        .await?
        .ok_or(ResourceError::NotFound { resource, id })?;
    Ok(Json(params.projection().apply(record)))
}
