//! Request extractors

use crate::core::credential::CredentialContext;
use crate::core::error::{GatewayError, QueryError};
use crate::core::query::QueryParams;
use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;

/// The caller's credential, from `Authorization: Bearer <token>`.
///
/// Built fresh for every request; a missing or malformed header rejects the
/// request with 401 before the handler runs.
impl<S> FromRequestParts<S> for CredentialContext
where
    S: Send + Sync,
{
    type Rejection = GatewayError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(CredentialContext::from_headers(&parts.headers)?)
    }
}

/// Listing parameters with rejections in the gateway's error format
pub struct ListParams(pub QueryParams);

impl<S> FromRequestParts<S> for ListParams
where
    S: Send + Sync,
{
    type Rejection = GatewayError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(params) = Query::<QueryParams>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| QueryError::InvalidFilterValue {
                field: "query".to_string(),
                message: rejection.body_text(),
            })?;
        Ok(ListParams(params))
    }
}
