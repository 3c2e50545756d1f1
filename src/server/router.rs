//! Router for the read API

use crate::server::handlers::{AppState, get_record, health_check, list_records, list_resources};
use axum::Router;
use axum::body::Body;
use axum::http::Request;
use axum::routing::get;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

/// Build the REST routes:
/// - GET /health - Liveness
/// - GET /api/resources - Declared resources and their allow-lists
/// - GET /api/{resource} - One page of records
/// - GET /api/{resource}/{id} - One record by primary key
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/resources", get(list_resources))
        .route("/api/{resource}", get(list_records))
        .route("/api/{resource}/{id}", get(get_record))
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                        tracing::info_span!(
                            "request",
                            request_id = %Uuid::new_v4(),
                            method = %request.method(),
                            path = %request.uri().path(),
                        )
                    }),
                )
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
