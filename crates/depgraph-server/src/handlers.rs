//! REST API handlers for the depgraph server

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Json},
};
use depgraph_cache::CacheStats;
use depgraph_core::{GraphJson, PackageManifest};
use depgraph_discovery::{CancelToken, DiscoveryRequest};
use serde::{Deserialize, Serialize};

use crate::{ApiError, ServerState};

#[derive(Debug, Deserialize)]
pub struct GraphQuery {
    pub name: String,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClearResponse {
    pub removed: usize,
}

/// Traverse a published package
pub async fn get_graph(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<GraphQuery>,
) -> Result<Json<GraphJson>, ApiError> {
    let report = state
        .engine
        .discover_from_registry(&query.name, |_| {})
        .await?;
    Ok(Json(report.graph.export()))
}

/// Traverse the dependencies of an uploaded package.json
pub async fn manifest_graph(
    State(state): State<Arc<ServerState>>,
    body: String,
) -> Result<Json<GraphJson>, ApiError> {
    let manifest = PackageManifest::parse(&body)?;
    let request = DiscoveryRequest::from_manifest(&manifest);
    let report = state
        .engine
        .discover(request, |_| {}, &CancelToken::new())
        .await?;
    Ok(Json(report.graph.export()))
}

pub async fn cache_stats(State(state): State<Arc<ServerState>>) -> Json<CacheStats> {
    Json(state.engine.cache().stats())
}

pub async fn clear_cache(State(state): State<Arc<ServerState>>) -> Json<ClearResponse> {
    let removed = state.engine.cache().clear();
    Json(ClearResponse { removed })
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    let health = HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };
    Json(health)
}
