//! Axum router setup for the depgraph server

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use crate::{
    handlers::{cache_stats, clear_cache, get_graph, health_check, manifest_graph},
    websocket::ws_handler,
    ServerState,
};

/// Create the axum router with all routes
pub fn create_router(state: Arc<ServerState>) -> Router {
    Router::new()
        // Streaming search with progress
        .route("/ws", get(ws_handler))
        .route("/api/graph", get(get_graph))
        .route("/api/graph/manifest", post(manifest_graph))
        .route("/api/cache", get(cache_stats).delete(clear_cache))
        .route("/api/health", get(health_check))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
