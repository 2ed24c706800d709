//! HTTP + WebSocket server

pub mod router;
pub mod handlers;
pub mod websocket;
pub mod error;


use std::net::SocketAddr;
use std::sync::Arc;

use depgraph_core::ServerConfig;
use depgraph_discovery::DiscoveryEngine;
use tokio::net::TcpListener;

pub use error::{ApiError, ErrorBody, BAD_REQUEST, FILE_READ_ERROR, NOT_FOUND};
pub use router::create_router;
pub use websocket::WsMessage;

/// State shared by every request handler
pub struct ServerState {
    pub engine: DiscoveryEngine,
}

impl ServerState {
    pub fn new(engine: DiscoveryEngine) -> Self {
        ServerState { engine }
    }
}

pub struct DepgraphServer {
    state: Arc<ServerState>,
    config: ServerConfig,
}

impl DepgraphServer {
    pub fn new(engine: DiscoveryEngine, config: ServerConfig) -> Self {
        DepgraphServer {
            state: Arc::new(ServerState::new(engine)),
            config,
        }
    }

    pub fn state(&self) -> Arc<ServerState> {
        Arc::clone(&self.state)
    }

    /// Bind the configured address. Port 0 picks a free port.
    pub async fn bind(&self) -> std::io::Result<TcpListener> {
        TcpListener::bind((self.config.host.as_str(), self.config.port)).await
    }

    /// Serve on an already bound listener until the process stops.
    pub async fn serve(self, listener: TcpListener) -> anyhow::Result<()> {
        let addr: SocketAddr = listener.local_addr()?;
        tracing::info!("Listening on http://{}", addr);
        axum::serve(listener, create_router(self.state)).await?;
        Ok(())
    }

    pub async fn start(self) -> anyhow::Result<()> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }
}
