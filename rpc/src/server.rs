//! Axum HTTP server.

use std::net::SocketAddr;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::error::RpcError;
use crate::handlers::{self, RpcState};

/// All routes, bound to `state`.
pub fn router(state: RpcState) -> Router {
    Router::new()
        .route("/vote", post(handlers::vote))
        .route("/parties", get(handlers::parties))
        .route("/balance/:address", get(handlers::balance))
        .route("/metrics", get(handlers::metrics))
        .with_state(state)
}

pub struct RpcServer {
    listener: TcpListener,
    state: RpcState,
}

impl RpcServer {
    pub async fn bind(address: &str, state: RpcState) -> Result<Self, RpcError> {
        let listener = TcpListener::bind(address)
            .await
            .map_err(|e| RpcError::Server(format!("bind {address}: {e}")))?;
        Ok(Self { listener, state })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, RpcError> {
        self.listener
            .local_addr()
            .map_err(|e| RpcError::Server(e.to_string()))
    }

    /// Serve until `shutdown` fires.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) -> Result<(), RpcError> {
        let addr = self.local_addr()?;
        tracing::info!(%addr, "RPC server listening");
        axum::serve(self.listener, router(self.state))
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await
            .map_err(|e| RpcError::Server(e.to_string()))?;
        tracing::info!("RPC server stopped");
        Ok(())
    }
}
