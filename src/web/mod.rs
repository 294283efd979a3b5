//! Status HTTP surface
//!
//! Read-only endpoints for probing a running publisher. The server is
//! optional and only started when `web.enabled` is set.

use anyhow::Result;
use axum::{Router, routing::get};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::WebConfig;
use crate::scheduler::Scheduler;

pub mod handlers;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<Scheduler>,
}

pub struct WebServer {
    app: Router,
    addr: SocketAddr,
}

impl WebServer {
    pub fn new(config: &WebConfig, state: AppState) -> Result<Self> {
        let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
        Ok(Self {
            app: Self::create_router(state),
            addr,
        })
    }

    pub fn create_router(state: AppState) -> Router {
        Router::new()
            .route("/health", get(handlers::health_check))
            .route("/status", get(handlers::scheduler_status))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Serve until `shutdown` is cancelled
    pub async fn serve(self, shutdown: CancellationToken) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(&self.addr).await?;
        info!("Status server listening on http://{}", self.addr);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;
        info!("Status server stopped");
        Ok(())
    }

    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }
}
