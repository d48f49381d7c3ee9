//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Mount the RPC dispatcher as the axum fallback service
//! - Wire up middleware (tracing, limits, timeout, request ID)
//! - Serve on a bound listener until shutdown is signalled
//!
//! # Design Decisions
//! - Every path goes to the dispatcher; 404/405 are its decision, not axum's
//! - Request IDs are assigned outermost so trace spans and dispatch logs
//!   both see them

use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::RpcConfig;
use crate::http::request::{UuidRequestId, X_REQUEST_ID};
use crate::rpc::RpcRouter;

/// HTTP front end for a compiled route tree.
pub struct RpcServer {
    router: Router,
    config: RpcConfig,
}

impl RpcServer {
    pub fn new(config: RpcConfig, rpc: RpcRouter) -> Self {
        tracing::info!(routes = ?rpc.table().paths(), "Serving compiled routes");
        let router = Self::build_router(&config, rpc);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &RpcConfig, rpc: RpcRouter) -> Router {
        Router::new()
            .fallback_service(rpc)
            .layer(RequestBodyLimitLayer::new(config.limits.max_body_bytes))
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.timeouts.request_secs,
            )))
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, UuidRequestId))
    }

    /// The fully layered router, for embedding or in-process testing.
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Run the server until a value arrives on `shutdown`.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            request_timeout_secs = self.config.timeouts.request_secs,
            max_body_bytes = self.config.limits.max_body_bytes,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &RpcConfig {
        &self.config
    }
}
