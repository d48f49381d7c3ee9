//! Request dispatch against a compiled table.
//!
//! # Responsibilities
//! - Resolve the request path to a compiled route
//! - Reject unknown paths (404) and wrong verbs (405) with an empty body
//! - Delegate to the route and turn its errors into responses
//!
//! # Design Decisions
//! - Pure lookup and delegation: no retries, caching or rate limiting
//! - The table is shared behind `Arc` and never written after startup
//! - Usable directly or as a `tower::Service` mounted under axum

use std::convert::Infallible;
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};
use std::time::Instant;

use axum::{
    body::Body,
    http::{Method, Request},
    response::{IntoResponse, Response},
};
use futures_util::future::BoxFuture;
use tower::Service;

use crate::observability::metrics;
use crate::rpc::compile::{compile_with, CollisionPolicy, CompileError, CompiledTable};
use crate::rpc::error::RpcError;
use crate::rpc::route::Endpoint;
use crate::rpc::tree::RouteTree;

/// Dispatcher over an immutable compiled table.
#[derive(Clone, Debug)]
pub struct RpcRouter {
    table: Arc<CompiledTable>,
}

impl RpcRouter {
    pub fn new(table: CompiledTable) -> Self {
        Self {
            table: Arc::new(table),
        }
    }

    /// Compile `tree` with the given collision policy and wrap the result.
    pub fn from_tree(tree: &RouteTree, policy: CollisionPolicy) -> Result<Self, CompileError> {
        Ok(Self::new(compile_with(tree, policy)?))
    }

    pub fn table(&self) -> &CompiledTable {
        &self.table
    }

    /// Find the route for `path`, checking that it answers to `method`.
    pub fn resolve(&self, path: &str, method: &Method) -> Result<&Arc<dyn Endpoint>, RpcError> {
        let endpoint = self
            .table
            .get(path)
            .ok_or_else(|| RpcError::NotFound(path.to_string()))?;

        if endpoint.method() != method {
            return Err(RpcError::MethodNotAllowed {
                method: method.clone(),
                path: path.to_string(),
            });
        }
        Ok(endpoint)
    }

    /// Answer one request.
    pub async fn dispatch(&self, request: Request<Body>) -> Response {
        let start_time = Instant::now();
        let path = request.uri().path().to_string();
        let method = request.method().clone();
        let request_id = request
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string();

        tracing::debug!(
            request_id = %request_id,
            method = %method,
            path = %path,
            "Dispatching call"
        );

        let (response, matched) = match self.resolve(&path, &method) {
            Ok(endpoint) => match endpoint.call(request).await {
                Ok(response) => (response, true),
                Err(error) => {
                    let status = error.status();
                    if status.is_server_error() {
                        tracing::error!(request_id = %request_id, path = %path, error = %error, "Call failed");
                    } else {
                        tracing::info!(request_id = %request_id, path = %path, status = %status, error = %error, "Call rejected");
                    }
                    (error.into_response(), true)
                }
            },
            Err(error) => {
                tracing::warn!(request_id = %request_id, method = %method, path = %path, error = %error, "No route matched");
                let matched = matches!(error, RpcError::MethodNotAllowed { .. });
                (error.into_response(), matched)
            }
        };

        // unknown paths share one label to keep metric cardinality bounded
        let path_label = if matched { path.as_str() } else { "unmatched" };
        metrics::record_request(
            path_label,
            method.as_str(),
            response.status().as_u16(),
            start_time,
        );
        response
    }
}

impl Service<Request<Body>> for RpcRouter {
    type Response = Response;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Response, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut TaskContext<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let router = self.clone();
        Box::pin(async move { Ok(router.dispatch(request).await) })
    }
}
