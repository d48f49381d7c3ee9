//! Error taxonomy for route execution and its mapping to HTTP responses.
//!
//! # Design Decisions
//! - Routing failures (404/405) carry no body, everything else answers JSON
//! - Handler errors keep the status they were raised with
//! - Unauthorized is generic; the precise reason is only logged

use axum::{
    body::Body,
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Default error shape a handler may produce: `{ "name", "message" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub name: String,
    pub message: String,
}

impl ApiError {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

/// Errors raised while resolving or running a route.
#[derive(Debug, Error)]
pub enum RpcError {
    /// No route is registered under the request path.
    #[error("no route registered for {0}")]
    NotFound(String),

    /// A route exists but is bound to another verb.
    #[error("{method} is not allowed for {path}")]
    MethodNotAllowed { method: Method, path: String },

    /// The validator rejected the raw input.
    #[error("invalid input: {0}")]
    Validation(String),

    /// Produced by a handler through `Call::error`.
    #[error("handler rejected the call with {status}")]
    Handler { status: StatusCode, body: Value },

    /// Credential missing or rejected.
    #[error("unauthorized")]
    Unauthorized,

    /// The route was never given a handler with `query` or `mutation`.
    #[error("route has no handler")]
    MissingHandler,

    #[error("internal error: {0}")]
    Internal(String),
}

impl RpcError {
    /// Build a handler error from any serializable value.
    ///
    /// Statuses below 400 are answered as `400 Bad Request`; clients tell
    /// data from errors by the status alone.
    pub fn handler(status: StatusCode, body: impl Serialize) -> Self {
        let status = if status.as_u16() < 400 {
            StatusCode::BAD_REQUEST
        } else {
            status
        };
        match serde_json::to_value(body) {
            Ok(body) => RpcError::Handler { status, body },
            Err(e) => RpcError::Internal(format!("failed to serialize handler error: {e}")),
        }
    }

    /// HTTP status this error is answered with.
    pub fn status(&self) -> StatusCode {
        match self {
            RpcError::NotFound(_) => StatusCode::NOT_FOUND,
            RpcError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            RpcError::Validation(_) => StatusCode::BAD_REQUEST,
            RpcError::Handler { status, .. } => *status,
            RpcError::Unauthorized => StatusCode::UNAUTHORIZED,
            RpcError::MissingHandler | RpcError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> Option<Value> {
        let api = match self {
            RpcError::NotFound(_) | RpcError::MethodNotAllowed { .. } => return None,
            RpcError::Handler { body, .. } => return Some(body.clone()),
            RpcError::Validation(message) => ApiError::new("ValidationError", message.clone()),
            RpcError::Unauthorized => ApiError::new("Unauthorized", "Unauthorized"),
            RpcError::MissingHandler | RpcError::Internal(_) => {
                ApiError::new("InternalError", "Internal server error")
            }
        };
        serde_json::to_value(api).ok()
    }
}

impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut response = match self.body() {
            Some(body) => {
                let mut response = Response::new(Body::from(body.to_string()));
                response.headers_mut().insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("application/json"),
                );
                response
            }
            None => Response::new(Body::empty()),
        };
        *response.status_mut() = status;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_of(response: Response) -> Vec<u8> {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    #[tokio::test]
    async fn test_routing_errors_have_empty_body() {
        let response = RpcError::NotFound("/missing".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.headers().get(header::CONTENT_TYPE).is_none());
        assert!(body_of(response).await.is_empty());

        let response = RpcError::MethodNotAllowed {
            method: Method::POST,
            path: "/login".into(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert!(body_of(response).await.is_empty());
    }

    #[tokio::test]
    async fn test_handler_error_keeps_status_and_body() {
        let error = RpcError::handler(StatusCode::FORBIDDEN, ApiError::new("nice", "nia"));
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        let body: ApiError = serde_json::from_slice(&body_of(response).await).unwrap();
        assert_eq!(body, ApiError::new("nice", "nia"));
    }

    #[tokio::test]
    async fn test_internal_error_does_not_leak_details() {
        let response = RpcError::Internal("db password wrong".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = String::from_utf8(body_of(response).await).unwrap();
        assert!(!body.contains("password"));
    }
}
