//! Client side of the route tree.
//!
//! # Data Flow
//! ```text
//! Client::at("auth")            → CallTarget "/auth"      (no I/O)
//!     .at("login")              → CallTarget "/auth/login" (no I/O)
//!     .query(&input, options)   → GET  base/auth/login?k=v
//!     .mutate(&input, options)  → POST base/auth/login {json}
//!     → status >= 400 ? CallResult::failure(body) : CallResult::success(body)
//! ```
//!
//! # Design Decisions
//! - Targets are immutable: every segment access yields a new value
//! - Default headers are applied first, caller headers merged on top
//! - The 400 threshold is the only success/failure signal
//! - No retries; timeouts come from `CallOptions` or the reqwest client

pub mod query;
pub mod typed;

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;

pub use query::encode_query;
pub use typed::{Mutate, Query};

/// Errors raised before a call reaches the server or while reading its answer.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid base url: {0}")]
    Url(#[from] url::ParseError),

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("query input field '{0}' is not a flat value")]
    UnsupportedQuery(String),

    #[error("failed to encode input: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to decode response with status {status}: {source}")]
    Decode {
        status: u16,
        #[source]
        source: serde_json::Error,
    },

    #[error("call rejected: {0}")]
    Rejected(Value),
}

/// Per-call options merged over the computed request.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    headers: HeaderMap,
    bearer: Option<String>,
    timeout: Option<Duration>,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a header; it overrides any default of the same name.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Send `Authorization: Bearer <token>` unless an explicit
    /// `authorization` header is also given.
    pub fn bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Outcome of a call: exactly one of `data` or `error` is present.
#[derive(Debug, Clone, PartialEq)]
pub struct CallResult<T, E> {
    outcome: Result<T, E>,
}

impl<T, E> CallResult<T, E> {
    pub fn success(data: T) -> Self {
        Self { outcome: Ok(data) }
    }

    pub fn failure(error: E) -> Self {
        Self { outcome: Err(error) }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn data(&self) -> Option<&T> {
        self.outcome.as_ref().ok()
    }

    pub fn error(&self) -> Option<&E> {
        self.outcome.as_ref().err()
    }

    /// Split into the `(data, error)` pair.
    pub fn into_parts(self) -> (Option<T>, Option<E>) {
        match self.outcome {
            Ok(data) => (Some(data), None),
            Err(error) => (None, Some(error)),
        }
    }

    pub fn into_result(self) -> Result<T, E> {
        self.outcome
    }

    /// Take the data, turning a server-side error into `ClientError::Rejected`.
    pub fn unwrap_data(self) -> Result<T, ClientError>
    where
        E: Serialize,
    {
        self.outcome.map_err(|error| {
            ClientError::Rejected(serde_json::to_value(error).unwrap_or(Value::Null))
        })
    }
}

impl<T: Serialize, E: Serialize> Serialize for CallResult<T, E> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("CallResult", 2)?;
        state.serialize_field("data", &self.data())?;
        state.serialize_field("error", &self.error())?;
        state.end()
    }
}

/// Entry point: a base URL plus an HTTP client.
#[derive(Debug, Clone)]
pub struct Client {
    http: reqwest::Client,
    base_url: Arc<str>,
}

impl Client {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        Self::with_http(base_url, reqwest::Client::new())
    }

    pub fn with_http(base_url: &str, http: reqwest::Client) -> Result<Self, ClientError> {
        url::Url::parse(base_url)?;
        Ok(Self {
            http,
            base_url: Arc::from(base_url.trim_end_matches('/')),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Target with an empty path; the parent of every route.
    pub fn root(&self) -> CallTarget {
        CallTarget {
            client: self.clone(),
            path: String::new(),
        }
    }

    pub fn at(&self, segment: &str) -> CallTarget {
        self.root().at(segment)
    }
}

/// Partially built route path.
#[derive(Debug, Clone)]
pub struct CallTarget {
    client: Client,
    path: String,
}

impl CallTarget {
    /// Descend one key of the route tree.
    pub fn at(&self, segment: &str) -> CallTarget {
        CallTarget {
            client: self.client.clone(),
            path: format!("{}/{}", self.path, segment),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Call a `query` route (GET, input in the query string).
    pub async fn query<I, T, E>(
        &self,
        input: &I,
        options: CallOptions,
    ) -> Result<CallResult<T, E>, ClientError>
    where
        I: Serialize + ?Sized,
        T: DeserializeOwned,
        E: DeserializeOwned,
    {
        let url = format!("{}{}{}", self.client.base_url, self.path, encode_query(input)?);
        self.send(Method::GET, url, None, options).await
    }

    /// Call a `mutation` route (POST, JSON body).
    pub async fn mutate<I, T, E>(
        &self,
        input: &I,
        options: CallOptions,
    ) -> Result<CallResult<T, E>, ClientError>
    where
        I: Serialize + ?Sized,
        T: DeserializeOwned,
        E: DeserializeOwned,
    {
        let body = serde_json::to_vec(input).map_err(ClientError::Encode)?;
        let url = format!("{}{}", self.client.base_url, self.path);
        self.send(Method::POST, url, Some(body), options).await
    }

    async fn send<T, E>(
        &self,
        method: Method,
        url: String,
        body: Option<Vec<u8>>,
        options: CallOptions,
    ) -> Result<CallResult<T, E>, ClientError>
    where
        T: DeserializeOwned,
        E: DeserializeOwned,
    {
        let mut headers = HeaderMap::new();
        if body.is_some() {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        merge_headers(&mut headers, options.headers);

        tracing::debug!(method = %method, url = %url, "Calling route");

        let mut request = self.client.http.request(method, url);
        if let Some(token) = &options.bearer {
            request = request.bearer_auth(token);
        }
        request = request.headers(headers);
        if let Some(body) = body {
            request = request.body(body);
        }
        if let Some(timeout) = options.timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let bytes = response.bytes().await?;

        if status >= 400 {
            Ok(CallResult::failure(decode_body(status, &bytes)?))
        } else {
            Ok(CallResult::success(decode_body(status, &bytes)?))
        }
    }
}

/// Caller headers replace defaults of the same name.
fn merge_headers(defaults: &mut HeaderMap, overrides: HeaderMap) {
    defaults.extend(overrides);
}

/// JSON first; a body that is not JSON (a plain-text handler result) is
/// decoded as a JSON string.
fn decode_body<T: DeserializeOwned>(status: u16, bytes: &[u8]) -> Result<T, ClientError> {
    match serde_json::from_slice(bytes) {
        Ok(value) => Ok(value),
        Err(source) => {
            let text = String::from_utf8_lossy(bytes).into_owned();
            serde_json::from_value(Value::String(text))
                .map_err(|_| ClientError::Decode { status, source })
        }
    }
}
