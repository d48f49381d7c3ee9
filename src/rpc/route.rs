//! Terminal route: validator, middleware chain, verb and handler.
//!
//! # Responsibilities
//! - Run the middleware chain sequentially on a fresh `Context`
//! - Extract raw input (query string for GET, JSON body for POST)
//! - Validate, invoke the handler and serialize its output
//!
//! # Design Decisions
//! - `query`/`mutation` are last-write-wins: the verb follows the last call
//! - Running a route that never got a handler fails before any middleware
//! - Structured output (object, array, null) is sent as JSON; scalars are
//!   sent as plain text without a content type

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, request::Parts, HeaderValue, Method, Request},
    response::Response,
};
use futures_util::future::{BoxFuture, FutureExt};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::rpc::context::{Call, Context, FromFn, Middleware, SharedMiddleware};
use crate::rpc::error::{ApiError, RpcError};

type Validator<I> = Arc<dyn Fn(Value) -> Result<I, RpcError> + Send + Sync>;
type Handler<L, I> =
    Arc<dyn Fn(Context<L>, I) -> BoxFuture<'static, Result<Value, RpcError>> + Send + Sync>;

/// Type-erased route as stored in a route tree.
pub trait Endpoint: Send + Sync + 'static {
    /// Verb the route answers to.
    fn method(&self) -> &Method;

    /// Whether `query` or `mutation` was ever called.
    fn has_handler(&self) -> bool;

    fn call(&self, request: Request<Body>) -> BoxFuture<'_, Result<Response, RpcError>>;
}

/// A route bound to locals `L`, validated input `I` and declared errors `E`.
pub struct Route<L, I, E = ApiError> {
    middlewares: Vec<SharedMiddleware<L>>,
    validator: Validator<I>,
    handler: Option<Handler<L, I>>,
    method: Method,
    _error: PhantomData<fn() -> E>,
}

impl<L, I, E> std::fmt::Debug for Route<L, I, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("middlewares", &self.middlewares.len())
            .field("has_handler", &self.handler.is_some())
            .finish()
    }
}

impl<L, I, E> Route<L, I, E>
where
    L: Default + Send + 'static,
    I: Send + 'static,
    E: 'static,
{
    pub(crate) fn new(middlewares: Vec<SharedMiddleware<L>>, validator: Validator<I>) -> Self {
        Self {
            middlewares,
            validator,
            handler: None,
            method: Method::GET,
            _error: PhantomData,
        }
    }

    /// Bind a read handler, answered on GET.
    pub fn query<F, Fut, O>(self, handler: F) -> Self
    where
        F: Fn(Call<L, I, E>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, RpcError>> + Send + 'static,
        O: Serialize,
    {
        self.bind(Method::GET, handler)
    }

    /// Bind a write handler, answered on POST.
    pub fn mutation<F, Fut, O>(self, handler: F) -> Self
    where
        F: Fn(Call<L, I, E>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, RpcError>> + Send + 'static,
        O: Serialize,
    {
        self.bind(Method::POST, handler)
    }

    fn bind<F, Fut, O>(mut self, method: Method, handler: F) -> Self
    where
        F: Fn(Call<L, I, E>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, RpcError>> + Send + 'static,
        O: Serialize,
    {
        let erased: Handler<L, I> = Arc::new(move |cx: Context<L>, data: I| {
            let output = handler(Call::new(cx, data));
            async move {
                let output = output.await?;
                serde_json::to_value(output)
                    .map_err(|e| RpcError::Internal(format!("failed to serialize output: {e}")))
            }
            .boxed()
        });
        self.handler = Some(erased);
        self.method = method;
        self
    }

    /// Append an async closure after input binding.
    pub fn middleware<F>(self, f: F) -> Self
    where
        F: for<'a> Fn(&'a mut Context<L>) -> BoxFuture<'a, Result<(), RpcError>>
            + Send
            + Sync
            + 'static,
    {
        self.with(FromFn(f))
    }

    /// Append a middleware value after input binding.
    pub fn with<M: Middleware<L>>(mut self, middleware: M) -> Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    /// Declare the error type the handler's `Call::error` accepts.
    pub fn error<E2: 'static>(self) -> Route<L, I, E2> {
        Route {
            middlewares: self.middlewares,
            validator: self.validator,
            handler: self.handler,
            method: self.method,
            _error: PhantomData,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Execute the route for one request.
    pub async fn run(&self, request: Request<Body>) -> Result<Response, RpcError> {
        let handler = self.handler.as_ref().ok_or(RpcError::MissingHandler)?;

        let (parts, body) = request.into_parts();
        let mut cx = Context::<L>::new(parts);
        for middleware in &self.middlewares {
            middleware.call(&mut cx).await?;
        }

        let raw = raw_input(&cx.request, body).await?;
        let data = (self.validator)(raw)?;
        let output = handler(cx, data).await?;

        Ok(serialize_output(output))
    }
}

impl<L, I, E> Endpoint for Route<L, I, E>
where
    L: Default + Send + 'static,
    I: Send + 'static,
    E: 'static,
{
    fn method(&self) -> &Method {
        &self.method
    }

    fn has_handler(&self) -> bool {
        self.handler.is_some()
    }

    fn call(&self, request: Request<Body>) -> BoxFuture<'_, Result<Response, RpcError>> {
        self.run(request).boxed()
    }
}

/// Query pairs for GET, parsed JSON body for POST, `null` otherwise.
async fn raw_input(request: &Parts, body: Body) -> Result<Value, RpcError> {
    match request.method {
        Method::GET => {
            let mut pairs = Map::new();
            if let Some(query) = request.uri.query() {
                for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
                    pairs.insert(key.into_owned(), Value::String(value.into_owned()));
                }
            }
            Ok(Value::Object(pairs))
        }
        Method::POST => {
            let bytes = axum::body::to_bytes(body, usize::MAX)
                .await
                .map_err(|e| RpcError::Validation(format!("failed to read request body: {e}")))?;
            if bytes.is_empty() {
                return Ok(Value::Null);
            }
            serde_json::from_slice(&bytes)
                .map_err(|e| RpcError::Validation(format!("malformed JSON body: {e}")))
        }
        _ => Ok(Value::Null),
    }
}

fn serialize_output(output: Value) -> Response {
    match output {
        Value::String(text) => Response::new(Body::from(text)),
        Value::Number(number) => Response::new(Body::from(number.to_string())),
        Value::Bool(flag) => Response::new(Body::from(flag.to_string())),
        structured => {
            let mut response = Response::new(Body::from(structured.to_string()));
            response.headers_mut().insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::procedure::Procedure;
    use axum::http::StatusCode;
    use serde::Deserialize;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct Locals {
        app: bool,
    }

    #[derive(Deserialize)]
    struct Login {
        username: String,
    }

    async fn read_body(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_get_reads_query_string() {
        let route = Procedure::<Locals>::new()
            .input_json::<Login>()
            .query(|cx| async move { Ok(serde_json::json!({ "mong": cx.data.username })) });

        let request = Request::get("/login?username=x%20y&username=u")
            .body(Body::empty())
            .unwrap();
        let response = route.run(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        // later duplicates win
        assert_eq!(read_body(response).await, r#"{"mong":"u"}"#);
    }

    #[tokio::test]
    async fn test_post_reads_json_body() {
        let route = Procedure::<Locals>::new()
            .input_json::<Login>()
            .mutation(|cx| async move { Ok(vec![cx.data.username]) });
        assert_eq!(route.method(), Method::POST);

        let request = Request::post("/login")
            .body(Body::from(r#"{"username":"u"}"#))
            .unwrap();
        let response = route.run(request).await.unwrap();
        assert_eq!(read_body(response).await, r#"["u"]"#);
    }

    #[tokio::test]
    async fn test_scalar_output_is_plain_text() {
        let route = Procedure::<Locals>::new()
            .input(|_| Ok(()))
            .query(|_cx| async move { Ok(42) });

        let response = route
            .run(Request::get("/n").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(response.headers().get(header::CONTENT_TYPE).is_none());
        assert_eq!(read_body(response).await, "42");
    }

    #[tokio::test]
    async fn test_last_verb_wins() {
        let route = Procedure::<Locals>::new()
            .input(|_| Ok(()))
            .mutation(|_cx| async move { Ok("posted") })
            .query(|_cx| async move { Ok("read") });
        assert_eq!(route.method(), Method::GET);
        assert!(Endpoint::has_handler(&route));
    }

    #[tokio::test]
    async fn test_missing_handler_fails_before_middlewares() {
        static TOUCHED: AtomicBool = AtomicBool::new(false);
        let route = Procedure::<Locals>::new()
            .middleware(|_cx| {
                Box::pin(async move {
                    TOUCHED.store(true, Ordering::SeqCst);
                    Ok(())
                })
            })
            .input(|_| Ok(()));

        assert_eq!(route.method(), Method::GET);
        let result = route
            .run(Request::get("/x").body(Body::empty()).unwrap())
            .await;
        assert!(matches!(result, Err(RpcError::MissingHandler)));
        assert!(!TOUCHED.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_middleware_error_aborts_chain() {
        let route = Procedure::<Locals>::new()
            .middleware(|_cx| Box::pin(async move { Err(RpcError::Unauthorized) }))
            .middleware(|cx| {
                Box::pin(async move {
                    cx.locals.app = true;
                    Ok(())
                })
            })
            .input(|_| Ok(()))
            .query(|cx| async move { Ok(cx.locals.app) });

        let result = route
            .run(Request::get("/x").body(Body::empty()).unwrap())
            .await;
        assert!(matches!(result, Err(RpcError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_validation_failure_propagates() {
        let route = Procedure::<Locals>::new()
            .input_json::<Login>()
            .query(|cx| async move { Ok(cx.data.username) });

        let result = route
            .run(Request::get("/login").body(Body::empty()).unwrap())
            .await;
        assert!(matches!(result, Err(RpcError::Validation(_))));
    }

    #[tokio::test]
    async fn test_malformed_post_body_is_a_validation_error() {
        let route = Procedure::<Locals>::new()
            .input_json::<Login>()
            .mutation(|cx| async move { Ok(cx.data.username) });

        let result = route
            .run(Request::post("/login").body(Body::from("{not json")).unwrap())
            .await;
        assert!(matches!(result, Err(RpcError::Validation(_))));
    }

    #[tokio::test]
    async fn test_error_helper_honours_status() {
        #[derive(Serialize)]
        struct Nice {
            name: &'static str,
            message: &'static str,
        }

        let route = Procedure::<Locals>::new()
            .input(|_| Ok(()))
            .error::<Nice>()
            .query(|cx| async move {
                Err::<(), _>(cx.error(
                    Nice {
                        name: "nice",
                        message: "nia",
                    },
                    Some(StatusCode::CONFLICT),
                ))
            });

        let error = route
            .run(Request::get("/x").body(Body::empty()).unwrap())
            .await
            .unwrap_err();
        assert_eq!(error.status(), StatusCode::CONFLICT);
        match error {
            RpcError::Handler { body, .. } => {
                assert_eq!(body, serde_json::json!({ "name": "nice", "message": "nia" }))
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_error_helper_clamps_success_status() {
        let route = Procedure::<Locals>::new()
            .input(|_| Ok(()))
            .query(|cx| async move {
                let error = ApiError::new("Odd", "not a success");
                Err::<(), _>(cx.error(error, Some(StatusCode::OK)))
            });

        let error = route
            .run(Request::get("/x").body(Body::empty()).unwrap())
            .await
            .unwrap_err();
        assert_eq!(error.status(), StatusCode::BAD_REQUEST);
    }
}
