//! Per-request state handed to middlewares and handlers.

use std::marker::PhantomData;
use std::sync::Arc;

use axum::http::{request::Parts, StatusCode};
use futures_util::future::BoxFuture;
use serde::Serialize;

use crate::rpc::error::{ApiError, RpcError};

/// State of one call while its middleware chain runs.
///
/// Built fresh for every request with `L::default()` locals and dropped once
/// the response is produced.
#[derive(Debug)]
pub struct Context<L> {
    /// Head of the incoming request (method, uri, headers, extensions).
    pub request: Parts,
    /// Scratch value shared by every middleware and finally the handler.
    pub locals: L,
}

impl<L: Default> Context<L> {
    pub fn new(request: Parts) -> Self {
        Self {
            request,
            locals: L::default(),
        }
    }
}

/// What a handler receives: the request head, the locals accumulated by the
/// middleware chain and the validated input.
#[derive(Debug)]
pub struct Call<L, I, E = ApiError> {
    pub request: Parts,
    pub locals: L,
    pub data: I,
    _error: PhantomData<fn() -> E>,
}

impl<L, I, E> Call<L, I, E> {
    pub(crate) fn new(context: Context<L>, data: I) -> Self {
        Self {
            request: context.request,
            locals: context.locals,
            data,
            _error: PhantomData,
        }
    }
}

impl<L, I, E: Serialize> Call<L, I, E> {
    /// Turn a declared error value into an error response.
    ///
    /// The status defaults to `400 Bad Request`; anything below 400 is
    /// answered as 400.
    pub fn error(&self, error: E, status: Option<StatusCode>) -> RpcError {
        RpcError::handler(status.unwrap_or(StatusCode::BAD_REQUEST), error)
    }
}

/// A step of the chain that runs before input validation.
///
/// Returning `Err` aborts the request; later middlewares and the handler
/// never run.
pub trait Middleware<L>: Send + Sync + 'static {
    fn call<'a>(&'a self, cx: &'a mut Context<L>) -> BoxFuture<'a, Result<(), RpcError>>;
}

pub(crate) type SharedMiddleware<L> = Arc<dyn Middleware<L>>;

/// Adapts an async closure into a [`Middleware`].
pub(crate) struct FromFn<F>(pub(crate) F);

impl<L, F> Middleware<L> for FromFn<F>
where
    F: for<'a> Fn(&'a mut Context<L>) -> BoxFuture<'a, Result<(), RpcError>>
        + Send
        + Sync
        + 'static,
{
    fn call<'a>(&'a self, cx: &'a mut Context<L>) -> BoxFuture<'a, Result<(), RpcError>> {
        (self.0)(cx)
    }
}
