//! Bearer-token middleware for protected routes.

use std::marker::PhantomData;
use std::sync::Arc;

use axum::http::{header, HeaderMap};
use futures_util::future::{self, BoxFuture, FutureExt};
use serde::de::DeserializeOwned;

use crate::auth::token::{KeyRing, TokenData};
use crate::observability::metrics;
use crate::rpc::{Context, Middleware, RpcError};

type Apply<L, P> = Arc<dyn Fn(&mut L, TokenData<P>) + Send + Sync>;

/// Verifies `Authorization: Bearer <token>` against a [`KeyRing`] and hands
/// the decoded token to `apply`, which stores what the handler needs in the
/// locals.
///
/// Every failure answers `401` with the same body; the reason only reaches
/// logs and metrics.
pub struct BearerAuth<L, P> {
    ring: Arc<KeyRing>,
    apply: Apply<L, P>,
    _payload: PhantomData<fn() -> P>,
}

impl<L, P> BearerAuth<L, P> {
    pub fn new<F>(ring: Arc<KeyRing>, apply: F) -> Self
    where
        F: Fn(&mut L, TokenData<P>) + Send + Sync + 'static,
    {
        Self {
            ring,
            apply: Arc::new(apply),
            _payload: PhantomData,
        }
    }
}

impl<L, P> Clone for BearerAuth<L, P> {
    fn clone(&self) -> Self {
        Self {
            ring: self.ring.clone(),
            apply: self.apply.clone(),
            _payload: PhantomData,
        }
    }
}

impl<L, P> Middleware<L> for BearerAuth<L, P>
where
    L: 'static,
    P: DeserializeOwned + 'static,
{
    fn call<'a>(&'a self, cx: &'a mut Context<L>) -> BoxFuture<'a, Result<(), RpcError>> {
        let outcome = match bearer_token(&cx.request.headers) {
            None => {
                metrics::record_auth_failure("missing");
                Err(RpcError::Unauthorized)
            }
            Some(token) => match self.ring.verify::<P>(token) {
                Ok(data) => {
                    (self.apply)(&mut cx.locals, data);
                    Ok(())
                }
                Err(e) => {
                    tracing::debug!(error = %e, path = %cx.request.uri.path(), "Bearer token rejected");
                    metrics::record_auth_failure(e.reason());
                    Err(RpcError::Unauthorized)
                }
            },
        };
        future::ready(outcome).boxed()
    }
}

/// Token from an `Authorization: Bearer` header; the scheme is matched
/// case-insensitively.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}
