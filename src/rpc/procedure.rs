//! Middleware-chaining builder that routes are cut from.
//!
//! # Design Decisions
//! - Middlewares are stored behind `Arc`, so cloning a procedure copies the
//!   sequence while every entry keeps its identity
//! - `input` copies the current chain; later additions to the procedure do
//!   not reach routes already built from it

use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::rpc::context::{Context, FromFn, Middleware, SharedMiddleware};
use crate::rpc::error::RpcError;
use crate::rpc::route::Route;
use crate::rpc::validate;

/// Ordered middleware chain shared by a family of routes.
pub struct Procedure<L> {
    middlewares: Vec<SharedMiddleware<L>>,
}

impl<L> Clone for Procedure<L> {
    fn clone(&self) -> Self {
        Self {
            middlewares: self.middlewares.clone(),
        }
    }
}

impl<L> Default for Procedure<L> {
    fn default() -> Self {
        Self {
            middlewares: Vec::new(),
        }
    }
}

impl<L> std::fmt::Debug for Procedure<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Procedure")
            .field("middlewares", &self.middlewares.len())
            .finish()
    }
}

impl<L: Default + Send + 'static> Procedure<L> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an async closure to the chain.
    ///
    /// ```ignore
    /// let proc = Procedure::<Locals>::new()
    ///     .middleware(|cx| Box::pin(async move {
    ///         cx.locals.app = true;
    ///         Ok(())
    ///     }));
    /// ```
    pub fn middleware<F>(self, f: F) -> Self
    where
        F: for<'a> Fn(&'a mut Context<L>) -> BoxFuture<'a, Result<(), RpcError>>
            + Send
            + Sync
            + 'static,
    {
        self.with(FromFn(f))
    }

    /// Append a middleware value (e.g. `BearerAuth`).
    pub fn with<M: Middleware<L>>(mut self, middleware: M) -> Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    /// Freeze the current chain onto a new route validated by `validator`.
    pub fn input<I, V>(&self, validator: V) -> Route<L, I>
    where
        I: Send + 'static,
        V: Fn(Value) -> Result<I, RpcError> + Send + Sync + 'static,
    {
        Route::new(self.middlewares.clone(), Arc::new(validator))
    }

    /// Same as `input`, deserializing the raw input with serde.
    pub fn input_json<I: DeserializeOwned + Send + 'static>(&self) -> Route<L, I> {
        self.input(validate::json::<I>)
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;

    #[derive(Default)]
    struct Trail {
        steps: Vec<&'static str>,
    }

    struct Step(&'static str);

    impl Middleware<Trail> for Step {
        fn call<'a>(&'a self, cx: &'a mut Context<Trail>) -> BoxFuture<'a, Result<(), RpcError>> {
            Box::pin(async move {
                cx.locals.steps.push(self.0);
                Ok(())
            })
        }
    }

    #[test]
    fn test_clone_is_independent() {
        let base = Procedure::<Trail>::new().with(Step("a"));
        let extended = base.clone().with(Step("b"));

        assert_eq!(base.len(), 1);
        assert_eq!(extended.len(), 2);
    }

    #[test]
    fn test_clone_keeps_middleware_identity() {
        let base = Procedure::<Trail>::new().with(Step("a"));
        let copy = base.clone();
        assert!(Arc::ptr_eq(&base.middlewares[0], &copy.middlewares[0]));
    }

    #[tokio::test]
    async fn test_route_snapshot_ignores_later_procedure_additions() {
        let proc = Procedure::<Trail>::new().with(Step("a"));
        let route = proc
            .input(|_| Ok(()))
            .query(|cx| async move { Ok(cx.locals.steps.join(",")) });
        let _proc = proc.with(Step("late"));

        let request = Request::get("/x").body(Body::empty()).unwrap();
        let response = route.run(request).await.unwrap();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"a");
    }

    #[tokio::test]
    async fn test_middlewares_run_in_registration_order() {
        let route = Procedure::<Trail>::new()
            .with(Step("first"))
            .middleware(|cx| {
                Box::pin(async move {
                    // observes the mutation made by the previous step
                    assert_eq!(cx.locals.steps, vec!["first"]);
                    cx.locals.steps.push("second");
                    Ok(())
                })
            })
            .input(|_| Ok(()))
            .with(Step("route-level"))
            .query(|cx| async move { Ok(cx.locals.steps.join(">")) });

        let request = Request::get("/x").body(Body::empty()).unwrap();
        let response = route.run(request).await.unwrap();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"first>second>route-level");
    }

    #[tokio::test]
    async fn test_input_json_decodes_owned_input() {
        #[derive(serde::Deserialize)]
        struct Greeting {
            name: String,
        }

        let route = Procedure::<Trail>::new()
            .input_json::<Greeting>()
            .query(|cx| async move { Ok(format!("hi {}", cx.data.name)) });

        let request = Request::get("/x?name=ann").body(Body::empty()).unwrap();
        let response = route.run(request).await.unwrap();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"hi ann");
    }
}
