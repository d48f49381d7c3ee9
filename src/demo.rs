//! Demo route tree served by the `rpc-tree` binary.
//!
//! ```text
//! /auth/login  GET   echo the username back
//! /auth/token  POST  issue a signed session token
//! /auth/me     GET   bearer-protected, returns the session in the token
//! ```
//!
//! [`DemoApi`] is the matching typed client.

use std::sync::Arc;

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::auth::{BearerAuth, KeyRing, TokenData};
use crate::rpc::{ApiError, Procedure, RouteTree, RpcError};

/// Per-request locals shared by every demo route.
#[derive(Debug, Default)]
pub struct AppLocals {
    /// Set by the first middleware of the base procedure.
    pub app: bool,
    /// Filled in by bearer authentication on protected routes.
    pub session: Option<Session>,
}

/// Token payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginInput {
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl LoginInput {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginOutput {
    pub mong: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenOutput {
    pub token: String,
}

fn base() -> Procedure<AppLocals> {
    Procedure::<AppLocals>::new().middleware(|cx| {
        Box::pin(async move {
            cx.locals.app = true;
            Ok(())
        })
    })
}

fn empty_username() -> ApiError {
    ApiError::new("EmptyUsername", "username must not be empty")
}

/// Build the demo tree around `ring`.
pub fn routes(ring: Arc<KeyRing>) -> RouteTree {
    let proc = base();
    let authed = proc.clone().with(BearerAuth::new(
        ring.clone(),
        |locals: &mut AppLocals, data: TokenData<Session>| {
            locals.session = Some(data.claims.payload);
        },
    ));

    let login = proc.input_json::<LoginInput>().query(|cx| async move {
        if cx.data.username.is_empty() {
            return Err(cx.error(empty_username(), Some(StatusCode::UNPROCESSABLE_ENTITY)));
        }
        if !cx.locals.app {
            return Err(RpcError::Internal("base middleware did not run".into()));
        }
        Ok(LoginOutput {
            mong: cx.data.username,
        })
    });

    let token = proc.input_json::<LoginInput>().mutation(move |cx| {
        let ring = ring.clone();
        async move {
            if cx.data.username.is_empty() {
                return Err(cx.error(empty_username(), Some(StatusCode::UNPROCESSABLE_ENTITY)));
            }
            let token = ring
                .sign(&Session {
                    username: cx.data.username,
                })
                .map_err(|e| RpcError::Internal(e.to_string()))?;
            Ok(TokenOutput { token })
        }
    });

    let me = authed
        .input(|_| Ok(()))
        .query(|cx| async move { cx.locals.session.ok_or(RpcError::Unauthorized) });

    RouteTree::new().nest(
        "auth",
        RouteTree::new()
            .route("login", login)
            .route("token", token)
            .route("me", me),
    )
}

crate::client_tree! {
    /// Typed client for [`routes`].
    pub struct DemoApi {
        auth {
            login: query(LoginInput) -> LoginOutput,
            token: mutate(LoginInput) -> TokenOutput,
            me: query(()) -> Session,
        },
    }
}
