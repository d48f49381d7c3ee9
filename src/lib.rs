//! Typed route-tree RPC over HTTP.
//!
//! A server declares a nested tree of routes built from middleware-chaining
//! procedures; the tree is compiled into a flat path table and dispatched
//! by verb. The client rebuilds the same paths from accessor calls.

pub mod auth;
pub mod client;
pub mod config;
pub mod demo;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod rpc;

pub use client::{CallOptions, CallResult, Client, ClientError};
pub use config::schema::RpcConfig;
pub use http::RpcServer;
pub use lifecycle::Shutdown;
pub use rpc::{Procedure, RouteTree, RpcError, RpcRouter};
