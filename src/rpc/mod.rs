//! Route-tree RPC server core.
//!
//! # Data Flow
//! ```text
//! Setup (once):
//!     Procedure (middleware chain)
//!     → input(validator) → Route
//!     → query/mutation(handler)
//!     → RouteTree (nested keys)
//!     → compile.rs → CompiledTable (immutable)
//!
//! Per request:
//!     dispatch.rs (path + verb lookup, 404/405)
//!     → route.rs (fresh Context → middlewares → validator → handler)
//!     → JSON or plain-text response
//! ```
//!
//! # Design Decisions
//! - Tree nodes and routes are distinct variants, no marker fields
//! - Each request owns its `Context`; nothing is shared between requests
//! - Errors become responses at the dispatch boundary

pub mod compile;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod procedure;
pub mod route;
pub mod tree;
pub mod validate;

pub use compile::{compile, compile_with, CollisionPolicy, CompileError, CompiledTable};
pub use context::{Call, Context, Middleware};
pub use dispatch::RpcRouter;
pub use error::{ApiError, RpcError};
pub use procedure::Procedure;
pub use route::{Endpoint, Route};
pub use tree::{RouteNode, RouteTree};
