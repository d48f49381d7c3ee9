//! Route compilation: nested tree to flat lookup table.
//!
//! # Responsibilities
//! - Walk the tree depth-first in insertion order
//! - Key every leaf by `/` + its key path joined with `/`
//! - Apply the configured policy when two leaves share a path
//!
//! # Design Decisions
//! - Compiled once at startup, immutable afterwards
//! - Keys are used verbatim: case-sensitive, no slash normalisation
//! - The tree is an owned value and cannot contain cycles; the depth guard
//!   only rejects absurd nesting

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::rpc::route::Endpoint;
use crate::rpc::tree::{RouteNode, RouteTree};

/// Maximum nesting depth accepted by the compiler.
pub const MAX_DEPTH: usize = 64;

/// What to do when two leaves compile to the same path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CollisionPolicy {
    /// The leaf visited last replaces the earlier one (logged).
    #[default]
    LastWins,
    /// Fail compilation.
    Reject,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CompileError {
    #[error("duplicate route path {0}")]
    DuplicatePath(String),

    #[error("route tree nested deeper than {max} levels at {path}")]
    TooDeep { path: String, max: usize },
}

/// Flat path to route lookup.
#[derive(Clone, Default)]
pub struct CompiledTable {
    routes: HashMap<String, Arc<dyn Endpoint>>,
}

impl CompiledTable {
    pub fn get(&self, path: &str) -> Option<&Arc<dyn Endpoint>> {
        self.routes.get(path)
    }

    /// All compiled paths, sorted.
    pub fn paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self.routes.keys().map(String::as_str).collect();
        paths.sort_unstable();
        paths
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl std::fmt::Debug for CompiledTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(
                self.paths()
                    .into_iter()
                    .filter_map(|path| self.routes.get(path).map(|r| (path, r.method()))),
            )
            .finish()
    }
}

/// Compile with the default last-wins collision policy.
pub fn compile(tree: &RouteTree) -> Result<CompiledTable, CompileError> {
    compile_with(tree, CollisionPolicy::default())
}

pub fn compile_with(
    tree: &RouteTree,
    policy: CollisionPolicy,
) -> Result<CompiledTable, CompileError> {
    let mut table = CompiledTable::default();
    walk(tree, "", 0, policy, &mut table)?;

    tracing::debug!(routes = table.len(), "Route tree compiled");
    Ok(table)
}

fn walk(
    tree: &RouteTree,
    prefix: &str,
    depth: usize,
    policy: CollisionPolicy,
    table: &mut CompiledTable,
) -> Result<(), CompileError> {
    if depth >= MAX_DEPTH {
        return Err(CompileError::TooDeep {
            path: prefix.to_string(),
            max: MAX_DEPTH,
        });
    }

    for (key, node) in tree.entries() {
        let path = format!("{prefix}/{key}");
        match node {
            RouteNode::Branch(subtree) => walk(subtree, &path, depth + 1, policy, table)?,
            RouteNode::Route(endpoint) => {
                if !endpoint.has_handler() {
                    tracing::warn!(path = %path, "Route has no handler and will fail when called");
                }
                if table.routes.contains_key(&path) {
                    match policy {
                        CollisionPolicy::Reject => return Err(CompileError::DuplicatePath(path)),
                        CollisionPolicy::LastWins => {
                            tracing::warn!(path = %path, "Duplicate route path, later route wins");
                        }
                    }
                }
                table.routes.insert(path, Arc::clone(endpoint));
            }
        }
    }
    Ok(())
}
