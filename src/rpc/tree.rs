//! Nested route declaration.
//!
//! Internal nodes only segment the path; leaves are routes. The two are
//! told apart by the `RouteNode` variant, never by inspecting the value.

use std::sync::Arc;

use crate::rpc::route::Endpoint;

/// One entry of a [`RouteTree`].
#[derive(Clone)]
pub enum RouteNode {
    /// Nested group of routes contributing one path segment.
    Branch(RouteTree),
    /// Terminal route.
    Route(Arc<dyn Endpoint>),
}

impl std::fmt::Debug for RouteNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RouteNode::Branch(tree) => f.debug_tuple("Branch").field(tree).finish(),
            RouteNode::Route(endpoint) => f.debug_tuple("Route").field(endpoint.method()).finish(),
        }
    }
}

/// Ordered mapping of path segments to routes or nested trees.
#[derive(Clone, Debug, Default)]
pub struct RouteTree {
    entries: Vec<(String, RouteNode)>,
}

impl RouteTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a route under `key`.
    pub fn route(mut self, key: impl Into<String>, endpoint: impl Endpoint) -> Self {
        self.entries
            .push((key.into(), RouteNode::Route(Arc::new(endpoint))));
        self
    }

    /// Add a nested tree under `key`.
    pub fn nest(mut self, key: impl Into<String>, tree: RouteTree) -> Self {
        self.entries.push((key.into(), RouteNode::Branch(tree)));
        self
    }

    /// Add an already-built node.
    pub fn insert(&mut self, key: impl Into<String>, node: RouteNode) {
        self.entries.push((key.into(), node));
    }

    /// Entries in insertion order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &RouteNode)> {
        self.entries.iter().map(|(key, node)| (key.as_str(), node))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
