// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The node capability contract and the static node registry.
//!
//! A node is a unit of work with a declared contract: the exact keys it
//! requires, the exact keys it provides, the key-prefixes it consumes when
//! present, and a tie-breaking priority. The contract is exposed independent
//! of execution so the validator and resolver can reason about the graph
//! without running anything.
//!
//! Nodes are concrete implementations registered in a [`NodeSet`] — there is
//! no reflection-driven discovery.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::context::{Context, Value, ValueType};

/// Immutable capability contract declared by every node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeContract {
    /// Exact keys that must exist before execution, with their expected types
    pub requires: BTreeMap<String, ValueType>,
    /// Exact keys that must exist after successful execution, with their types
    pub provides: BTreeMap<String, ValueType>,
    /// Ordered key-prefixes read when present but never required
    pub consumes: Vec<String>,
    /// Tie-breaker among nodes with no ordering dependency; higher runs earlier
    pub priority: i32,
}

impl NodeContract {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a required input key.
    pub fn require(mut self, key: impl Into<String>, ty: ValueType) -> Self {
        self.requires.insert(key.into(), ty);
        self
    }

    /// Declare a produced output key.
    pub fn provide(mut self, key: impl Into<String>, ty: ValueType) -> Self {
        self.provides.insert(key.into(), ty);
        self
    }

    /// Declare an optional namespace prefix, e.g. `"metrics."`.
    pub fn consume(mut self, prefix: impl Into<String>) -> Self {
        self.consumes.push(prefix.into());
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

/// A unit of work in the pipeline.
///
/// The action reads its inputs from the [`Context`] and returns its outputs;
/// the executor writes them back (enforcing the write-once rule and the
/// declared `provides` set) and feeds the cache. An action must only read
/// keys listed in `requires`/`consumes`, and must return a typed error
/// rather than silently no-op on failure.
#[async_trait]
pub trait Node: Send + Sync + std::fmt::Debug {
    /// Unique name of this node within a node set.
    fn name(&self) -> &str;

    /// The static capability contract; must not change between calls.
    fn contract(&self) -> &NodeContract;

    /// Execute the node's action. Required inputs are pre-checked by the
    /// executor before invocation.
    async fn run(&self, context: &Context) -> anyhow::Result<HashMap<String, Value>>;
}

/// Action signature for [`FnNode`].
pub type NodeAction =
    Box<dyn Fn(&Context) -> anyhow::Result<HashMap<String, Value>> + Send + Sync>;

/// A node built from a contract and a closure.
///
/// This is the registration vehicle for simple synchronous actions; anything
/// needing real async work implements [`Node`] directly.
pub struct FnNode {
    name: String,
    contract: NodeContract,
    action: NodeAction,
}

impl FnNode {
    pub fn new(
        name: impl Into<String>,
        contract: NodeContract,
        action: impl Fn(&Context) -> anyhow::Result<HashMap<String, Value>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            contract,
            action: Box::new(action),
        }
    }
}

#[async_trait]
impl Node for FnNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn contract(&self) -> &NodeContract {
        &self.contract
    }

    async fn run(&self, context: &Context) -> anyhow::Result<HashMap<String, Value>> {
        (self.action)(context)
    }
}

impl std::fmt::Debug for FnNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnNode")
            .field("name", &self.name)
            .field("contract", &self.contract)
            .finish()
    }
}

/// Newtype wrapper for the pool of registered nodes providing type safety.
///
/// Duplicate names are representable here on purpose; the validator reports
/// them instead of silently keeping one.
#[derive(Clone, Default)]
pub struct NodeSet(pub Vec<Arc<dyn Node>>);

impl NodeSet {
    /// Create a new empty node set
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Register a node
    pub fn insert(&mut self, node: impl Node + 'static) {
        self.0.push(Arc::new(node));
    }

    /// Register an already-shared node
    pub fn push(&mut self, node: Arc<dyn Node>) {
        self.0.push(node);
    }

    /// Look up a node by name
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Node>> {
        self.0.iter().find(|node| node.name() == name)
    }

    /// Whether a node with this name is registered
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Iterate over all registered nodes
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Node>> {
        self.0.iter()
    }

    /// All registered node names, in registration order
    pub fn names(&self) -> Vec<&str> {
        self.0.iter().map(|node| node.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for NodeSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeSet")
            .field("node_count", &self.0.len())
            .field("node_names", &self.names())
            .finish()
    }
}

impl From<Vec<Arc<dyn Node>>> for NodeSet {
    fn from(nodes: Vec<Arc<dyn Node>>) -> Self {
        Self(nodes)
    }
}
