// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Goal resolution: turn "produce this key" into an ordered node list.
//!
//! The resolver walks backwards from a goal key through producer
//! dependencies, selecting the minimal node subset, then orders it with
//! Kahn's algorithm. Keys already satisfied by the initial context are
//! resolved leaves and contribute no node.
//!
//! # Cycle detection
//!
//! The backward walk is a DFS with a recursion-stack ("gray node") check:
//! revisiting a node that is still being resolved fails fast with the full
//! cycle path rather than looping.
//!
//! # Determinism
//!
//! Ties between independent nodes are broken by descending `priority`, then
//! ascending name, so the same pool and goal always yield the same plan.
//!
//! # `consumes` inclusion
//!
//! A node's `consumes` prefixes pull their producers into the plan only when
//! the prefix is named in `enabled_namespaces` for this run — the one place
//! where inclusion is policy-conditional rather than derived from the graph.

use std::cmp::Ordering;
use std::collections::{BTreeSet, BinaryHeap, HashMap, HashSet};
use std::sync::Arc;

use crate::errors::ResolveError;
use crate::traits::{Node, NodeSet};

/// Resolve a minimal, deterministically ordered node list producing `goal`.
pub fn resolve(
    goal: &str,
    nodes: &NodeSet,
    initial_keys: &BTreeSet<String>,
    enabled_namespaces: &BTreeSet<String>,
) -> Result<Vec<Arc<dyn Node>>, ResolveError> {
    let mut walk = BackwardWalk::new(nodes, initial_keys, enabled_namespaces);
    walk.visit_key(goal)?;
    Ok(order_selection(nodes, &walk.selected, initial_keys, enabled_namespaces))
}

/// DFS state for the backward producer walk.
struct BackwardWalk<'a> {
    nodes: &'a NodeSet,
    initial_keys: &'a BTreeSet<String>,
    enabled_namespaces: &'a BTreeSet<String>,
    /// key -> indices of nodes providing it
    producers: HashMap<String, Vec<usize>>,
    /// every (provides key, producer index) pair, for prefix scans
    provided_keys: Vec<(String, usize)>,
    /// nodes currently being resolved (gray)
    open: HashSet<usize>,
    /// nodes fully resolved (black)
    done: HashSet<usize>,
    /// names along the current recursion path, for cycle reporting
    stack: Vec<String>,
    /// resolved subset
    selected: HashSet<usize>,
}

impl<'a> BackwardWalk<'a> {
    fn new(
        nodes: &'a NodeSet,
        initial_keys: &'a BTreeSet<String>,
        enabled_namespaces: &'a BTreeSet<String>,
    ) -> Self {
        let mut producers: HashMap<String, Vec<usize>> = HashMap::new();
        let mut provided_keys = Vec::new();
        for (idx, node) in nodes.iter().enumerate() {
            for key in node.contract().provides.keys() {
                producers.entry(key.clone()).or_default().push(idx);
                provided_keys.push((key.clone(), idx));
            }
        }
        Self {
            nodes,
            initial_keys,
            enabled_namespaces,
            producers,
            provided_keys,
            open: HashSet::new(),
            done: HashSet::new(),
            stack: Vec::new(),
            selected: HashSet::new(),
        }
    }

    fn visit_key(&mut self, key: &str) -> Result<(), ResolveError> {
        if self.initial_keys.contains(key) {
            // Satisfied by the initial context: a resolved leaf
            return Ok(());
        }
        let candidates = self.producers.get(key).cloned().unwrap_or_default();
        match candidates.len() {
            0 => Err(ResolveError::NoProducer {
                key: key.to_string(),
            }),
            1 => self.visit_node(candidates[0]),
            _ => {
                let mut names: Vec<String> = candidates
                    .iter()
                    .map(|&idx| self.nodes.0[idx].name().to_string())
                    .collect();
                names.sort();
                Err(ResolveError::AmbiguousProducer {
                    key: key.to_string(),
                    producers: names,
                })
            }
        }
    }

    fn visit_node(&mut self, idx: usize) -> Result<(), ResolveError> {
        if self.done.contains(&idx) {
            return Ok(());
        }
        let name = self.nodes.0[idx].name().to_string();
        if self.open.contains(&idx) {
            // Still being resolved: the recursion path from its first
            // occurrence is the cycle
            let start = self
                .stack
                .iter()
                .position(|entry| *entry == name)
                .unwrap_or(0);
            let mut cycle: Vec<String> = self.stack[start..].to_vec();
            cycle.push(name);
            return Err(ResolveError::Cycle { cycle });
        }

        self.open.insert(idx);
        self.stack.push(name);

        let requires: Vec<String> = self.nodes.0[idx]
            .contract()
            .requires
            .keys()
            .cloned()
            .collect();
        for key in &requires {
            self.visit_key(key)?;
        }
        for key in self.enabled_consumed_keys(idx) {
            self.visit_key(&key)?;
        }

        self.stack.pop();
        self.open.remove(&idx);
        self.done.insert(idx);
        self.selected.insert(idx);
        Ok(())
    }

    /// Keys other nodes provide under this node's enabled `consumes`
    /// prefixes, sorted for a deterministic walk.
    fn enabled_consumed_keys(&self, idx: usize) -> Vec<String> {
        let mut keys: Vec<String> = Vec::new();
        for prefix in &self.nodes.0[idx].contract().consumes {
            if !self.enabled_namespaces.contains(prefix) {
                continue;
            }
            for (key, producer) in &self.provided_keys {
                if *producer != idx && key.starts_with(prefix.as_str()) {
                    keys.push(key.clone());
                }
            }
        }
        keys.sort();
        keys.dedup();
        keys
    }
}

/// Entry in the ready set of the topological sort. Max-heap order: highest
/// priority first, then lexicographically smallest name.
struct ReadyNode {
    priority: i32,
    name: String,
    idx: usize,
}

impl PartialEq for ReadyNode {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.name == other.name
    }
}

impl Eq for ReadyNode {}

impl PartialOrd for ReadyNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ReadyNode {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.name.cmp(&self.name))
    }
}

/// Order the selected subset producer-before-consumer with Kahn's algorithm,
/// breaking ties between independent nodes by descending priority then name.
fn order_selection(
    nodes: &NodeSet,
    selected: &HashSet<usize>,
    initial_keys: &BTreeSet<String>,
    enabled_namespaces: &BTreeSet<String>,
) -> Vec<Arc<dyn Node>> {
    // producer index for keys owned by the selected subset
    let mut producer_of: HashMap<&str, usize> = HashMap::new();
    for &idx in selected {
        for key in nodes.0[idx].contract().provides.keys() {
            producer_of.insert(key.as_str(), idx);
        }
    }

    let mut edges: HashSet<(usize, usize)> = HashSet::new();
    for &idx in selected {
        let contract = nodes.0[idx].contract();
        for key in contract.requires.keys() {
            if initial_keys.contains(key) {
                continue;
            }
            if let Some(&producer) = producer_of.get(key.as_str()) {
                if producer != idx {
                    edges.insert((producer, idx));
                }
            }
        }
        for prefix in &contract.consumes {
            if !enabled_namespaces.contains(prefix) {
                continue;
            }
            for (key, &producer) in &producer_of {
                if producer != idx && key.starts_with(prefix.as_str()) {
                    edges.insert((producer, idx));
                }
            }
        }
    }

    let mut in_degree: HashMap<usize, usize> = selected.iter().map(|&idx| (idx, 0)).collect();
    let mut dependents: HashMap<usize, Vec<usize>> = HashMap::new();
    for &(producer, consumer) in &edges {
        if let Some(degree) = in_degree.get_mut(&consumer) {
            *degree += 1;
        }
        dependents.entry(producer).or_default().push(consumer);
    }

    let mut ready = BinaryHeap::new();
    for (&idx, &degree) in &in_degree {
        if degree == 0 {
            ready.push(ReadyNode {
                priority: nodes.0[idx].contract().priority,
                name: nodes.0[idx].name().to_string(),
                idx,
            });
        }
    }

    let mut ordered = Vec::with_capacity(selected.len());
    while let Some(next) = ready.pop() {
        ordered.push(nodes.0[next.idx].clone());
        if let Some(consumers) = dependents.get(&next.idx) {
            for &consumer in consumers {
                let Some(degree) = in_degree.get_mut(&consumer) else {
                    continue;
                };
                *degree -= 1;
                if *degree == 0 {
                    ready.push(ReadyNode {
                        priority: nodes.0[consumer].contract().priority,
                        name: nodes.0[consumer].name().to_string(),
                        idx: consumer,
                    });
                }
            }
        }
    }

    debug_assert_eq!(ordered.len(), selected.len(), "selection contained a cycle");
    ordered
}
