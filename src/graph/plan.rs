// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The immutable staged execution plan.
//!
//! A plan partitions an ordered node list into sequential stages: a node's
//! stage is one past the latest stage of any producer it depends on, so
//! nodes within a stage have no provides/requires relationship to each other
//! and can execute concurrently (independent keys imply disjoint context
//! writes). Stages are computed with the same level-assignment rule as a
//! Kahn topological sort.
//!
//! A node consuming an enabled namespace is placed after EVERY in-plan
//! producer of that namespace, so by the time it runs the namespace is
//! complete. An order that places such a producer after the consumer is
//! rejected at build time, the same way a late `requires` producer is.
//!
//! Plans are built once before a run, never mutated during it, and discarded
//! after.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use crate::errors::ValidationError;
use crate::graph::validation::INITIAL_PRODUCER;
use crate::traits::Node;

/// A validated, staged node sequence for one run.
#[derive(Clone)]
pub struct ExecutionPlan {
    stages: Vec<Vec<Arc<dyn Node>>>,
    /// producer name -> names of nodes that directly depend on its outputs
    dependents: HashMap<String, Vec<String>>,
    /// namespaces whose `consumes` edges were honored when building this plan
    enabled_namespaces: BTreeSet<String>,
}

impl ExecutionPlan {
    /// Build a plan from an ordered node list.
    ///
    /// The order must already be producer-before-consumer (the resolver
    /// guarantees this; an explicit caller-supplied order is checked here).
    /// Provides collisions and requirements not satisfied by the initial
    /// context or an earlier node are build-time errors.
    pub fn build(
        ordered: &[Arc<dyn Node>],
        initial_keys: &BTreeSet<String>,
        enabled_namespaces: BTreeSet<String>,
    ) -> Result<Self, ValidationError> {
        // key -> (producer index, producer stage), filled as nodes are placed
        let mut placed_producer: HashMap<String, (usize, usize)> = HashMap::new();
        let mut produced_by: HashMap<&str, &str> = initial_keys
            .iter()
            .map(|key| (key.as_str(), INITIAL_PRODUCER))
            .collect();

        let mut stage_of: Vec<usize> = Vec::with_capacity(ordered.len());
        let mut dependents: HashMap<String, Vec<String>> = HashMap::new();

        for (idx, node) in ordered.iter().enumerate() {
            let contract = node.contract();

            // Collision check is repeated at build time so a hand-assembled
            // order cannot smuggle in a runtime write race
            for key in contract.provides.keys() {
                if let Some(first) = produced_by.get(key.as_str()) {
                    return Err(ValidationError::KeyCollision {
                        key: key.clone(),
                        first: first.to_string(),
                        second: node.name().to_string(),
                    });
                }
                produced_by.insert(key.as_str(), node.name());
            }

            let mut stage = 0usize;
            let mut direct_producers: HashSet<usize> = HashSet::new();

            for key in contract.requires.keys() {
                if initial_keys.contains(key) {
                    continue;
                }
                match placed_producer.get(key.as_str()) {
                    Some(&(producer_idx, producer_stage)) => {
                        stage = stage.max(producer_stage + 1);
                        direct_producers.insert(producer_idx);
                    }
                    None => {
                        return Err(ValidationError::UnsatisfiedRequirement {
                            node: node.name().to_string(),
                            key: key.clone(),
                        });
                    }
                }
            }

            // An enabled consumed namespace waits for ALL of its producers;
            // one ordered after this node is an ordering violation, not a
            // silently absent key
            for prefix in &contract.consumes {
                if !enabled_namespaces.contains(prefix) {
                    continue;
                }
                for later in &ordered[idx + 1..] {
                    if let Some(key) = later
                        .contract()
                        .provides
                        .keys()
                        .find(|key| key.starts_with(prefix.as_str()))
                    {
                        return Err(ValidationError::UnsatisfiedRequirement {
                            node: node.name().to_string(),
                            key: key.clone(),
                        });
                    }
                }
                for (key, &(producer_idx, producer_stage)) in &placed_producer {
                    if key.starts_with(prefix.as_str()) {
                        stage = stage.max(producer_stage + 1);
                        direct_producers.insert(producer_idx);
                    }
                }
            }

            for producer_idx in direct_producers {
                dependents
                    .entry(ordered[producer_idx].name().to_string())
                    .or_default()
                    .push(node.name().to_string());
            }

            for key in contract.provides.keys() {
                placed_producer.insert(key.clone(), (idx, stage));
            }
            stage_of.push(stage);
        }

        let stage_count = stage_of.iter().map(|&s| s + 1).max().unwrap_or(0);
        let mut stages: Vec<Vec<Arc<dyn Node>>> = vec![Vec::new(); stage_count];
        for (idx, node) in ordered.iter().enumerate() {
            stages[stage_of[idx]].push(node.clone());
        }

        for consumers in dependents.values_mut() {
            consumers.sort();
            consumers.dedup();
        }

        Ok(Self {
            stages,
            dependents,
            enabled_namespaces,
        })
    }

    /// The sequential stages; nodes within a stage are mutually independent.
    pub fn stages(&self) -> &[Vec<Arc<dyn Node>>] {
        &self.stages
    }

    /// Stage layout by node name, for reports.
    pub fn stage_names(&self) -> Vec<Vec<String>> {
        self.stages
            .iter()
            .map(|stage| stage.iter().map(|node| node.name().to_string()).collect())
            .collect()
    }

    /// Iterate nodes in execution order (stage by stage).
    pub fn nodes(&self) -> impl Iterator<Item = &Arc<dyn Node>> {
        self.stages.iter().flatten()
    }

    /// Total node count across all stages.
    pub fn len(&self) -> usize {
        self.stages.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// The namespaces whose `consumes` edges this plan honors; the executor
    /// uses the same set when fingerprinting.
    pub fn enabled_namespaces(&self) -> &BTreeSet<String> {
        &self.enabled_namespaces
    }

    /// Every node that transitively depends on `name`'s outputs. Used to
    /// mark "skipped due to upstream failure".
    pub fn transitive_dependents(&self, name: &str) -> HashSet<String> {
        let mut result = HashSet::new();
        let mut frontier = vec![name.to_string()];
        while let Some(current) = frontier.pop() {
            if let Some(consumers) = self.dependents.get(&current) {
                for consumer in consumers {
                    if result.insert(consumer.clone()) {
                        frontier.push(consumer.clone());
                    }
                }
            }
        }
        result
    }
}

impl std::fmt::Debug for ExecutionPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionPlan")
            .field("stages", &self.stage_names())
            .field("enabled_namespaces", &self.enabled_namespaces)
            .finish()
    }
}
