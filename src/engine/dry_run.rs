// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Dry-run prediction: which nodes would execute and which would be cache
//! hits, without running any action.
//!
//! The walk carries a shadow value map seeded from the context. A cache hit
//! contributes its stored outputs to the shadow map, so downstream
//! fingerprints stay accurate. A predicted execution has unknowable outputs;
//! its `provides` keys are marked poisoned, and any node whose inputs touch a
//! poisoned key is conservatively predicted as "will run".

use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

use crate::cache::{fingerprint_parts, CacheStore};
use crate::context::{Context, Value};
use crate::graph::ExecutionPlan;

/// Predicted fate of one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DryRunStatus {
    /// The action would be invoked (cache miss, or inputs not predictable)
    WillRun,
    /// The cached outputs would be restored without invoking the action
    Cached,
}

/// One row of a dry-run prediction, in execution order.
#[derive(Debug, Clone, Serialize)]
pub struct DryRunEntry {
    pub node: String,
    pub status: DryRunStatus,
}

/// Predict the cache behavior of `plan` against the current context and
/// cache state. Nothing is executed and nothing is written.
pub async fn dry_run(
    plan: &ExecutionPlan,
    context: &Context,
    cache: &dyn CacheStore,
) -> Vec<DryRunEntry> {
    let mut known: BTreeMap<String, Value> = context.snapshot();
    let mut poisoned: HashSet<String> = HashSet::new();
    let mut entries = Vec::with_capacity(plan.len());

    for node in plan.nodes() {
        let contract = node.contract();
        let mut inputs: BTreeMap<String, Value> = BTreeMap::new();
        let mut predictable = true;

        for key in contract.requires.keys() {
            if poisoned.contains(key) {
                predictable = false;
                break;
            }
            match known.get(key) {
                Some(value) => {
                    inputs.insert(key.clone(), value.clone());
                }
                None => {
                    predictable = false;
                    break;
                }
            }
        }

        if predictable {
            for prefix in &contract.consumes {
                if !plan.enabled_namespaces().contains(prefix) {
                    continue;
                }
                if poisoned.iter().any(|key| key.starts_with(prefix.as_str())) {
                    predictable = false;
                    break;
                }
                for (key, value) in known.range(prefix.clone()..) {
                    if !key.starts_with(prefix.as_str()) {
                        break;
                    }
                    inputs.insert(key.clone(), value.clone());
                }
            }
        }

        let status = if predictable {
            let fp = fingerprint_parts(node.name(), inputs.iter());
            match cache.get(node.name(), &fp).await {
                Ok(Some(outputs)) => {
                    for (key, value) in outputs {
                        known.insert(key, value);
                    }
                    DryRunStatus::Cached
                }
                Ok(None) => DryRunStatus::WillRun,
                Err(err) => {
                    tracing::warn!(node = node.name(), error = %err, "cache lookup failed in dry run");
                    DryRunStatus::WillRun
                }
            }
        } else {
            DryRunStatus::WillRun
        };

        if status == DryRunStatus::WillRun {
            for key in contract.provides.keys() {
                poisoned.insert(key.clone());
            }
        }
        entries.push(DryRunEntry {
            node: node.name().to_string(),
            status,
        });
    }

    entries
}
