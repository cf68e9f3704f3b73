// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Stage-by-stage executor.
//!
//! Runs the plan one stage at a time: nodes within a stage are spawned as
//! concurrent tasks bounded by a semaphore, and the next stage starts only
//! after every task in the current one has settled. Before invoking a node's
//! action the executor consults the cache; on a hit the stored outputs are
//! restored into the context and the action never runs.
//!
//! Failure handling follows the configured [`FailurePolicy`]: fail-fast stops
//! scheduling new work after the first failure (tasks already in flight are
//! left to finish), while best-effort keeps executing every node that does
//! not transitively depend on a failed one.

use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Semaphore;

use crate::cache::{fingerprint, CacheStore, CachedOutputs};
use crate::context::{Context, ValueType};
use crate::engine::report::{NodeStatus, RunReport};
use crate::errors::{ContextError, ExecutionError, FailurePolicy};
use crate::graph::ExecutionPlan;
use crate::traits::{Node, PipelineExecutor};

/// Executor that drives a plan stage by stage with bounded concurrency.
#[derive(Debug, Clone)]
pub struct StagedExecutor {
    max_concurrency: usize,
    node_timeout: Option<Duration>,
}

impl StagedExecutor {
    /// Create an executor with an explicit per-stage concurrency bound.
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            max_concurrency: max_concurrency.max(1),
            node_timeout: None,
        }
    }

    /// Create an executor sized to the host's available parallelism.
    pub fn default() -> Self {
        let parallelism = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Self::new(parallelism)
    }

    /// Cap how long any single node may run; a node exceeding the limit is
    /// abandoned and reported as [`ExecutionError::Timeout`].
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.node_timeout = Some(timeout);
        self
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }
}

#[async_trait]
impl PipelineExecutor for StagedExecutor {
    async fn execute_with_policy(
        &self,
        plan: &ExecutionPlan,
        context: Arc<Context>,
        cache: Arc<dyn CacheStore>,
        policy: FailurePolicy,
    ) -> Result<RunReport, ExecutionError> {
        let started = Instant::now();
        let mut report = RunReport::new(plan.stage_names());
        // Names of nodes downstream of a failure; grows as failures land
        let mut skip: HashSet<String> = HashSet::new();
        let mut any_failed = false;

        for (stage_idx, stage) in plan.stages().iter().enumerate() {
            if any_failed && policy == FailurePolicy::FailFast {
                break;
            }

            let mut runnable: Vec<Arc<dyn Node>> = Vec::with_capacity(stage.len());
            for node in stage {
                if skip.contains(node.name()) {
                    tracing::debug!(node = node.name(), "skipping, upstream failed");
                    report.mark_skipped(node.name());
                } else {
                    runnable.push(node.clone());
                }
            }
            if runnable.is_empty() {
                continue;
            }

            tracing::debug!(
                stage = stage_idx,
                nodes = runnable.len(),
                "starting stage"
            );

            let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
            // Set by the first failing task so queued siblings bail out
            // before starting, matching fail-fast semantics within a stage
            let abort = Arc::new(AtomicBool::new(false));

            let mut tasks = Vec::with_capacity(runnable.len());
            for node in runnable {
                let context = context.clone();
                let cache = cache.clone();
                let semaphore = semaphore.clone();
                let abort = abort.clone();
                let enabled = plan.enabled_namespaces().clone();
                let timeout = self.node_timeout;
                let honor_abort = policy == FailurePolicy::FailFast;

                tasks.push(tokio::spawn(async move {
                    let name = node.name().to_string();
                    let _permit = match semaphore.acquire().await {
                        Ok(permit) => permit,
                        Err(_) => {
                            return NodeOutcome {
                                node: name.clone(),
                                kind: OutcomeKind::Failed {
                                    error: ExecutionError::Internal {
                                        message: format!(
                                            "stage semaphore closed before '{}' started",
                                            name
                                        ),
                                    },
                                    duration: Duration::ZERO,
                                },
                            };
                        }
                    };
                    if honor_abort && abort.load(Ordering::SeqCst) {
                        return NodeOutcome {
                            node: name,
                            kind: OutcomeKind::NotStarted,
                        };
                    }

                    let node_started = Instant::now();
                    match drive_node(node.as_ref(), &context, cache.as_ref(), &enabled, timeout)
                        .await
                    {
                        Ok(cache_hit) => NodeOutcome {
                            node: name,
                            kind: OutcomeKind::Completed {
                                cache_hit,
                                duration: node_started.elapsed(),
                            },
                        },
                        Err(error) => {
                            abort.store(true, Ordering::SeqCst);
                            NodeOutcome {
                                node: name,
                                kind: OutcomeKind::Failed {
                                    error,
                                    duration: node_started.elapsed(),
                                },
                            }
                        }
                    }
                }));
            }

            for task in tasks {
                let outcome = task.await.map_err(|err| ExecutionError::Internal {
                    message: format!("node task panicked or was cancelled: {}", err),
                })?;
                match outcome.kind {
                    OutcomeKind::Completed {
                        cache_hit,
                        duration,
                    } => {
                        let status = if cache_hit {
                            NodeStatus::CacheHit
                        } else {
                            NodeStatus::Done
                        };
                        report.mark_completed(&outcome.node, status, duration);
                    }
                    OutcomeKind::Failed { error, duration } => {
                        tracing::warn!(node = %outcome.node, error = %error, "node failed");
                        report.mark_failed(&outcome.node, error.to_string(), duration);
                        skip.extend(plan.transitive_dependents(&outcome.node));
                        any_failed = true;
                    }
                    OutcomeKind::NotStarted => {
                        report.mark_skipped(&outcome.node);
                    }
                }
            }
        }

        report.skip_remaining();
        report.set_total(started.elapsed());

        if any_failed {
            Err(ExecutionError::RunFailed {
                report: Box::new(report),
            })
        } else {
            Ok(report)
        }
    }
}

struct NodeOutcome {
    node: String,
    kind: OutcomeKind,
}

enum OutcomeKind {
    Completed { cache_hit: bool, duration: Duration },
    Failed { error: ExecutionError, duration: Duration },
    /// Bailed out on the fail-fast abort flag before doing any work
    NotStarted,
}

/// Drive one node through fingerprint, cache lookup, execution, output
/// verification, context write-back, and cache store. Returns whether the
/// outputs came from the cache.
async fn drive_node(
    node: &dyn Node,
    context: &Context,
    cache: &dyn CacheStore,
    enabled_namespaces: &BTreeSet<String>,
    timeout: Option<Duration>,
) -> Result<bool, ExecutionError> {
    let name = node.name();

    // Fingerprinting reads every required key, so this doubles as the
    // pre-invocation input check
    let fp = fingerprint(node, context, enabled_namespaces).map_err(|source| match source {
        ContextError::MissingKey { key } => ExecutionError::MissingInput {
            node: name.to_string(),
            key,
        },
        other => ExecutionError::Context {
            node: name.to_string(),
            source: other,
        },
    })?;

    match cache.get(name, &fp).await {
        Ok(Some(outputs)) => {
            tracing::debug!(node = name, fingerprint = %fp, "cache hit");
            write_outputs(name, context, &outputs)?;
            return Ok(true);
        }
        Ok(None) => {}
        Err(err) => {
            tracing::warn!(node = name, error = %err, "cache lookup failed, treating as miss");
        }
    }

    tracing::debug!(node = name, "running");
    let action = node.run(context);
    let result = match timeout {
        Some(limit) => match tokio::time::timeout(limit, action).await {
            Ok(result) => result,
            Err(_) => {
                return Err(ExecutionError::Timeout {
                    node: name.to_string(),
                    limit,
                })
            }
        },
        None => action.await,
    };
    let outputs = result.map_err(|source| ExecutionError::NodeFailed {
        node: name.to_string(),
        source,
    })?;

    verify_outputs(node, &outputs)?;
    // Write back first: an entry only lands in the cache once the node has
    // fully succeeded, context writes included
    write_outputs(name, context, &outputs)?;
    if let Err(err) = cache.put(name, &fp, &outputs).await {
        tracing::warn!(node = name, error = %err, "cache store failed, continuing");
    }
    Ok(false)
}

/// Check the returned output map against the node's declared `provides` set.
fn verify_outputs(node: &dyn Node, outputs: &CachedOutputs) -> Result<(), ExecutionError> {
    let contract = node.contract();
    for (key, expected) in &contract.provides {
        match outputs.get(key) {
            Some(value) if expected.matches(value) => {}
            Some(value) => {
                return Err(ExecutionError::OutputTypeMismatch {
                    node: node.name().to_string(),
                    key: key.clone(),
                    expected: *expected,
                    actual: ValueType::of(value),
                });
            }
            None => {
                return Err(ExecutionError::MissingDeclaredOutput {
                    node: node.name().to_string(),
                    key: key.clone(),
                });
            }
        }
    }
    for key in outputs.keys() {
        if !contract.provides.contains_key(key) {
            return Err(ExecutionError::UndeclaredOutput {
                node: node.name().to_string(),
                key: key.clone(),
            });
        }
    }
    Ok(())
}

fn write_outputs(
    name: &str,
    context: &Context,
    outputs: &CachedOutputs,
) -> Result<(), ExecutionError> {
    for (key, value) in outputs {
        context
            .set(key.clone(), value.clone())
            .map_err(|source| ExecutionError::Context {
                node: name.to_string(),
                source,
            })?;
    }
    Ok(())
}
