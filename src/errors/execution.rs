// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::context::ValueType;
use crate::engine::report::RunReport;
use crate::errors::ContextError;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

/// How the executor reacts when a node fails.
///
/// With either policy, siblings already in flight when a failure lands are
/// allowed to finish; nothing is preemptively cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Abort the run at the first failure; every node not yet started is
    /// reported as skipped. This is the default.
    FailFast,
    /// Keep executing branches that do not depend on the failed node; only
    /// its transitive dependents are skipped.
    BestEffort,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        FailurePolicy::FailFast
    }
}

/// Errors raised while executing a plan.
///
/// Per-node failures are folded into the final [`RunReport`] so callers can
/// see how far the run progressed; the variants other than `RunFailed` are
/// produced while a single node is being driven through its state machine.
#[derive(Debug)]
pub enum ExecutionError {
    /// A required input was absent when the node was about to run
    MissingInput {
        node: String,
        key: String,
    },
    /// The node's action (or its cached outputs) violated the write-once rule
    Context {
        node: String,
        source: ContextError,
    },
    /// The node declared an output it did not write
    MissingDeclaredOutput {
        node: String,
        key: String,
    },
    /// The node wrote an output it never declared
    UndeclaredOutput {
        node: String,
        key: String,
    },
    /// The node wrote an output whose value does not match its declared type
    OutputTypeMismatch {
        node: String,
        key: String,
        expected: ValueType,
        actual: ValueType,
    },
    /// The node's action returned an error
    NodeFailed {
        node: String,
        source: anyhow::Error,
    },
    /// The node exceeded its allotted execution time
    Timeout {
        node: String,
        limit: Duration,
    },
    /// The run finished with at least one failed node; the report carries the
    /// full per-node, stage-by-stage status
    RunFailed {
        report: Box<RunReport>,
    },
    /// Internal consistency error; indicates a bug rather than bad input
    Internal {
        message: String,
    },
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionError::MissingInput { node, key } => {
                write!(f, "Node '{}' requires '{}' which is absent at execution time", node, key)
            }
            ExecutionError::Context { node, source } => {
                write!(f, "Node '{}': {}", node, source)
            }
            ExecutionError::MissingDeclaredOutput { node, key } => {
                write!(f, "Node '{}' declared output '{}' but did not write it", node, key)
            }
            ExecutionError::UndeclaredOutput { node, key } => {
                write!(f, "Node '{}' wrote '{}' which it never declared", node, key)
            }
            ExecutionError::OutputTypeMismatch {
                node,
                key,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "Node '{}' wrote '{}' as {} but declared it as {}",
                    node, key, actual, expected
                )
            }
            ExecutionError::NodeFailed { node, source } => {
                write!(f, "Node '{}' failed: {}", node, source)
            }
            ExecutionError::Timeout { node, limit } => {
                write!(f, "Node '{}' timed out after {:?}", node, limit)
            }
            ExecutionError::RunFailed { report } => {
                let failed = report.failed_nodes();
                write!(
                    f,
                    "Pipeline run failed: {} node(s) failed ({})",
                    failed.len(),
                    failed.join(", ")
                )
            }
            ExecutionError::Internal { message } => {
                write!(f, "Internal consistency error: {}", message)
            }
        }
    }
}

impl std::error::Error for ExecutionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExecutionError::Context { source, .. } => Some(source),
            ExecutionError::NodeFailed { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}
