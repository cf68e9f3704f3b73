// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Per-run execution reporting.
//!
//! A [`RunReport`] records, for every node in the plan, where it ended up in
//! the per-node state machine plus timing, and mirrors the plan's stage
//! layout. Reports serialize to JSON for operational tooling.

use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// The states a node moves through during a run.
///
/// `Pending -> CacheHit | Running -> Done | Failed`, with `Skipped` assigned
/// to pending nodes downstream of a failure (or, under fail-fast, to every
/// node not yet started).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Pending,
    Running,
    /// Outputs restored from the cache without invoking the action
    CacheHit,
    Done,
    Failed,
    /// Never started because an upstream node failed
    Skipped,
}

/// Final record for a single node.
#[derive(Debug, Clone, Serialize)]
pub struct NodeReport {
    pub status: NodeStatus,
    /// Wall-clock time spent on the node; absent for skipped nodes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<Duration>,
    /// Rendered error for failed nodes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Stage-by-stage outcome of one pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    stages: Vec<Vec<String>>,
    nodes: BTreeMap<String, NodeReport>,
    /// Total wall-clock duration of the run
    total: Duration,
}

impl RunReport {
    /// Initialize a report from the plan's stage layout; every node starts
    /// out pending.
    pub fn new(stages: Vec<Vec<String>>) -> Self {
        let nodes = stages
            .iter()
            .flatten()
            .map(|name| {
                (
                    name.clone(),
                    NodeReport {
                        status: NodeStatus::Pending,
                        duration: None,
                        error: None,
                    },
                )
            })
            .collect();
        Self {
            stages,
            nodes,
            total: Duration::ZERO,
        }
    }

    pub fn mark_completed(&mut self, node: &str, status: NodeStatus, duration: Duration) {
        if let Some(entry) = self.nodes.get_mut(node) {
            entry.status = status;
            entry.duration = Some(duration);
        }
    }

    pub fn mark_failed(&mut self, node: &str, error: String, duration: Duration) {
        if let Some(entry) = self.nodes.get_mut(node) {
            entry.status = NodeStatus::Failed;
            entry.duration = Some(duration);
            entry.error = Some(error);
        }
    }

    pub fn mark_skipped(&mut self, node: &str) {
        if let Some(entry) = self.nodes.get_mut(node) {
            entry.status = NodeStatus::Skipped;
        }
    }

    /// Demote every still-pending node to skipped; used when a fail-fast run
    /// aborts between stages.
    pub fn skip_remaining(&mut self) {
        for entry in self.nodes.values_mut() {
            if entry.status == NodeStatus::Pending {
                entry.status = NodeStatus::Skipped;
            }
        }
    }

    pub fn set_total(&mut self, total: Duration) {
        self.total = total;
    }

    /// The stage layout the plan ran with.
    pub fn stages(&self) -> &[Vec<String>] {
        &self.stages
    }

    /// Per-node records, keyed by node name.
    pub fn nodes(&self) -> &BTreeMap<String, NodeReport> {
        &self.nodes
    }

    pub fn status(&self, node: &str) -> Option<NodeStatus> {
        self.nodes.get(node).map(|entry| entry.status)
    }

    pub fn total(&self) -> Duration {
        self.total
    }

    /// True when every node finished as done or a cache hit.
    pub fn is_success(&self) -> bool {
        self.nodes
            .values()
            .all(|entry| matches!(entry.status, NodeStatus::Done | NodeStatus::CacheHit))
    }

    /// Names of failed nodes, sorted.
    pub fn failed_nodes(&self) -> Vec<String> {
        self.nodes
            .iter()
            .filter(|(_, entry)| entry.status == NodeStatus::Failed)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Names of skipped nodes, sorted.
    pub fn skipped_nodes(&self) -> Vec<String> {
        self.nodes
            .iter()
            .filter(|(_, entry)| entry.status == NodeStatus::Skipped)
            .map(|(name, _)| name.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> Vec<Vec<String>> {
        vec![
            vec!["extract".to_string()],
            vec!["train".to_string(), "profile".to_string()],
        ]
    }

    #[test]
    fn new_report_is_all_pending() {
        let report = RunReport::new(layout());
        assert_eq!(report.nodes().len(), 3);
        assert_eq!(report.status("train"), Some(NodeStatus::Pending));
        assert!(!report.is_success());
    }

    #[test]
    fn success_requires_every_node_done_or_cached() {
        let mut report = RunReport::new(layout());
        report.mark_completed("extract", NodeStatus::Done, Duration::from_millis(3));
        report.mark_completed("train", NodeStatus::CacheHit, Duration::from_millis(1));
        assert!(!report.is_success());

        report.mark_completed("profile", NodeStatus::Done, Duration::from_millis(2));
        assert!(report.is_success());
        assert!(report.failed_nodes().is_empty());
    }

    #[test]
    fn failures_and_skips_are_listed_sorted() {
        let mut report = RunReport::new(layout());
        report.mark_failed("extract", "disk on fire".to_string(), Duration::from_millis(1));
        report.skip_remaining();

        assert_eq!(report.failed_nodes(), vec!["extract"]);
        assert_eq!(report.skipped_nodes(), vec!["profile", "train"]);
        assert_eq!(
            report.nodes()["extract"].error.as_deref(),
            Some("disk on fire")
        );
    }

    #[test]
    fn serializes_with_stage_layout() {
        let mut report = RunReport::new(layout());
        report.mark_completed("extract", NodeStatus::Done, Duration::from_millis(3));

        let rendered = serde_json::to_value(&report).unwrap();
        assert_eq!(rendered["stages"][0][0], "extract");
        assert_eq!(rendered["nodes"]["extract"]["status"], "done");
        assert_eq!(rendered["nodes"]["train"]["status"], "pending");
    }
}
