// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use std::sync::Arc;

use crate::cache::CacheStore;
use crate::context::Context;
use crate::engine::report::RunReport;
use crate::errors::{ExecutionError, FailurePolicy};
use crate::graph::ExecutionPlan;

#[async_trait]
pub trait PipelineExecutor: Send + Sync {
    /// Execute a validated plan against a context, consulting the cache.
    ///
    /// - `plan`: immutable staged node sequence built by the resolver/planner
    /// - `context`: the run's shared write-once key/value store
    /// - `cache`: pluggable content-addressed store; backend failures degrade
    ///   to cache misses
    ///
    /// Returns the per-node, stage-by-stage [`RunReport`] on success, or an
    /// [`ExecutionError`] carrying that same report when any node failed.
    async fn execute(
        &self,
        plan: &ExecutionPlan,
        context: Arc<Context>,
        cache: Arc<dyn CacheStore>,
    ) -> Result<RunReport, ExecutionError> {
        self.execute_with_policy(plan, context, cache, FailurePolicy::default())
            .await
    }

    /// Execute with a specific failure handling policy
    async fn execute_with_policy(
        &self,
        plan: &ExecutionPlan,
        context: Arc<Context>,
        cache: Arc<dyn CacheStore>,
        policy: FailurePolicy,
    ) -> Result<RunReport, ExecutionError>;
}
