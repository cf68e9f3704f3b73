// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The validate-then-execute facade.
//!
//! A [`Pipeline`] owns a registered node pool and the set of enabled
//! namespaces, and drives the full sequence for a goal: static validation of
//! every contract, backward resolution to a minimal ordered node list, plan
//! staging, and execution. Nothing runs until the whole graph has been
//! proven well-formed against the initial context.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use crate::cache::CacheStore;
use crate::context::{Context, ValueType};
use crate::engine::{self, DryRunEntry, RunReport};
use crate::errors::{ExecutionError, FailurePolicy, ResolveError, ValidationError};
use crate::graph::{resolve, validate, ExecutionPlan};
use crate::traits::{NodeSet, PipelineExecutor};

/// Errors surfaced by the pipeline facade, one variant per phase.
#[derive(Debug)]
pub enum PipelineError {
    /// Static contract validation failed; every violation is reported, not
    /// just the first
    Validation(Vec<ValidationError>),
    /// The goal could not be resolved to an executable subgraph
    Resolve(ResolveError),
    /// The ordered node list could not be staged into a plan
    Plan(ValidationError),
    /// The run itself failed
    Execution(ExecutionError),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Validation(errors) => {
                let rendered: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
                write!(
                    f,
                    "Pipeline validation failed with {} error(s):\n{}",
                    errors.len(),
                    rendered.join("\n")
                )
            }
            PipelineError::Resolve(err) => write!(f, "Pipeline resolution failed: {}", err),
            PipelineError::Plan(err) => write!(f, "Pipeline planning failed: {}", err),
            PipelineError::Execution(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PipelineError::Resolve(err) => Some(err),
            PipelineError::Plan(err) => Some(err),
            PipelineError::Execution(err) => Some(err),
            PipelineError::Validation(_) => None,
        }
    }
}

impl From<ResolveError> for PipelineError {
    fn from(err: ResolveError) -> Self {
        PipelineError::Resolve(err)
    }
}

impl From<ExecutionError> for PipelineError {
    fn from(err: ExecutionError) -> Self {
        PipelineError::Execution(err)
    }
}

/// A registered node pool ready to plan and execute runs.
#[derive(Debug, Clone)]
pub struct Pipeline {
    nodes: NodeSet,
    enabled_namespaces: BTreeSet<String>,
}

impl Pipeline {
    pub fn new(nodes: NodeSet) -> Self {
        Self {
            nodes,
            enabled_namespaces: BTreeSet::new(),
        }
    }

    /// Honor `consumes` edges for a namespace prefix, e.g. `"metrics."`.
    /// Disabled namespaces impose no ordering and never feed fingerprints.
    pub fn enable_namespace(mut self, prefix: impl Into<String>) -> Self {
        self.enabled_namespaces.insert(prefix.into());
        self
    }

    pub fn with_namespaces(mut self, namespaces: BTreeSet<String>) -> Self {
        self.enabled_namespaces = namespaces;
        self
    }

    pub fn nodes(&self) -> &NodeSet {
        &self.nodes
    }

    /// Validate the whole pool and build the staged plan for `goal`.
    ///
    /// The initial key set and its types are taken from the current context
    /// state, so seeds participate in both satisfiability and type checks.
    pub fn plan(&self, goal: &str, context: &Context) -> Result<ExecutionPlan, PipelineError> {
        let initial_types: BTreeMap<String, ValueType> = context
            .snapshot()
            .iter()
            .map(|(key, value)| (key.clone(), ValueType::of(value)))
            .collect();
        validate(&self.nodes, &initial_types).map_err(PipelineError::Validation)?;

        let initial_keys: BTreeSet<String> = initial_types.into_keys().collect();
        let order = resolve(goal, &self.nodes, &initial_keys, &self.enabled_namespaces)?;
        let plan = ExecutionPlan::build(&order, &initial_keys, self.enabled_namespaces.clone())
            .map_err(PipelineError::Plan)?;

        tracing::debug!(
            goal,
            nodes = plan.len(),
            stages = plan.stages().len(),
            "plan built"
        );
        Ok(plan)
    }

    /// Validate, plan, and execute the subgraph needed to produce `goal`.
    pub async fn run(
        &self,
        goal: &str,
        context: Arc<Context>,
        cache: Arc<dyn CacheStore>,
        executor: &dyn PipelineExecutor,
        policy: FailurePolicy,
    ) -> Result<RunReport, PipelineError> {
        let plan = self.plan(goal, &context)?;
        tracing::info!(goal, nodes = plan.len(), "starting run");
        let report = executor
            .execute_with_policy(&plan, context, cache, policy)
            .await?;
        tracing::info!(goal, total = ?report.total(), "run complete");
        Ok(report)
    }

    /// Predict cache behavior for `goal` without executing anything.
    pub async fn dry_run(
        &self,
        goal: &str,
        context: &Context,
        cache: &dyn CacheStore,
    ) -> Result<Vec<DryRunEntry>, PipelineError> {
        let plan = self.plan(goal, context)?;
        Ok(engine::dry_run(&plan, context, cache).await)
    }
}
