// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{CacheStore, FsCache, MemoryCache};
use crate::config::{CacheConfig, RunConfig};
use crate::context::Context;
use crate::engine::{DryRunEntry, RunReport, StagedExecutor};
use crate::errors::{ConfigError, FailurePolicy};
use crate::pipeline::{Pipeline, PipelineError};
use crate::traits::NodeSet;

/// Assembles a ready-to-run environment from a [`RunConfig`].
///
/// Builds the seeded context, the configured cache backend, and the staged
/// executor so callers only have to supply the node pool:
///
/// ```no_run
/// use keyflow::config::{load_config, RuntimeBuilder};
/// use keyflow::traits::NodeSet;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config("run.yaml")?;
/// let runtime = RuntimeBuilder::from_config(&config)?;
/// let nodes = NodeSet::new();
/// let report = runtime.run(&nodes).await?;
/// # Ok(())
/// # }
/// ```
pub struct RuntimeBuilder;

impl RuntimeBuilder {
    /// Build a [`Runtime`] from a validated configuration.
    pub fn from_config(config: &RunConfig) -> Result<Runtime, ConfigError> {
        config.validate()?;

        let seed = config
            .initial
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()));
        let context = Context::seeded(seed).map_err(|err| ConfigError::Invalid {
            message: err.to_string(),
        })?;

        let cache: Arc<dyn CacheStore> = match &config.cache {
            CacheConfig::Memory => Arc::new(MemoryCache::new()),
            CacheConfig::Filesystem { path } => Arc::new(FsCache::new(path.clone())),
        };

        let mut executor = match config.executor_options.max_concurrency {
            Some(limit) => StagedExecutor::new(limit),
            None => StagedExecutor::default(),
        };
        if let Some(seconds) = config.executor_options.timeout_seconds {
            executor = executor.with_timeout(Duration::from_secs(seconds));
        }

        Ok(Runtime {
            goal: config.goal.clone(),
            policy: config.failure_policy,
            executor,
            cache,
            context: Arc::new(context),
            enabled_namespaces: config.enabled_namespaces.clone(),
        })
    }
}

/// A configured execution environment for one goal.
pub struct Runtime {
    goal: String,
    policy: FailurePolicy,
    executor: StagedExecutor,
    cache: Arc<dyn CacheStore>,
    context: Arc<Context>,
    enabled_namespaces: BTreeSet<String>,
}

impl Runtime {
    pub fn goal(&self) -> &str {
        &self.goal
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// The run's seeded context; outputs accumulate here during `run`.
    pub fn context(&self) -> &Arc<Context> {
        &self.context
    }

    pub fn cache(&self) -> &Arc<dyn CacheStore> {
        &self.cache
    }

    /// Execute the configured goal against a node pool.
    pub async fn run(&self, nodes: &NodeSet) -> Result<RunReport, PipelineError> {
        let pipeline =
            Pipeline::new(nodes.clone()).with_namespaces(self.enabled_namespaces.clone());
        pipeline
            .run(
                &self.goal,
                self.context.clone(),
                self.cache.clone(),
                &self.executor,
                self.policy,
            )
            .await
    }

    /// Predict cache behavior for the configured goal without executing.
    pub async fn dry_run(&self, nodes: &NodeSet) -> Result<Vec<DryRunEntry>, PipelineError> {
        let pipeline =
            Pipeline::new(nodes.clone()).with_namespaces(self.enabled_namespaces.clone());
        pipeline
            .dry_run(&self.goal, &self.context, self.cache.as_ref())
            .await
    }
}
