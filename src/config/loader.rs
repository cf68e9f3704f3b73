// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::context::Value;
use crate::errors::{ConfigError, FailurePolicy};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

/// Declarative configuration for one pipeline run.
///
/// Loaded from a YAML file; only `goal` is required, everything else has a
/// usable default (fail-fast policy, in-memory cache, host-sized
/// concurrency, no timeout).
///
/// # Example
/// ```yaml
/// goal: metrics.accuracy
/// failure_policy: best_effort
/// executor_options:
///   max_concurrency: 4
///   timeout_seconds: 30
/// cache:
///   backend: filesystem
///   path: /var/cache/keyflow
/// enabled_namespaces:
///   - "metrics."
/// initial:
///   config.seed: 7
///   dataset.uri: "s3://bucket/train.parquet"
/// ```
#[derive(Debug, Deserialize)]
pub struct RunConfig {
    /// The context key the run must produce
    pub goal: String,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    #[serde(default)]
    pub executor_options: ExecutorOptions,
    #[serde(default)]
    pub cache: CacheConfig,
    /// Namespace prefixes whose `consumes` edges are honored for this run
    #[serde(default)]
    pub enabled_namespaces: BTreeSet<String>,
    /// Seed key/value pairs for the run context
    #[serde(default)]
    pub initial: BTreeMap<String, Value>,
}

/// Knobs for the staged executor.
#[derive(Debug, Default, Deserialize)]
pub struct ExecutorOptions {
    /// Maximum concurrent node executions within a stage; defaults to the
    /// host's available parallelism
    pub max_concurrency: Option<usize>,
    /// Per-node execution time limit; no limit when absent
    pub timeout_seconds: Option<u64>,
}

/// Which cache backend to build for the run.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum CacheConfig {
    Memory,
    Filesystem { path: PathBuf },
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig::Memory
    }
}

impl RunConfig {
    /// Semantic checks beyond what the YAML schema enforces.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.goal.trim().is_empty() {
            return Err(ConfigError::Invalid {
                message: "goal must be a non-empty context key".to_string(),
            });
        }
        if let Some(0) = self.executor_options.max_concurrency {
            return Err(ConfigError::Invalid {
                message: "executor_options.max_concurrency must be at least 1".to_string(),
            });
        }
        if let Some(0) = self.executor_options.timeout_seconds {
            return Err(ConfigError::Invalid {
                message: "executor_options.timeout_seconds must be at least 1".to_string(),
            });
        }
        for prefix in &self.enabled_namespaces {
            if !prefix.ends_with('.') {
                return Err(ConfigError::Invalid {
                    message: format!(
                        "enabled namespace '{}' must end with '.' to be a prefix",
                        prefix
                    ),
                });
            }
        }
        if let CacheConfig::Filesystem { path } = &self.cache {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::Invalid {
                    message: "cache.path must not be empty for the filesystem backend"
                        .to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Load and validate a run configuration from a YAML file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<RunConfig, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config: RunConfig = serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    config.validate()?;
    Ok(config)
}
