// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod config;
mod context;
mod execution;
mod graph;

pub use config::ConfigError;
pub use context::ContextError;
pub use execution::{ExecutionError, FailurePolicy};
pub use graph::{ResolveError, ValidationError};
