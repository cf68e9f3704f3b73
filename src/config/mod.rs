// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Run configuration loading and runtime assembly.

mod loader;
mod runtime;

pub use loader::{load_config, CacheConfig, ExecutorOptions, RunConfig};
pub use runtime::{Runtime, RuntimeBuilder};
