// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Content-addressed cache for node outputs.
//!
//! Entries are keyed by `(node name, fingerprint of resolved inputs)` and
//! hold the node's serialized `provides` outputs. A hit lets the executor
//! restore prior outputs into the context without invoking the node's
//! action.
//!
//! Unlike the context, the cache permits idempotent re-stores: writing the
//! same key twice replaces the entry. Storage is pluggable behind the
//! [`CacheStore`] trait; backend failures surface as [`CacheError`] and are
//! treated by the executor as cache misses, never as fatal pipeline errors.

mod fingerprint;
mod fs;
mod memory;

pub use fingerprint::{fingerprint, fingerprint_parts, Fingerprint};
pub use fs::FsCache;
pub use memory::MemoryCache;

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

use crate::context::Value;

/// Errors surfaced by a cache backend. Non-fatal: the executor degrades
/// them to misses.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache i/o failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache entry serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
}

/// The outputs stored for one `(node, fingerprint)` entry.
pub type CachedOutputs = HashMap<String, Value>;

/// Uniform get/put contract every cache backend provides.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Look up the stored outputs for a node at a given input fingerprint.
    /// `Ok(None)` signals a miss.
    async fn get(
        &self,
        node: &str,
        fingerprint: &Fingerprint,
    ) -> Result<Option<CachedOutputs>, CacheError>;

    /// Persist outputs for a node at a given input fingerprint, replacing
    /// any prior entry for the same key. Entries are written all-or-nothing.
    async fn put(
        &self,
        node: &str,
        fingerprint: &Fingerprint,
        outputs: &CachedOutputs,
    ) -> Result<(), CacheError>;
}
