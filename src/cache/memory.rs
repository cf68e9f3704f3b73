// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use super::{CacheError, CacheStore, CachedOutputs, Fingerprint};

/// In-process cache backend; the default when no persistence is configured.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<(String, String), CachedOutputs>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(
        &self,
        node: &str,
        fingerprint: &Fingerprint,
    ) -> Result<Option<CachedOutputs>, CacheError> {
        let key = (node.to_string(), fingerprint.as_str().to_string());
        Ok(self.entries.read().get(&key).cloned())
    }

    async fn put(
        &self,
        node: &str,
        fingerprint: &Fingerprint,
        outputs: &CachedOutputs,
    ) -> Result<(), CacheError> {
        let key = (node.to_string(), fingerprint.as_str().to_string());
        self.entries.write().insert(key, outputs.clone());
        Ok(())
    }
}
