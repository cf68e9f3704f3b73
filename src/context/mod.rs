// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Shared, namespaced, write-once key/value store: the data bus between nodes.
//!
//! A [`Context`] is created fresh for a single pipeline run and passed
//! explicitly to the executor (no ambient singletons). Keys follow a two-part
//! `domain.field` convention; a prefix such as `features.` addresses the
//! whole namespace.
//!
//! # Write-once invariant
//!
//! A key, once set, can never be overwritten — the second `set` fails with
//! [`ContextError::DuplicateKey`]. This is checked at write time, not just at
//! validation time, so a dynamic node that strays from its declared contract
//! is caught during the run. The invariant is also what makes concurrent
//! execution safe: nodes in the same stage write disjoint key sets, and
//! write-once makes the final state independent of interleaving order.
//!
//! # Locking
//!
//! The map is guarded by a `parking_lot::RwLock`. Guards are held only for
//! the duration of a single read or write and MUST NOT be held across
//! `.await` suspension points.

mod value;

pub use value::{Value, ValueType};

use crate::errors::ContextError;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

/// The shared key/value store for one pipeline run.
#[derive(Debug, Default)]
pub struct Context {
    values: RwLock<HashMap<String, Value>>,
}

impl Context {
    /// Create an empty context.
    pub fn new() -> Self {
        Self {
            values: RwLock::new(HashMap::new()),
        }
    }

    /// Create a context seeded with initial key/value pairs.
    ///
    /// Fails with [`ContextError::DuplicateKey`] if the seed contains the
    /// same key twice.
    pub fn seeded<I>(seed: I) -> Result<Self, ContextError>
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let ctx = Self::new();
        for (key, value) in seed {
            ctx.set(key, value)?;
        }
        Ok(ctx)
    }

    /// Write a key. Fails with [`ContextError::DuplicateKey`] if the key
    /// already holds a value. No value is ever coerced or replaced.
    pub fn set(&self, key: impl Into<String>, value: Value) -> Result<(), ContextError> {
        let key = key.into();
        let mut values = self.values.write();
        if values.contains_key(&key) {
            return Err(ContextError::DuplicateKey { key });
        }
        values.insert(key, value);
        Ok(())
    }

    /// Read a key. Fails with [`ContextError::MissingKey`] if absent; there
    /// is no defaulted read path.
    pub fn get(&self, key: &str) -> Result<Value, ContextError> {
        self.values
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| ContextError::MissingKey {
                key: key.to_string(),
            })
    }

    /// Read every entry whose key starts with `prefix`, sorted by key.
    /// Fails with [`ContextError::EmptyNamespace`] if nothing matches.
    pub fn get_namespace(&self, prefix: &str) -> Result<BTreeMap<String, Value>, ContextError> {
        let values = self.values.read();
        let entries: BTreeMap<String, Value> = values
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        if entries.is_empty() {
            return Err(ContextError::EmptyNamespace {
                prefix: prefix.to_string(),
            });
        }
        Ok(entries)
    }

    /// Whether a key currently holds a value.
    pub fn contains(&self, key: &str) -> bool {
        self.values.read().contains_key(key)
    }

    /// All keys currently present, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.values.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Number of keys currently present.
    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }

    /// Ordered copy of the full key/value state, e.g. for audit persistence
    /// at run end.
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.values
            .read()
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}
