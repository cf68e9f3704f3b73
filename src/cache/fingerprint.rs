// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Deterministic content fingerprints over a node's resolved inputs.
//!
//! A fingerprint covers the node's name plus the serialized values of all of
//! its `requires` keys and any present keys under its enabled `consumes`
//! prefixes. Keys are hashed in sorted order, so a semantically identical
//! input state always yields the same fingerprint regardless of map
//! iteration order.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::context::{Context, Value};
use crate::errors::ContextError;
use crate::traits::Node;

/// A hex-encoded blake3 content hash identifying a node's resolved inputs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compute the fingerprint of `node` against the current context state.
///
/// Fails with [`ContextError::MissingKey`] if a required input is absent —
/// fingerprinting never invents a value for a missing key.
pub fn fingerprint(
    node: &dyn Node,
    context: &Context,
    enabled_namespaces: &BTreeSet<String>,
) -> Result<Fingerprint, ContextError> {
    let contract = node.contract();
    let mut inputs: BTreeMap<String, Value> = BTreeMap::new();

    for key in contract.requires.keys() {
        inputs.insert(key.clone(), context.get(key)?);
    }
    for prefix in &contract.consumes {
        if !enabled_namespaces.contains(prefix) {
            continue;
        }
        // Consumed keys are read if present, never required
        if let Ok(entries) = context.get_namespace(prefix) {
            inputs.extend(entries);
        }
    }

    Ok(fingerprint_parts(node.name(), inputs.iter()))
}

/// Hash a node name plus pre-gathered `(key, value)` pairs.
///
/// Callers must feed the pairs in sorted key order; the dry-run path uses
/// this directly against its shadow value map.
pub fn fingerprint_parts<'a>(
    node_name: &str,
    inputs: impl Iterator<Item = (&'a String, &'a Value)>,
) -> Fingerprint {
    let mut hasher = blake3::Hasher::new();
    hasher.update(node_name.as_bytes());
    hasher.update(&[0]);
    for (key, value) in inputs {
        hasher.update(key.as_bytes());
        hasher.update(&[0]);
        // Value's Display renders compact JSON; object keys are already
        // sorted in serde_json's default map representation
        hasher.update(value.to_string().as_bytes());
        hasher.update(&[0]);
    }
    Fingerprint(hasher.finalize().to_hex().to_string())
}
