// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fmt;

/// Errors raised by the write-once context store.
///
/// The context never coerces, defaults, or silently drops a value: every
/// violation of the read/write contract surfaces as one of these variants,
/// naming the key involved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextError {
    /// A key was written twice within a single pipeline run
    DuplicateKey {
        /// The key that already holds a value
        key: String,
    },
    /// A key was read before any node (or the initial seed) produced it
    MissingKey {
        /// The absent key
        key: String,
    },
    /// A namespace read matched no keys
    EmptyNamespace {
        /// The prefix that matched nothing
        prefix: String,
    },
}

impl fmt::Display for ContextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextError::DuplicateKey { key } => {
                write!(f, "Duplicate key: '{}' was already written this run", key)
            }
            ContextError::MissingKey { key } => {
                write!(f, "Key not found: '{}'", key)
            }
            ContextError::EmptyNamespace { prefix } => {
                write!(f, "No keys under prefix '{}'", prefix)
            }
        }
    }
}

impl std::error::Error for ContextError {}
