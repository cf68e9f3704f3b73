// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::context::ValueType;
use std::fmt;

/// Errors that can occur during static validation of a node set.
///
/// Validation runs before anything executes; these errors always name the
/// node(s) and key involved so a misconfigured graph can be fixed without
/// reading engine internals.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Two nodes share the same name
    DuplicateNodeName {
        /// The duplicated node name
        node: String,
    },
    /// A node requires a key that neither the initial context nor an earlier
    /// producer satisfies
    UnsatisfiedRequirement {
        /// The node with the unsatisfied requirement
        node: String,
        /// The key that nothing produces
        key: String,
    },
    /// Two producers declare the same output key
    KeyCollision {
        /// The key produced twice
        key: String,
        /// The first producer ("<initial>" when the initial context holds the key)
        first: String,
        /// The second producer
        second: String,
    },
    /// A key's declared provides type disagrees with a requires declaration
    TypeConflict {
        /// The key whose declarations disagree
        key: String,
        /// The producer's declared type
        provided: ValueType,
        /// The node that expects something else
        node: String,
        /// The type that node declared
        expected: ValueType,
    },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::DuplicateNodeName { node } => {
                write!(f, "Duplicate node name: '{}'", node)
            }
            ValidationError::UnsatisfiedRequirement { node, key } => {
                write!(
                    f,
                    "Node '{}' requires '{}' which is not satisfied by the initial context or an earlier producer",
                    node, key
                )
            }
            ValidationError::KeyCollision { key, first, second } => {
                write!(
                    f,
                    "Key '{}' is produced by both '{}' and '{}'",
                    key, first, second
                )
            }
            ValidationError::TypeConflict {
                key,
                provided,
                node,
                expected,
            } => {
                write!(
                    f,
                    "Type conflict on '{}': produced as {} but node '{}' expects {}",
                    key, provided, node, expected
                )
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Errors that can occur while resolving a goal key into an execution order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// No node in the pool provides the requested key
    NoProducer {
        /// The key with no producer
        key: String,
    },
    /// More than one node provides the requested key
    AmbiguousProducer {
        /// The key with competing producers
        key: String,
        /// The names of all competing producers, sorted
        producers: Vec<String>,
    },
    /// The backward walk revisited a node still being resolved
    Cycle {
        /// The cycle path showing the circular dependency
        cycle: Vec<String>,
    },
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::NoProducer { key } => {
                write!(f, "No producer for key '{}'", key)
            }
            ResolveError::AmbiguousProducer { key, producers } => {
                write!(
                    f,
                    "Ambiguous producer for key '{}': provided by {}",
                    key,
                    producers
                        .iter()
                        .map(|p| format!("'{}'", p))
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            }
            ResolveError::Cycle { cycle } => {
                write!(f, "Cycle detected: {}", cycle.join(" -> "))
            }
        }
    }
}

impl std::error::Error for ResolveError {}
