// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Static validation of a node set against an initial context schema.
//!
//! Validation is purely static — no node runs — and follows a staged
//! pipeline so a misconfigured graph reports every problem at once:
//!
//! 1. **Uniqueness**: node names are unique within the set
//! 2. **Collisions**: no key is provided by two nodes (or by a node and the
//!    initial context)
//! 3. **Satisfiability**: every `requires` key is in the union of initial
//!    keys and all `provides` keys
//! 4. **Type consistency**: a key's declared `provides` type matches every
//!    `requires` declaration of that key
//!
//! Validation must be re-run whenever the node set or initial keys change;
//! node sets can differ per invocation so nothing here is memoized.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::context::ValueType;
use crate::errors::ValidationError;
use crate::traits::NodeSet;

/// Producer name reported when the initial context already holds a key.
pub const INITIAL_PRODUCER: &str = "<initial>";

/// Validates a node set against the keys (and types) seeded into the
/// initial context.
///
/// Returns every validation error found. Cycle detection is not performed
/// here — ordering is the resolver/planner's concern — but a set that passes
/// validation is guaranteed to have a unique producer for every key it
/// mentions.
pub fn validate(
    nodes: &NodeSet,
    initial: &BTreeMap<String, ValueType>,
) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(duplicate_errors) = validate_unique_node_names(nodes) {
        errors.extend(duplicate_errors);
    }

    if let Err(collision_errors) = validate_provides_collisions(nodes, initial) {
        errors.extend(collision_errors);
    }

    if let Err(requirement_errors) = validate_requirements(nodes, initial) {
        errors.extend(requirement_errors);
    }

    if let Err(type_errors) = validate_types(nodes, initial) {
        errors.extend(type_errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Node names serve as the primary key for result tracking, cache entries,
/// and error reporting, so duplicates are rejected up front.
fn validate_unique_node_names(nodes: &NodeSet) -> Result<(), Vec<ValidationError>> {
    let mut seen = HashSet::new();
    let mut errors = Vec::new();

    for node in nodes.iter() {
        if !seen.insert(node.name().to_string()) {
            errors.push(ValidationError::DuplicateNodeName {
                node: node.name().to_string(),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Two producers for the same key would make the final context state depend
/// on execution order, so collisions are a build-time error rather than a
/// runtime race. The initial context counts as a producer.
fn validate_provides_collisions(
    nodes: &NodeSet,
    initial: &BTreeMap<String, ValueType>,
) -> Result<(), Vec<ValidationError>> {
    let mut producer_of: HashMap<&str, &str> = initial
        .keys()
        .map(|key| (key.as_str(), INITIAL_PRODUCER))
        .collect();
    let mut errors = Vec::new();

    for node in nodes.iter() {
        for key in node.contract().provides.keys() {
            match producer_of.get(key.as_str()) {
                Some(first) => {
                    errors.push(ValidationError::KeyCollision {
                        key: key.clone(),
                        first: first.to_string(),
                        second: node.name().to_string(),
                    });
                }
                None => {
                    producer_of.insert(key.as_str(), node.name());
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_requirements(
    nodes: &NodeSet,
    initial: &BTreeMap<String, ValueType>,
) -> Result<(), Vec<ValidationError>> {
    // Everything any run of this set could ever produce
    let mut producible: HashSet<&str> = initial.keys().map(String::as_str).collect();
    for node in nodes.iter() {
        producible.extend(node.contract().provides.keys().map(String::as_str));
    }

    let mut errors = Vec::new();
    for node in nodes.iter() {
        for key in node.contract().requires.keys() {
            if !producible.contains(key.as_str()) {
                errors.push(ValidationError::UnsatisfiedRequirement {
                    node: node.name().to_string(),
                    key: key.clone(),
                });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Where both sides declare a type for a key, they must agree. Keys whose
/// producer is unknown are already reported by the satisfiability check.
fn validate_types(
    nodes: &NodeSet,
    initial: &BTreeMap<String, ValueType>,
) -> Result<(), Vec<ValidationError>> {
    let mut produced_type: HashMap<&str, ValueType> = initial
        .iter()
        .map(|(key, ty)| (key.as_str(), *ty))
        .collect();
    for node in nodes.iter() {
        for (key, ty) in &node.contract().provides {
            produced_type.entry(key.as_str()).or_insert(*ty);
        }
    }

    let mut errors = Vec::new();
    for node in nodes.iter() {
        for (key, expected) in &node.contract().requires {
            if let Some(provided) = produced_type.get(key.as_str()) {
                if provided != expected {
                    errors.push(ValidationError::TypeConflict {
                        key: key.clone(),
                        provided: *provided,
                        node: node.name().to_string(),
                        expected: *expected,
                    });
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{FnNode, NodeContract};
    use std::collections::HashMap as StdHashMap;

    fn node(name: &str, contract: NodeContract) -> FnNode {
        FnNode::new(name, contract, |_| Ok(StdHashMap::new()))
    }

    fn no_initial() -> BTreeMap<String, ValueType> {
        BTreeMap::new()
    }

    #[test]
    fn valid_chain_passes() {
        let mut nodes = NodeSet::new();
        nodes.insert(node(
            "extract",
            NodeContract::new().provide("features.raw", ValueType::List),
        ));
        nodes.insert(node(
            "train",
            NodeContract::new()
                .require("features.raw", ValueType::List)
                .provide("model.path", ValueType::Text),
        ));

        assert!(validate(&nodes, &no_initial()).is_ok());
    }

    #[test]
    fn two_producers_for_one_key_fail_regardless_of_order() {
        for flipped in [false, true] {
            let c = node("C", NodeContract::new().provide("z", ValueType::Int));
            let d = node("D", NodeContract::new().provide("z", ValueType::Int));
            let mut nodes = NodeSet::new();
            if flipped {
                nodes.insert(d);
                nodes.insert(c);
            } else {
                nodes.insert(c);
                nodes.insert(d);
            }

            let errors = validate(&nodes, &no_initial()).unwrap_err();
            assert_eq!(errors.len(), 1);
            match &errors[0] {
                ValidationError::KeyCollision { key, first, second } => {
                    assert_eq!(key, "z");
                    let mut producers = vec![first.clone(), second.clone()];
                    producers.sort();
                    assert_eq!(producers, vec!["C", "D"]);
                }
                other => panic!("Expected KeyCollision, got {:?}", other),
            }
        }
    }

    #[test]
    fn initial_key_collides_with_node_provides() {
        let mut nodes = NodeSet::new();
        nodes.insert(node(
            "seed",
            NodeContract::new().provide("config.seed", ValueType::Int),
        ));
        let initial = BTreeMap::from([("config.seed".to_string(), ValueType::Int)]);

        let errors = validate(&nodes, &initial).unwrap_err();
        assert!(matches!(
            &errors[0],
            ValidationError::KeyCollision { key, first, .. }
                if key == "config.seed" && first == INITIAL_PRODUCER
        ));
    }

    #[test]
    fn unsatisfied_requirement_names_node_and_key() {
        let mut nodes = NodeSet::new();
        nodes.insert(node(
            "train",
            NodeContract::new().require("features.raw", ValueType::List),
        ));

        let errors = validate(&nodes, &no_initial()).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::UnsatisfiedRequirement {
                node: "train".to_string(),
                key: "features.raw".to_string(),
            }]
        );
    }

    #[test]
    fn duplicate_node_names_are_reported() {
        let mut nodes = NodeSet::new();
        nodes.insert(node("dup", NodeContract::new()));
        nodes.insert(node("dup", NodeContract::new()));

        let errors = validate(&nodes, &no_initial()).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::DuplicateNodeName { node } if node == "dup")));
    }

    #[test]
    fn type_conflict_between_provider_and_consumer() {
        let mut nodes = NodeSet::new();
        nodes.insert(node(
            "extract",
            NodeContract::new().provide("features.raw", ValueType::List),
        ));
        nodes.insert(node(
            "train",
            NodeContract::new().require("features.raw", ValueType::Text),
        ));

        let errors = validate(&nodes, &no_initial()).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::TypeConflict {
                key: "features.raw".to_string(),
                provided: ValueType::List,
                node: "train".to_string(),
                expected: ValueType::Text,
            }]
        );
    }

    #[test]
    fn multiple_errors_accumulate() {
        let mut nodes = NodeSet::new();
        nodes.insert(node("a", NodeContract::new().provide("x", ValueType::Int)));
        nodes.insert(node("b", NodeContract::new().provide("x", ValueType::Int)));
        nodes.insert(node("c", NodeContract::new().require("y", ValueType::Int)));

        let errors = validate(&nodes, &no_initial()).unwrap_err();
        assert_eq!(errors.len(), 2);
    }
}
