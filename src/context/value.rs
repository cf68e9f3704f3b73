// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fmt;

/// The artifact type stored under every context key.
///
/// Values are `serde_json::Value` so they can be fingerprinted and persisted
/// by the cache without a bespoke serialization layer.
pub use serde_json::Value;

/// Coarse classification of a [`Value`], used for static type checking of
/// node contracts before anything runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Null,
    Bool,
    Int,
    Float,
    Text,
    List,
    Map,
}

impl ValueType {
    /// Classify a concrete value.
    pub fn of(value: &Value) -> ValueType {
        match value {
            Value::Null => ValueType::Null,
            Value::Bool(_) => ValueType::Bool,
            Value::Number(n) => {
                if n.is_i64() || n.is_u64() {
                    ValueType::Int
                } else {
                    ValueType::Float
                }
            }
            Value::String(_) => ValueType::Text,
            Value::Array(_) => ValueType::List,
            Value::Object(_) => ValueType::Map,
        }
    }

    /// Whether a concrete value conforms to this declared type.
    pub fn matches(&self, value: &Value) -> bool {
        ValueType::of(value) == *self
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::Null => "null",
            ValueType::Bool => "bool",
            ValueType::Int => "int",
            ValueType::Float => "float",
            ValueType::Text => "text",
            ValueType::List => "list",
            ValueType::Map => "map",
        };
        write!(f, "{}", name)
    }
}
