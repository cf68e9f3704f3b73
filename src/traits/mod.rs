// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod executor;
pub mod node;

pub use executor::PipelineExecutor;
pub use node::{FnNode, Node, NodeContract, NodeSet};
