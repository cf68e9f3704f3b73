// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod plan;
mod resolver;
mod validation;

pub use plan::ExecutionPlan;
pub use resolver::resolve;
pub use validation::{validate, INITIAL_PRODUCER};
