// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Plan execution: the staged executor, run reports, and dry-run prediction.

pub mod dry_run;
pub mod report;
pub mod staged;

pub use dry_run::{dry_run, DryRunEntry, DryRunStatus};
pub use report::{NodeReport, NodeStatus, RunReport};
pub use staged::StagedExecutor;

#[cfg(test)]
mod integration_tests;
