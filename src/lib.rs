// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod cache;      // content-addressed node cache
pub mod config;     // run configuration + runtime builder
pub mod context;    // shared write-once key/value store
pub mod engine;     // staged executor + run reports
pub mod errors;     // error handling
pub mod graph;      // validator, resolver, execution plan
pub mod pipeline;   // validate-then-execute facade
pub mod traits;     // unified abstractions
