// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Demo driver: runs a sample feature/train/evaluate pipeline from a YAML
//! run configuration.

use std::collections::HashMap;
use std::env;
use std::process;

use serde_json::json;

use keyflow::config::{load_config, RuntimeBuilder};
use keyflow::context::ValueType;
use keyflow::traits::{FnNode, NodeContract, NodeSet};

/// A small ML-flavored node pool so the engine has something to chew on.
///
/// `config.seed` comes from the run configuration's `initial` block; enable
/// the `metrics.` namespace to pull `summarize` after both metric producers.
fn demo_nodes() -> NodeSet {
    let mut nodes = NodeSet::new();

    nodes.insert(FnNode::new(
        "extract",
        NodeContract::new()
            .require("config.seed", ValueType::Int)
            .provide("features.raw", ValueType::List),
        |ctx| {
            let seed = ctx.get("config.seed")?.as_i64().unwrap_or(0);
            Ok(HashMap::from([(
                "features.raw".to_string(),
                json!([seed, seed * 2, seed * 3]),
            )]))
        },
    ));

    nodes.insert(FnNode::new(
        "train",
        NodeContract::new()
            .require("features.raw", ValueType::List)
            .provide("model.path", ValueType::Text)
            .provide("metrics.loss", ValueType::Float),
        |ctx| {
            let features = ctx.get("features.raw")?;
            let count = features.as_array().map(Vec::len).unwrap_or(0);
            Ok(HashMap::from([
                ("model.path".to_string(), json!("models/demo.bin")),
                ("metrics.loss".to_string(), json!(1.0 / (count as f64 + 1.0))),
            ]))
        },
    ));

    nodes.insert(FnNode::new(
        "evaluate",
        NodeContract::new()
            .require("model.path", ValueType::Text)
            .provide("metrics.accuracy", ValueType::Float),
        |_| {
            Ok(HashMap::from([(
                "metrics.accuracy".to_string(),
                json!(0.93),
            )]))
        },
    ));

    nodes.insert(FnNode::new(
        "summarize",
        NodeContract::new()
            .consume("metrics.")
            .provide("report.summary", ValueType::Text),
        |ctx| {
            let metrics = ctx.get_namespace("metrics.").unwrap_or_default();
            let rendered: Vec<String> = metrics
                .iter()
                .map(|(key, value)| format!("{}={}", key, value))
                .collect();
            Ok(HashMap::from([(
                "report.summary".to_string(),
                json!(rendered.join(", ")),
            )]))
        },
    ));

    nodes
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        eprintln!("Usage: {} <run.yaml>", args[0]);
        eprintln!("Example: {} configs/demo-run.yaml", args[0]);
        process::exit(1);
    }

    if let Err(err) = run(&args[1]).await {
        eprintln!("Run failed: {}", err);
        process::exit(1);
    }
}

async fn run(config_file: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_file)?;
    let runtime = RuntimeBuilder::from_config(&config)?;
    let nodes = demo_nodes();

    println!("Goal: {}", runtime.goal());
    println!("Failure policy: {:?}", runtime.policy());

    println!("\nDry run:");
    for entry in runtime.dry_run(&nodes).await? {
        println!("  {:<12} {:?}", entry.node, entry.status);
    }

    let report = runtime.run(&nodes).await?;

    println!("\nRun report:");
    println!("{}", serde_json::to_string_pretty(&report)?);

    println!("\nFinal context:");
    for (key, value) in runtime.context().snapshot() {
        println!("  {} = {}", key, value);
    }
    Ok(())
}
