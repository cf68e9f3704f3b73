// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! End-to-end executor tests: resolve, plan, execute, cache, dry-run.

use serde_json::json;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{CacheError, CacheStore, CachedOutputs, Fingerprint, MemoryCache};
use crate::context::{Context, Value, ValueType};
use crate::engine::{dry_run, DryRunStatus, NodeStatus, StagedExecutor};
use crate::errors::{ExecutionError, FailurePolicy};
use crate::graph::{resolve, ExecutionPlan};
use crate::traits::{FnNode, Node, NodeContract, NodeSet, PipelineExecutor};

/// A node whose action tallies invocations; lets tests prove a cache hit
/// never reinvokes the action.
fn tracked(
    name: &str,
    contract: NodeContract,
    outputs: Vec<(String, Value)>,
) -> (Arc<dyn Node>, Arc<AtomicUsize>) {
    let counter = Arc::new(AtomicUsize::new(0));
    let tally = counter.clone();
    let node: Arc<dyn Node> = Arc::new(FnNode::new(name, contract, move |_| {
        tally.fetch_add(1, Ordering::SeqCst);
        Ok(outputs.iter().cloned().collect())
    }));
    (node, counter)
}

fn failing(name: &str, contract: NodeContract, message: &str) -> Arc<dyn Node> {
    let message = message.to_string();
    Arc::new(FnNode::new(name, contract, move |_| {
        Err(anyhow::anyhow!("{}", message))
    }))
}

/// extract -> train -> evaluate, seeded by config.seed.
fn chain() -> (NodeSet, Vec<Arc<AtomicUsize>>) {
    let (extract, c1) = tracked(
        "extract",
        NodeContract::new()
            .require("config.seed", ValueType::Int)
            .provide("features.raw", ValueType::List),
        vec![("features.raw".to_string(), json!([1, 2, 3]))],
    );
    let (train, c2) = tracked(
        "train",
        NodeContract::new()
            .require("features.raw", ValueType::List)
            .provide("model.path", ValueType::Text),
        vec![("model.path".to_string(), json!("model.bin"))],
    );
    let (evaluate, c3) = tracked(
        "evaluate",
        NodeContract::new()
            .require("model.path", ValueType::Text)
            .provide("metrics.accuracy", ValueType::Float),
        vec![("metrics.accuracy".to_string(), json!(0.93))],
    );

    let mut pool = NodeSet::new();
    pool.push(extract);
    pool.push(train);
    pool.push(evaluate);
    (pool, vec![c1, c2, c3])
}

fn plan_for(goal: &str, pool: &NodeSet, initial: &BTreeSet<String>) -> ExecutionPlan {
    let order = resolve(goal, pool, initial, &BTreeSet::new()).unwrap();
    ExecutionPlan::build(&order, initial, BTreeSet::new()).unwrap()
}

fn seeded_context(seed: i64) -> Arc<Context> {
    Arc::new(
        Context::seeded(vec![("config.seed".to_string(), json!(seed))]).unwrap(),
    )
}

#[tokio::test]
async fn chain_runs_to_completion() {
    let (pool, _) = chain();
    let initial = BTreeSet::from(["config.seed".to_string()]);
    let plan = plan_for("metrics.accuracy", &pool, &initial);

    let context = seeded_context(7);
    let cache: Arc<dyn CacheStore> = Arc::new(MemoryCache::new());
    let report = StagedExecutor::new(4)
        .execute(&plan, context.clone(), cache)
        .await
        .unwrap();

    assert!(report.is_success());
    assert_eq!(report.status("extract"), Some(NodeStatus::Done));
    assert_eq!(report.status("evaluate"), Some(NodeStatus::Done));
    assert_eq!(context.get("metrics.accuracy").unwrap(), json!(0.93));
    assert_eq!(context.len(), 4);
}

#[tokio::test]
async fn second_run_is_served_entirely_from_cache() {
    let (pool, counters) = chain();
    let initial = BTreeSet::from(["config.seed".to_string()]);
    let plan = plan_for("metrics.accuracy", &pool, &initial);
    let cache: Arc<dyn CacheStore> = Arc::new(MemoryCache::new());
    let executor = StagedExecutor::new(4);

    let first = executor
        .execute(&plan, seeded_context(7), cache.clone())
        .await
        .unwrap();
    assert!(first.is_success());
    let tallies: Vec<usize> = counters.iter().map(|c| c.load(Ordering::SeqCst)).collect();
    assert_eq!(tallies, vec![1, 1, 1]);

    let context = seeded_context(7);
    let second = executor
        .execute(&plan, context.clone(), cache)
        .await
        .unwrap();
    assert!(second.is_success());
    for name in ["extract", "train", "evaluate"] {
        assert_eq!(second.status(name), Some(NodeStatus::CacheHit));
    }
    // Actions were never reinvoked
    let tallies: Vec<usize> = counters.iter().map(|c| c.load(Ordering::SeqCst)).collect();
    assert_eq!(tallies, vec![1, 1, 1]);
    // Cached outputs still land in the context
    assert_eq!(context.get("metrics.accuracy").unwrap(), json!(0.93));
}

#[tokio::test]
async fn changed_seed_invalidates_the_cache() {
    let (pool, counters) = chain();
    let initial = BTreeSet::from(["config.seed".to_string()]);
    let plan = plan_for("metrics.accuracy", &pool, &initial);
    let cache: Arc<dyn CacheStore> = Arc::new(MemoryCache::new());
    let executor = StagedExecutor::new(4);

    executor
        .execute(&plan, seeded_context(7), cache.clone())
        .await
        .unwrap();
    executor
        .execute(&plan, seeded_context(8), cache)
        .await
        .unwrap();

    // The seed feeds extract's fingerprint, so extract reran
    assert_eq!(counters[0].load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn fail_fast_skips_everything_downstream() {
    let ordered: Vec<Arc<dyn Node>> = vec![
        failing(
            "extract",
            NodeContract::new().provide("features.raw", ValueType::List),
            "source unreachable",
        ),
        tracked(
            "train",
            NodeContract::new()
                .require("features.raw", ValueType::List)
                .provide("model.path", ValueType::Text),
            vec![("model.path".to_string(), json!("model.bin"))],
        )
        .0,
        tracked(
            "evaluate",
            NodeContract::new()
                .require("model.path", ValueType::Text)
                .provide("metrics.accuracy", ValueType::Float),
            vec![("metrics.accuracy".to_string(), json!(0.5))],
        )
        .0,
    ];
    let plan = ExecutionPlan::build(&ordered, &BTreeSet::new(), BTreeSet::new()).unwrap();

    let err = StagedExecutor::new(4)
        .execute(&plan, Arc::new(Context::new()), Arc::new(MemoryCache::new()))
        .await
        .unwrap_err();

    let report = match err {
        ExecutionError::RunFailed { report } => report,
        other => panic!("expected RunFailed, got {}", other),
    };
    assert_eq!(report.status("extract"), Some(NodeStatus::Failed));
    assert_eq!(report.status("train"), Some(NodeStatus::Skipped));
    assert_eq!(report.status("evaluate"), Some(NodeStatus::Skipped));
    assert!(report.nodes()["extract"]
        .error
        .as_deref()
        .unwrap()
        .contains("source unreachable"));
}

#[tokio::test]
async fn best_effort_completes_independent_branches() {
    let (good_extract, _) = tracked(
        "good_extract",
        NodeContract::new().provide("good.raw", ValueType::List),
        vec![("good.raw".to_string(), json!([1]))],
    );
    let (good_train, _) = tracked(
        "good_train",
        NodeContract::new()
            .require("good.raw", ValueType::List)
            .provide("good.model", ValueType::Text),
        vec![("good.model".to_string(), json!("g.bin"))],
    );
    let (bad_train, bad_tally) = tracked(
        "bad_train",
        NodeContract::new()
            .require("bad.raw", ValueType::List)
            .provide("bad.model", ValueType::Text),
        vec![("bad.model".to_string(), json!("b.bin"))],
    );
    let ordered: Vec<Arc<dyn Node>> = vec![
        failing(
            "bad_extract",
            NodeContract::new().provide("bad.raw", ValueType::List),
            "boom",
        ),
        good_extract,
        bad_train,
        good_train,
    ];
    let plan = ExecutionPlan::build(&ordered, &BTreeSet::new(), BTreeSet::new()).unwrap();

    let context = Arc::new(Context::new());
    let err = StagedExecutor::new(4)
        .execute_with_policy(
            &plan,
            context.clone(),
            Arc::new(MemoryCache::new()),
            FailurePolicy::BestEffort,
        )
        .await
        .unwrap_err();

    let report = match err {
        ExecutionError::RunFailed { report } => report,
        other => panic!("expected RunFailed, got {}", other),
    };
    assert_eq!(report.status("bad_extract"), Some(NodeStatus::Failed));
    assert_eq!(report.status("bad_train"), Some(NodeStatus::Skipped));
    assert_eq!(report.status("good_extract"), Some(NodeStatus::Done));
    assert_eq!(report.status("good_train"), Some(NodeStatus::Done));
    assert_eq!(bad_tally.load(Ordering::SeqCst), 0);
    assert_eq!(context.get("good.model").unwrap(), json!("g.bin"));
}

#[tokio::test]
async fn overrunning_node_is_reported_as_timed_out() {
    #[derive(Debug)]
    struct SlowNode {
        contract: NodeContract,
    }

    #[async_trait::async_trait]
    impl Node for SlowNode {
        fn name(&self) -> &str {
            "slow"
        }
        fn contract(&self) -> &NodeContract {
            &self.contract
        }
        async fn run(&self, _context: &Context) -> anyhow::Result<HashMap<String, Value>> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(HashMap::from([("slow.out".to_string(), json!(1))]))
        }
    }

    let ordered: Vec<Arc<dyn Node>> = vec![Arc::new(SlowNode {
        contract: NodeContract::new().provide("slow.out", ValueType::Int),
    })];
    let plan = ExecutionPlan::build(&ordered, &BTreeSet::new(), BTreeSet::new()).unwrap();

    let err = StagedExecutor::new(1)
        .with_timeout(Duration::from_millis(20))
        .execute(&plan, Arc::new(Context::new()), Arc::new(MemoryCache::new()))
        .await
        .unwrap_err();

    let report = match err {
        ExecutionError::RunFailed { report } => report,
        other => panic!("expected RunFailed, got {}", other),
    };
    assert_eq!(report.status("slow"), Some(NodeStatus::Failed));
    assert!(report.nodes()["slow"]
        .error
        .as_deref()
        .unwrap()
        .contains("timed out"));
}

#[tokio::test]
async fn unavailable_cache_backend_degrades_to_miss() {
    #[derive(Debug)]
    struct DownCache;

    #[async_trait::async_trait]
    impl CacheStore for DownCache {
        async fn get(
            &self,
            _node: &str,
            _fingerprint: &Fingerprint,
        ) -> Result<Option<CachedOutputs>, CacheError> {
            Err(CacheError::Unavailable("backend offline".to_string()))
        }

        async fn put(
            &self,
            _node: &str,
            _fingerprint: &Fingerprint,
            _outputs: &CachedOutputs,
        ) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("backend offline".to_string()))
        }
    }

    let (pool, counters) = chain();
    let initial = BTreeSet::from(["config.seed".to_string()]);
    let plan = plan_for("metrics.accuracy", &pool, &initial);

    let context = seeded_context(7);
    let report = StagedExecutor::new(4)
        .execute(&plan, context.clone(), Arc::new(DownCache))
        .await
        .unwrap();

    // Backend errors are never fatal: the run completes as if every lookup missed
    assert!(report.is_success());
    for name in ["extract", "train", "evaluate"] {
        assert_eq!(report.status(name), Some(NodeStatus::Done));
    }
    let tallies: Vec<usize> = counters.iter().map(|c| c.load(Ordering::SeqCst)).collect();
    assert_eq!(tallies, vec![1, 1, 1]);
    assert_eq!(context.get("metrics.accuracy").unwrap(), json!(0.93));
}

#[tokio::test]
async fn failed_context_write_leaves_no_cache_entry() {
    let (node, _) = tracked(
        "emit",
        NodeContract::new().provide("dup.key", ValueType::Int),
        vec![("dup.key".to_string(), json!(1))],
    );
    let plan = ExecutionPlan::build(&[node], &BTreeSet::new(), BTreeSet::new()).unwrap();

    // The key already holds a value, so the write-once rule fires after the
    // action has produced its outputs
    let context = Arc::new(Context::new());
    context.set("dup.key", json!(0)).unwrap();
    let cache = Arc::new(MemoryCache::new());

    let err = StagedExecutor::new(1)
        .execute(&plan, context, cache.clone())
        .await
        .unwrap_err();

    let report = match err {
        ExecutionError::RunFailed { report } => report,
        other => panic!("expected RunFailed, got {}", other),
    };
    assert_eq!(report.status("emit"), Some(NodeStatus::Failed));
    // Nothing was persisted for the failed node
    assert!(cache.is_empty());
}

#[tokio::test]
async fn undeclared_output_fails_the_node() {
    let sneaky: Arc<dyn Node> = Arc::new(FnNode::new(
        "sneaky",
        NodeContract::new().provide("a.out", ValueType::Int),
        |_| {
            Ok(HashMap::from([
                ("a.out".to_string(), json!(1)),
                ("b.out".to_string(), json!(2)),
            ]))
        },
    ));
    let plan =
        ExecutionPlan::build(&[sneaky], &BTreeSet::new(), BTreeSet::new()).unwrap();

    let context = Arc::new(Context::new());
    let err = StagedExecutor::new(1)
        .execute(&plan, context.clone(), Arc::new(MemoryCache::new()))
        .await
        .unwrap_err();

    let report = match err {
        ExecutionError::RunFailed { report } => report,
        other => panic!("expected RunFailed, got {}", other),
    };
    assert!(report.nodes()["sneaky"]
        .error
        .as_deref()
        .unwrap()
        .contains("never declared"));
    // Nothing was written to the context
    assert!(context.is_empty());
}

#[tokio::test]
async fn mistyped_output_fails_the_node() {
    let wrong: Arc<dyn Node> = Arc::new(FnNode::new(
        "wrong",
        NodeContract::new().provide("a.out", ValueType::Int),
        |_| Ok(HashMap::from([("a.out".to_string(), json!("not an int"))])),
    ));
    let plan = ExecutionPlan::build(&[wrong], &BTreeSet::new(), BTreeSet::new()).unwrap();

    let err = StagedExecutor::new(1)
        .execute(&plan, Arc::new(Context::new()), Arc::new(MemoryCache::new()))
        .await
        .unwrap_err();

    let report = match err {
        ExecutionError::RunFailed { report } => report,
        other => panic!("expected RunFailed, got {}", other),
    };
    assert!(report.nodes()["wrong"]
        .error
        .as_deref()
        .unwrap()
        .contains("declared it as int"));
}

#[tokio::test]
async fn dry_run_predicts_hits_and_poisons_downstream() {
    let (pool, _) = chain();
    let initial = BTreeSet::from(["config.seed".to_string()]);
    let plan = plan_for("metrics.accuracy", &pool, &initial);
    let cache = Arc::new(MemoryCache::new());

    // Nothing cached yet: everything would run
    let cold = dry_run(&plan, &seeded_context(7), cache.as_ref()).await;
    assert!(cold.iter().all(|entry| entry.status == DryRunStatus::WillRun));

    StagedExecutor::new(4)
        .execute(&plan, seeded_context(7), cache.clone())
        .await
        .unwrap();

    // Same seed: the whole chain would be restored from cache
    let warm = dry_run(&plan, &seeded_context(7), cache.as_ref()).await;
    assert!(warm.iter().all(|entry| entry.status == DryRunStatus::Cached));
    assert_eq!(warm[0].node, "extract");

    // A different seed misses at extract; its outputs are then unknowable,
    // so the prediction stays conservative all the way down
    let shifted = dry_run(&plan, &seeded_context(8), cache.as_ref()).await;
    assert!(shifted
        .iter()
        .all(|entry| entry.status == DryRunStatus::WillRun));
}

#[tokio::test]
async fn empty_plan_succeeds_trivially() {
    let plan = ExecutionPlan::build(&[], &BTreeSet::new(), BTreeSet::new()).unwrap();
    let report = StagedExecutor::new(1)
        .execute(&plan, Arc::new(Context::new()), Arc::new(MemoryCache::new()))
        .await
        .unwrap();
    assert!(report.is_success());
    assert!(report.nodes().is_empty());
}
