//! Replay command implementation.
//!
//! A script seeds an in-memory store, initializes the engine and then runs
//! a list of steps. Each step records whether it succeeded, so a failing
//! write or fetch is part of the output rather than an abort.

use docsync_core::{Entity, EntityId, PartitionKey, Snapshot};
use docsync_engine::{
    EngineConfig, EngineStats, MemoryRemoteStore, StoreOp, SyncEngine, SyncError, WriteMode,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

/// A replay script.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Script {
    /// Engine configuration.
    pub config: EngineConfig,
    /// Store contents before the engine starts.
    #[serde(default)]
    pub seed: Vec<SeedCollection>,
    /// Partitions to initialize.
    pub partitions: Vec<PartitionKey>,
    /// Steps to run after initialization.
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// Documents of one collection to seed.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedCollection {
    /// Partition.
    pub partition: PartitionKey,
    /// Collection name.
    pub collection: String,
    /// Entities, stored as-is.
    #[serde(default)]
    pub entities: Vec<Entity>,
}

/// One scripted step.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum Step {
    /// Write an entity through the engine.
    Upsert {
        /// Partition.
        partition: PartitionKey,
        /// Collection name.
        collection: String,
        /// Entity to write.
        entity: Entity,
    },
    /// Delete an entity through the engine.
    Delete {
        /// Partition.
        partition: PartitionKey,
        /// Collection name.
        collection: String,
        /// Entity id.
        id: EntityId,
    },
    /// Change the store behind the engine's back.
    Remote {
        /// Partition.
        partition: PartitionKey,
        /// Collection name.
        collection: String,
        /// Entities to store.
        entities: Vec<Entity>,
    },
    /// Re-fetch a partition.
    Refresh {
        /// Partition.
        partition: PartitionKey,
    },
    /// Drop a partition.
    Teardown {
        /// Partition.
        partition: PartitionKey,
    },
    /// Toggle store availability.
    Offline {
        /// True to fail every store call.
        offline: bool,
    },
    /// Toggle empty successful reads.
    StaleReads {
        /// True to return no documents.
        stale: bool,
    },
    /// Fail the next write with a transient error.
    FailNextWrite,
}

impl Step {
    fn name(&self) -> &'static str {
        match self {
            Step::Upsert { .. } => "upsert",
            Step::Delete { .. } => "delete",
            Step::Remote { .. } => "remote",
            Step::Refresh { .. } => "refresh",
            Step::Teardown { .. } => "teardown",
            Step::Offline { .. } => "offline",
            Step::StaleReads { .. } => "stale-reads",
            Step::FailNextWrite => "fail-next-write",
        }
    }
}

/// Outcome of one step.
#[derive(Debug, Serialize)]
pub struct StepResult {
    /// Step number, from 1.
    pub step: usize,
    /// Step name.
    pub op: &'static str,
    /// Error message, if the step failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Replay result.
#[derive(Debug, Serialize)]
pub struct ReplayResult {
    /// Initialization errors by partition.
    pub initialize_errors: Vec<String>,
    /// Step outcomes.
    pub steps: Vec<StepResult>,
    /// Final snapshots of the scripted partitions.
    pub snapshots: Vec<Snapshot>,
    /// Engine statistics.
    pub stats: EngineStats,
}

/// Runs the replay command.
pub fn run(script: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let script: Script = serde_json::from_slice(&fs::read(script)?)?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(replay(script))?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => print_text_output(&result),
    }

    Ok(())
}

/// Runs a script to completion.
pub async fn replay(script: Script) -> Result<ReplayResult, SyncError> {
    let store = MemoryRemoteStore::new();
    for seed in &script.seed {
        store.seed(&seed.partition, &seed.collection, seed.entities.iter().cloned());
    }
    for partition in &script.partitions {
        store.create_partition(partition);
    }

    let engine = SyncEngine::new(store.clone(), script.config)?;
    let initialize_errors = engine
        .initialize(script.partitions.iter().cloned())
        .await
        .into_iter()
        .filter_map(|outcome| outcome.error.map(|e| e.to_string()))
        .collect();

    let mut steps = Vec::with_capacity(script.steps.len());
    for (index, step) in script.steps.into_iter().enumerate() {
        let op = step.name();
        let error = run_step(&engine, &store, step).await.err().map(|e| e.to_string());
        info!(step = index + 1, op, ok = error.is_none(), "replayed step");
        steps.push(StepResult {
            step: index + 1,
            op,
            error,
        });
    }

    Ok(ReplayResult {
        initialize_errors,
        steps,
        snapshots: script
            .partitions
            .iter()
            .map(|p| engine.get_snapshot(p))
            .collect(),
        stats: engine.stats(),
    })
}

async fn run_step(
    engine: &SyncEngine<MemoryRemoteStore>,
    store: &MemoryRemoteStore,
    step: Step,
) -> Result<(), SyncError> {
    match step {
        Step::Upsert {
            partition,
            collection,
            entity,
        } => {
            engine
                .apply_local_write(&partition, &collection, entity, WriteMode::Upsert)
                .await
        }
        Step::Delete {
            partition,
            collection,
            id,
        } => {
            engine
                .apply_local_write(&partition, &collection, Entity::new(id), WriteMode::Delete)
                .await
        }
        Step::Remote {
            partition,
            collection,
            entities,
        } => {
            store.seed(&partition, &collection, entities);
            Ok(())
        }
        Step::Refresh { partition } => engine.refresh(&partition).await.map(|_| ()),
        Step::Teardown { partition } => {
            engine.teardown(&partition);
            Ok(())
        }
        Step::Offline { offline } => {
            store.set_offline(offline);
            Ok(())
        }
        Step::StaleReads { stale } => {
            store.set_stale_reads(stale);
            Ok(())
        }
        Step::FailNextWrite => {
            store.fail_next(StoreOp::Put, SyncError::transient("injected write failure"));
            Ok(())
        }
    }
}

fn print_text_output(result: &ReplayResult) {
    println!("DocSync Replay");
    println!("==============");
    for error in &result.initialize_errors {
        println!("Initialize failed: {error}");
    }
    for step in &result.steps {
        match &step.error {
            Some(error) => println!("  {:>3}. {:<16} FAILED: {error}", step.step, step.op),
            None => println!("  {:>3}. {:<16} ok", step.step, step.op),
        }
    }
    println!();
    for snapshot in &result.snapshots {
        super::print_snapshot(snapshot);
    }
    println!();
    println!(
        "Fetches: {} ok, {} failed; writes: {} confirmed, {} failed",
        result.stats.fetches_completed,
        result.stats.fetches_failed,
        result.stats.writes_confirmed,
        result.stats.writes_failed
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsync_testkit::prelude::*;
    use serde_json::json;

    fn script(steps: serde_json::Value) -> Script {
        serde_json::from_value(json!({
            "config": {
                "collections": [
                    {"name": "courses", "kind": "list"},
                    {"name": "theme", "kind": "settings"}
                ]
            },
            "seed": [
                {"partition": "en", "collection": "courses", "entities": [
                    {"id": "c1", "fields": {"title": "Logic"}}
                ]}
            ],
            "partitions": ["en"],
            "steps": steps
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn writes_and_stale_reads() {
        let result = replay(script(json!([
            {"op": "upsert", "partition": "en", "collection": "courses",
             "entity": {"id": "c2", "fields": {"title": "AI"}}},
            {"op": "stale-reads", "stale": true},
            {"op": "refresh", "partition": "en"}
        ])))
        .await
        .unwrap();

        assert!(result.initialize_errors.is_empty());
        assert!(result.steps.iter().all(|s| s.error.is_none()));
        assert_eq!(ids_of(&result.snapshots[0], "courses"), ["c1", "c2"]);
        assert_eq!(result.stats.writes_confirmed, 1);
    }

    #[tokio::test]
    async fn failures_are_recorded_per_step() {
        let result = replay(script(json!([
            {"op": "fail-next-write"},
            {"op": "upsert", "partition": "en", "collection": "courses",
             "entity": {"id": "c2", "fields": {"title": "AI"}}},
            {"op": "delete", "partition": "en", "collection": "theme", "id": "main"},
            {"op": "offline", "offline": true},
            {"op": "refresh", "partition": "en"}
        ])))
        .await
        .unwrap();

        let failed: Vec<&str> = result
            .steps
            .iter()
            .filter(|s| s.error.is_some())
            .map(|s| s.op)
            .collect();
        assert_eq!(failed, ["upsert", "delete", "refresh"]);
        assert_eq!(ids_of(&result.snapshots[0], "courses"), ["c1"]);
    }

    #[tokio::test]
    async fn teardown_empties_snapshot() {
        let result = replay(script(json!([
            {"op": "teardown", "partition": "en"}
        ])))
        .await
        .unwrap();
        assert!(result.snapshots[0].is_empty());
    }
}
