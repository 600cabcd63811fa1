//! Merge command implementation.

use docsync_core::{MergePolicy, PartitionData, Snapshot};
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Merge result.
#[derive(Debug, Serialize)]
pub struct MergeResult {
    /// Policy used.
    pub policy: String,
    /// Collections named by the incoming data.
    pub incoming_collections: Vec<String>,
    /// Incoming collections that were empty and left previous data in place.
    pub kept: Vec<String>,
    /// The merged snapshot.
    pub snapshot: Snapshot,
}

/// Runs the merge command.
pub fn run(
    previous: &Path,
    incoming: &Path,
    policy: &str,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let previous: Snapshot = serde_json::from_slice(&fs::read(previous)?)?;
    let incoming: PartitionData = serde_json::from_slice(&fs::read(incoming)?)?;
    let policy: MergePolicy = policy.parse()?;

    let result = merge(&previous, &incoming, policy);

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => print_text_output(&result),
    }

    Ok(())
}

/// Merges and records which collections survived an empty read.
pub fn merge(previous: &Snapshot, incoming: &PartitionData, policy: MergePolicy) -> MergeResult {
    let snapshot = policy.merge(previous, incoming);
    let kept = incoming
        .iter()
        .filter(|(name, value)| value.is_empty() && snapshot.collection(name).is_some_and(|c| !c.is_empty()))
        .map(|(name, _)| name.clone())
        .collect();

    MergeResult {
        policy: policy.to_string(),
        incoming_collections: incoming.keys().cloned().collect(),
        kept,
        snapshot,
    }
}

fn print_text_output(result: &MergeResult) {
    println!("DocSync Merge");
    println!("=============");
    println!("Policy: {}", result.policy);
    println!("Incoming: {}", result.incoming_collections.join(", "));
    if !result.kept.is_empty() {
        println!("Kept on empty read: {}", result.kept.join(", "));
    }
    println!();
    super::print_snapshot(&result.snapshot);
}
