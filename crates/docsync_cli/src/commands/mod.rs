//! CLI command implementations.

pub mod merge;
pub mod replay;

use docsync_core::Snapshot;

/// Prints one line per collection of a snapshot.
pub(crate) fn print_snapshot(snapshot: &Snapshot) {
    println!("Partition: {}", snapshot.partition);
    if snapshot.collections.is_empty() {
        println!("  (empty)");
    }
    for (name, collection) in &snapshot.collections {
        println!("  {name} ({}, {} items)", collection.kind(), collection.len());
        if let Some(items) = collection.as_list() {
            for entity in items {
                match entity.created_at {
                    Some(created) => println!("    - {} @ {created}", entity.id),
                    None => println!("    - {} (pending)", entity.id),
                }
            }
        }
        if let Some(settings) = collection.as_settings() {
            for (key, value) in settings {
                println!("    {key} = {value}");
            }
        }
    }
}
