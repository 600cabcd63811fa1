//! Property tests for the merge rules.

use docsync_core::{Collection, MergePolicy, PartitionData, Snapshot};
use docsync_testkit::prelude::*;
use proptest::prelude::*;

fn apply_writes(mut snapshot: Snapshot, writes: &[WriteOperation]) -> Snapshot {
    for write in writes {
        snapshot = match write {
            WriteOperation::Upsert(entity) => {
                MergePolicy::upsert(&snapshot, "courses", entity.clone()).unwrap()
            }
            WriteOperation::Delete(id) => MergePolicy::remove(&snapshot, "courses", id).unwrap(),
        };
    }
    snapshot
}

proptest! {
    #![proptest_config(PropTestConfig::default().to_proptest_config())]

    #[test]
    fn empty_or_absent_never_regresses(previous in snapshot_strategy(), incoming in partition_data_strategy()) {
        let merged = MergePolicy::KeepPopulated.merge(&previous, &incoming);

        for (name, before) in &previous.collections {
            let incoming_is_empty = incoming.get(name).map_or(true, Collection::is_empty);
            if before.is_empty() || !incoming_is_empty {
                continue;
            }
            let after = merged.collection(name).expect("collection kept");
            prop_assert!(!after.is_empty());
            prop_assert!(after.len() >= before.len());
            if let Collection::List(_) = before {
                prop_assert_eq!(after, before);
            }
        }
    }

    #[test]
    fn merge_is_idempotent(previous in snapshot_strategy(), incoming in partition_data_strategy()) {
        let policy = MergePolicy::KeepPopulated;
        let once = policy.merge(&previous, &incoming);
        let twice = policy.merge(&once, &incoming);
        prop_assert_eq!(twice, once);
    }

    #[test]
    fn sequential_merges_fold_into_one(
        previous in snapshot_strategy(),
        first in partition_data_strategy(),
        second in partition_data_strategy(),
    ) {
        let policy = MergePolicy::KeepPopulated;
        let sequential = policy.merge(&policy.merge(&previous, &first), &second);
        let folded = policy.merge(&previous, &policy.merge_data(&first, &second));
        prop_assert_eq!(sequential, folded);
    }

    #[test]
    fn merge_is_deterministic(previous in snapshot_strategy(), incoming in partition_data_strategy()) {
        let a = MergePolicy::KeepPopulated.merge(&previous, &incoming);
        let b = MergePolicy::KeepPopulated.merge(&previous, &incoming);
        prop_assert_eq!(a, b);
    }

    #[test]
    fn replace_all_takes_incoming_verbatim(previous in snapshot_strategy(), incoming in partition_data_strategy()) {
        let merged = MergePolicy::ReplaceAll.merge(&previous, &incoming);
        for (name, value) in &incoming {
            prop_assert_eq!(merged.collection(name), Some(value));
        }
    }

    #[test]
    fn upserts_keep_ids_unique(writes in write_sequence_strategy(1, 40)) {
        let snapshot = apply_writes(SnapshotBuilder::new().list("courses", vec![]).build("en"), &writes);
        let mut ids = ids_of(&snapshot, "courses");
        let total = ids.len();
        ids.sort();
        ids.dedup();
        prop_assert_eq!(ids.len(), total);
    }

    /// Repeated incoming ids collapse to the first position with the last
    /// contents, under either policy.
    #[test]
    fn incoming_duplicates_never_reach_snapshot(
        previous in snapshot_strategy(),
        items in entity_list_with_duplicates_strategy(16),
        replace_all in any::<bool>(),
    ) {
        let policy = if replace_all { MergePolicy::ReplaceAll } else { MergePolicy::KeepPopulated };
        let mut incoming = PartitionData::new();
        incoming.insert("courses".to_string(), Collection::List(items.clone()));

        let merged = policy.merge(&previous, &incoming);
        let ids = ids_of(&merged, "courses");

        let mut expected_ids: Vec<String> = Vec::new();
        for entity in &items {
            if !expected_ids.contains(&entity.id.to_string()) {
                expected_ids.push(entity.id.to_string());
            }
        }
        if items.is_empty() && !replace_all {
            prop_assert_eq!(ids, ids_of(&previous, "courses"));
        } else {
            prop_assert_eq!(&ids, &expected_ids);
            for entity in merged.list("courses") {
                let last = items.iter().rev().find(|e| e.id == entity.id).expect("id came from incoming");
                prop_assert_eq!(entity, last);
            }
        }
    }

    #[test]
    fn upsert_existing_id_keeps_positions(items in entity_list_strategy(8), pick in any::<prop::sample::Index>()) {
        prop_assume!(!items.is_empty());
        let snapshot = SnapshotBuilder::new().list("courses", items.clone()).build("en");
        let target = pick.get(&items).clone().with_field("title", "edited");

        let next = MergePolicy::upsert(&snapshot, "courses", target.clone()).unwrap();

        prop_assert_eq!(ids_of(&next, "courses"), ids_of(&snapshot, "courses"));
        let index = pick.index(items.len());
        prop_assert_eq!(&next.list("courses")[index], &target);
    }
}

#[test]
fn transient_empty_fetch_keeps_courses() {
    let previous = SnapshotBuilder::new()
        .list("courses", vec![course("c1", "Logic")])
        .build("en");
    let incoming = SnapshotBuilder::new().list("courses", vec![]).data();

    let merged = MergePolicy::KeepPopulated.merge(&previous, &incoming);
    assert_eq!(merged.list("courses"), &[course("c1", "Logic")]);
}

#[test]
fn local_custom_tags_survive_empty_load() {
    let local = SnapshotBuilder::new()
        .list("customTags", vec![tag("work"), tag("life")])
        .build("uid-42");
    let loaded = SnapshotBuilder::new().list("customTags", vec![]).data();

    let merged = MergePolicy::KeepPopulated.merge(&local, &loaded);
    assert_eq!(ids_of(&merged, "customTags"), ["work", "life"]);
}
