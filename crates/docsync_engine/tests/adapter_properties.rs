//! Property tests for delivery materialization.

use docsync_core::{CollectionKind, Timestamp};
use docsync_engine::{CollectionOrder, RemoteDocument, SubscriptionAdapter};
use docsync_testkit::prelude::*;
use proptest::prelude::*;
use std::collections::HashSet;

const RECEIVED_AT: Timestamp = Timestamp::from_millis(2_000_000);

proptest! {
    #![proptest_config(PropTestConfig::default().to_proptest_config())]

    /// Newest first; pending entities, stamped on receipt, lead in payload
    /// order.
    #[test]
    fn created_desc_order(items in entity_list_strategy(12)) {
        let mut adapter = SubscriptionAdapter::new(CollectionKind::List, CollectionOrder::CreatedDesc);
        let documents: Vec<RemoteDocument> = items.iter().cloned().map(RemoteDocument::from).collect();
        let value = adapter.materialize(documents, RECEIVED_AT);
        let output = value.as_list().unwrap_or_default();

        prop_assert_eq!(output.len(), items.len());
        let ids: HashSet<_> = output.iter().map(|e| &e.id).collect();
        prop_assert_eq!(ids.len(), output.len());

        let pending_in: Vec<_> = items.iter().filter(|e| e.is_pending()).map(|e| &e.id).collect();
        let pending_out: Vec<_> = output.iter().take(pending_in.len()).map(|e| &e.id).collect();
        prop_assert_eq!(pending_out, pending_in);
        prop_assert_eq!(adapter.pending_count(), items.iter().filter(|e| e.is_pending()).count());

        let resolved = &output[adapter.pending_count()..];
        for pair in resolved.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            prop_assert!(
                a.created_at > b.created_at || (a.created_at == b.created_at && a.id < b.id),
                "{} before {}", a.id, b.id
            );
        }
    }

    #[test]
    fn insertion_order_is_payload_order(items in entity_list_strategy(12)) {
        let mut adapter = SubscriptionAdapter::new(CollectionKind::List, CollectionOrder::Insertion);
        let documents: Vec<RemoteDocument> = items.iter().cloned().map(RemoteDocument::from).collect();
        let value = adapter.materialize(documents, RECEIVED_AT);
        prop_assert_eq!(value.as_list().unwrap_or_default(), items.as_slice());
    }

    /// A placeholder keeps its receipt time across later deliveries.
    #[test]
    fn placeholders_are_sticky(items in entity_list_strategy(8), later in 0u64..1_000) {
        let mut adapter = SubscriptionAdapter::new(CollectionKind::List, CollectionOrder::CreatedDesc);
        let documents: Vec<RemoteDocument> = items.iter().cloned().map(RemoteDocument::from).collect();
        let first = adapter.materialize(documents.clone(), RECEIVED_AT);
        let again = adapter.materialize(documents, Timestamp::from_millis(RECEIVED_AT.as_millis() + later));

        prop_assert_eq!(first, again);
        for entity in items.iter().filter(|e| e.is_pending()) {
            prop_assert_eq!(adapter.placeholder(&entity.id), Some(RECEIVED_AT));
        }
    }
}
