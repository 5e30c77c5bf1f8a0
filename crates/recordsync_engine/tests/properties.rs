//! Property tests for reconciliation and upload routing.

use proptest::prelude::*;
use recordsync_engine::{
    LocalStore, MemoryKeyValueStore, MemoryLocalStore, MockRemoteService, NoopObserver,
    Reconciliation, RecordApplier, RemoteCall, SyncConfig, SyncEngine,
};
use recordsync_model::{LocalObject, RecordName, RemoteRecord, SyncMetadata, Syncable};
use recordsync_testkit::prelude::*;
use std::sync::Arc;

fn applier() -> (
    RecordApplier<Note, MemoryLocalStore<Note>>,
    Arc<MemoryLocalStore<Note>>,
) {
    let store = Arc::new(MemoryLocalStore::new());
    let applier = RecordApplier::<Note, _>::new(Arc::clone(&store), Arc::new(NoopObserver));
    (applier, store)
}

fn seed(store: &MemoryLocalStore<Note>, note: Note, meta: SyncMetadata) -> LocalObject<Note> {
    store.insert(note, meta).unwrap()
}

proptest! {
    #[test]
    fn last_write_wins_with_local_ties(
        (local_time, remote_time) in timestamp_pair_strategy(),
        local in note_strategy(),
        remote in note_strategy(),
        synced in any::<bool>(),
    ) {
        let (applier, store) = applier();
        let object = seed(&store, local.clone(), SyncMetadata {
            record_name: Some("X".into()),
            modified_at: local_time,
            synced,
        });
        let record = RemoteRecord::new("X", remote_time, remote.to_properties());

        let outcome = applier.reconcile(&record).unwrap();
        let after = store.get(&object.key).unwrap().unwrap();

        if local_time < remote_time {
            prop_assert_eq!(outcome, Reconciliation::ServerWins);
            prop_assert_eq!(after.value, remote);
            prop_assert_eq!(after.meta.modified_at, remote_time);
            prop_assert!(after.meta.synced);
        } else {
            prop_assert_eq!(outcome, Reconciliation::LocalWins);
            prop_assert_eq!(after.value, local);
            prop_assert_eq!(after.meta.modified_at, local_time);
            prop_assert!(!after.meta.synced);
        }
    }

    #[test]
    fn reconciling_twice_changes_nothing_more(
        (local_time, remote_time) in timestamp_pair_strategy(),
        local in note_strategy(),
        remote in note_strategy(),
    ) {
        let (applier, store) = applier();
        let object = seed(&store, local, SyncMetadata {
            record_name: Some("X".into()),
            modified_at: local_time,
            synced: true,
        });
        let record = RemoteRecord::new("X", remote_time, remote.to_properties());

        applier.reconcile(&record).unwrap();
        let first = store.get(&object.key).unwrap().unwrap();
        prop_assert_eq!(applier.reconcile(&record).unwrap(), Reconciliation::LocalWins);
        let second = store.get(&object.key).unwrap().unwrap();

        prop_assert_eq!(first.value, second.value);
        prop_assert_eq!(first.meta.modified_at, second.meta.modified_at);
        prop_assert_eq!(store.len(), 1);
    }

    #[test]
    fn unnamed_objects_only_reach_create(
        objects in prop::collection::vec((note_strategy(), any::<bool>(), timestamp_strategy()), 1..12),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let store = Arc::new(MemoryLocalStore::new());
        let remote = Arc::new(MockRemoteService::new());
        let mut unnamed = 0u64;
        for (i, (note, named, at)) in objects.into_iter().enumerate() {
            let record_name: Option<RecordName> = named.then(|| format!("known-{i}").into());
            if let Some(name) = &record_name {
                remote.insert_record(RemoteRecord::new(name.clone(), at, note.to_properties()));
            } else {
                unnamed += 1;
            }
            seed(&store, note, SyncMetadata { record_name, modified_at: at, synced: false });
        }

        let engine: SyncEngine<Note, MemoryLocalStore<Note>, MockRemoteService> = SyncEngine::new(
            SyncConfig::for_type::<Note>(),
            Arc::clone(&store),
            Arc::clone(&remote),
            Arc::new(MemoryKeyValueStore::new()),
        )
        .unwrap();
        let report = runtime.block_on(engine.sync()).unwrap();

        prop_assert_eq!(report.created, unnamed);
        prop_assert!(report.is_clean());
        for call in remote.calls() {
            match call {
                RemoteCall::Fetch(name) | RemoteCall::Modify(name) | RemoteCall::Delete(name) => {
                    prop_assert!(name.as_str().starts_with("known-"));
                }
                _ => {}
            }
        }
        prop_assert!(store.unsynced().unwrap().is_empty());
    }
}
