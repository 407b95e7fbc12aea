//! Contract Test: Change Notifications
//!
//! This test verifies that every committed mutation produces EXACTLY ONE
//! `SettingsChanged`, and everything else produces none.
//!
//! Constraints verified:
//! - One successful upsert/remove → one notification
//! - Discarded detections never reach the store
//! - Failed, rejected and no-op events are silent
//! - An observer re-reading on notification sees the committed state
//! - A dispatch abandoned mid-write still notifies once the write commits
//!
//! If this test fails, someone has:
//! - Notified before the transaction committed
//! - Notified on failure paths
//! - Started writing detections with a failed status

mod common;

use common::*;
use nori_core::traits::ConfigurationStore;
use nori_core::{ChangeEvent, DetectionStatus, Dispatch, Identity, StoreChange};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::TryRecvError;
use tokio_stream::StreamExt;

#[tokio::test]
async fn one_upsert_triggers_exactly_one_notification() {
    let store = Arc::new(MockConfigurationStore::new());
    let router = router_over(store.clone());
    let mut changes = router.subscribe();

    let outcome = router.dispatch(ChangeEvent::detected(yandere())).await.unwrap();

    let changed = changes.recv().await.unwrap();
    assert_eq!(outcome, Dispatch::Applied(changed));
    assert!(matches!(changed.change, StoreChange::Inserted { .. }));
    assert_eq!(changed.revision, 1);
    assert!(
        matches!(changes.try_recv(), Err(TryRecvError::Empty)),
        "exactly one notification per commit"
    );
    assert_eq!(store.upsert_call_count(), 1);
}

#[tokio::test]
async fn one_remove_triggers_exactly_one_notification() {
    let store = Arc::new(MockConfigurationStore::new());
    let router = router_over(store.clone());
    let id = store.upsert(&yandere()).await.unwrap();
    let mut changes = router.subscribe();

    router.dispatch(ChangeEvent::remove(id)).await.unwrap();

    assert_eq!(changes.recv().await.unwrap().change, StoreChange::Removed { id });
    assert!(matches!(changes.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn failed_detection_is_discarded_without_store_call() {
    let store = Arc::new(MockConfigurationStore::new());
    let router = router_over(store.clone());
    let mut changes = router.subscribe();

    let event = ChangeEvent::SettingsDetected {
        settings: yandere(),
        status: DetectionStatus::Failed(-3),
    };
    let outcome = router.dispatch(event).await.unwrap();

    assert_eq!(outcome, Dispatch::Discarded(DetectionStatus::Failed(-3)));
    assert_eq!(store.upsert_call_count(), 0, "store must not be touched");
    assert!(matches!(changes.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn storage_failure_produces_no_notification() {
    let store = Arc::new(MockConfigurationStore::new());
    let router = router_over(store.clone());
    let mut changes = router.subscribe();

    store.set_fail_writes(true);
    let err = router
        .dispatch(ChangeEvent::detected(yandere()))
        .await
        .unwrap_err();

    assert!(err.is_storage());
    assert!(matches!(changes.try_recv(), Err(TryRecvError::Empty)));
    assert!(store.list().await.unwrap().is_empty());

    // The router is still usable after a failure
    store.set_fail_writes(false);
    router.dispatch(ChangeEvent::detected(yandere())).await.unwrap();
    assert_eq!(changes.recv().await.unwrap().revision, 1);
}

#[tokio::test]
async fn rejected_events_produce_no_notification() {
    let store = Arc::new(MockConfigurationStore::new());
    let router = router_over(store.clone());
    let mut changes = router.subscribe();

    // Unknown identity
    let ghost = gelbooru("Ghost").with_identity(Identity::from(404));
    assert!(
        router
            .dispatch(ChangeEvent::detected(ghost))
            .await
            .unwrap_err()
            .is_not_found()
    );

    // Invalid record
    let nameless = gelbooru("");
    assert!(
        router
            .dispatch(ChangeEvent::detected(nameless))
            .await
            .unwrap_err()
            .is_validation()
    );

    // Negative id never reaches the store
    assert!(
        router
            .dispatch(ChangeEvent::remove(-7))
            .await
            .unwrap_err()
            .is_validation()
    );
    assert_eq!(store.remove_call_count(), 0);

    assert!(matches!(changes.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn removing_absent_id_is_silent() {
    let store = Arc::new(MockConfigurationStore::new());
    let router = router_over(store.clone());
    let mut changes = router.subscribe();

    let outcome = router.dispatch(ChangeEvent::remove(31)).await.unwrap();

    assert!(matches!(outcome, Dispatch::NothingRemoved(id) if id.get() == 31));
    assert_eq!(store.remove_call_count(), 1);
    assert!(matches!(changes.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn observer_rereads_committed_state() {
    let store = Arc::new(MockConfigurationStore::new());
    let router = Arc::new(router_over(store.clone()));
    let mut watch = router.watch();

    let observer_router = Arc::clone(&router);
    let observer = tokio::spawn(async move {
        let mut snapshots = Vec::new();
        while let Some(changed) = watch.next().await {
            let names: Vec<String> = observer_router
                .store()
                .list()
                .await
                .unwrap()
                .into_iter()
                .map(|r| r.name)
                .collect();
            snapshots.push((changed.revision, names));
            if snapshots.len() == 2 {
                break;
            }
        }
        snapshots
    });

    let first = router
        .dispatch(ChangeEvent::detected(yandere()))
        .await
        .unwrap()
        .notification()
        .unwrap();
    let StoreChange::Inserted { id } = first.change else {
        panic!("expected insert, got {:?}", first.change);
    };
    router.dispatch(ChangeEvent::remove(id)).await.unwrap();

    let snapshots = tokio::time::timeout(std::time::Duration::from_secs(5), observer)
        .await
        .expect("observer finishes")
        .unwrap();

    // The first snapshot may already reflect the removal; it can never
    // predate the insert.
    assert_eq!(snapshots[0].0, 1);
    assert!(snapshots[0].1.len() <= 1);
    assert_eq!(snapshots[1], (2, Vec::<String>::new()));
}

#[tokio::test]
async fn dispatch_without_subscribers_still_commits() {
    let store = Arc::new(MockConfigurationStore::new());
    let router = router_over(store.clone());

    let outcome = router.dispatch(ChangeEvent::detected(yandere())).await.unwrap();

    assert!(outcome.notification().is_some());
    assert_eq!(store.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn abandoned_dispatch_still_notifies_its_commit() {
    let store = Arc::new(MockConfigurationStore::new().with_write_delay(Duration::from_millis(100)));
    let router = router_over(store.clone());
    let mut changes = router.subscribe();

    let abandoned = tokio::time::timeout(
        Duration::from_millis(10),
        router.dispatch(ChangeEvent::detected(yandere())),
    )
    .await;
    assert!(abandoned.is_err(), "write is still in flight");

    let changed = changes.recv().await.unwrap();
    assert_eq!(changed.revision, 1);
    assert!(matches!(changed.change, StoreChange::Inserted { .. }));
    assert_eq!(store.count().await.unwrap(), 1);
    assert_eq!(store.upsert_call_count(), 1);
}
