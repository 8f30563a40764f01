mod common;

use common::{payload, test_config};
use pickup_sync::domain::entities::ActionTarget;
use pickup_sync::domain::value_objects::ActionType;
use pickup_sync::infrastructure::storage::{MemoryKeyValueStore, SqliteKeyValueStore};
use pickup_sync::shared::clock::SystemClock;
use pickup_sync::{ActionQueue, KeyValueStore};
use serde_json::json;
use std::sync::Arc;
use tempfile::tempdir;

fn queue_on(store: Arc<dyn KeyValueStore>) -> ActionQueue {
    ActionQueue::new(store, "offline.action_queue", Arc::new(SystemClock))
}

#[tokio::test]
async fn queued_actions_survive_restart_in_order() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryKeyValueStore::new());

    let first = queue_on(Arc::clone(&store));
    let a = first
        .enqueue(
            ActionType::CreatePickupRequest,
            payload(json!({"bins": 2})),
            Some(ActionTarget::upsert("client_requests", "tmp-a")),
        )
        .await
        .unwrap();
    let b = first
        .enqueue(
            ActionType::SendMessage,
            payload(json!({"body": "gate code 1234"})),
            None,
        )
        .await
        .unwrap();
    drop(first);

    // 再起動を模擬
    let restarted = queue_on(store);
    assert_eq!(restarted.load_from_store().await.unwrap(), 2);

    let listed = restarted.list_all().await;
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, a.id);
    assert_eq!(listed[1].id, b.id);
    assert_eq!(listed[0].payload, a.payload);
    assert_eq!(listed[1].metadata.attempts, 0);
}

#[tokio::test]
async fn sqlite_file_store_keeps_queue_between_connections() {
    let dir = tempdir().unwrap();
    let mut config = test_config();
    config.storage.database_url = format!(
        "sqlite:{}?mode=rwc",
        dir.path().join("nested").join("offline.db").display()
    );

    let ids = {
        let store = Arc::new(SqliteKeyValueStore::connect(&config.storage).await.unwrap());
        let queue = queue_on(store.clone());
        let first = queue
            .enqueue(ActionType::UpdateProfile, payload(json!({"name": "Ana"})), None)
            .await
            .unwrap();
        let second = queue
            .enqueue(
                ActionType::UpdateAssignmentStatus,
                payload(json!({"assignmentId": 7, "status": "completed"})),
                Some(ActionTarget::upsert("driver_assignments", "7")),
            )
            .await
            .unwrap();
        store.pool().close().await;
        vec![first.id, second.id]
    };

    let store = Arc::new(SqliteKeyValueStore::connect(&config.storage).await.unwrap());
    let queue = queue_on(store);
    queue.load_from_store().await.unwrap();

    let restored: Vec<_> = queue.list_all().await.into_iter().map(|a| a.id).collect();
    assert_eq!(restored, ids);
}

#[tokio::test]
async fn dequeue_persists_before_returning() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryKeyValueStore::new());
    let queue = queue_on(Arc::clone(&store));
    let action = queue
        .enqueue(ActionType::DeletePickupRequest, payload(json!({"id": "r1"})), None)
        .await
        .unwrap();

    assert!(queue.dequeue_by_id(&action.id).await.unwrap().is_some());
    assert!(queue.dequeue_by_id(&action.id).await.unwrap().is_none());

    let reloaded = queue_on(store);
    assert_eq!(reloaded.load_from_store().await.unwrap(), 0);
}
