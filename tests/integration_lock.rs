//! Integration tests for the distributed lock: concurrent acquisition and
//! TTL expiry (§4.4, §8 "lock contention").

use authorization_core::locking::DistributedLock;
use uuid::Uuid;

mod common;

#[tokio::test]
async fn test_only_one_concurrent_acquirer_wins() {
    let pool = common::setup_test_db().await;
    let lock = std::sync::Arc::new(DistributedLock::new(pool));
    let aggregate_id = Uuid::new_v4();

    let mut handles = Vec::new();
    for i in 0..8 {
        let lock = lock.clone();
        handles.push(tokio::spawn(async move {
            lock.try_acquire(aggregate_id, &format!("worker-{i}"), 30).await.unwrap()
        }));
    }

    let mut wins = 0;
    for handle in handles {
        if handle.await.unwrap() {
            wins += 1;
        }
    }

    assert_eq!(wins, 1);
}

#[tokio::test]
async fn test_acquire_then_release_allows_a_new_acquirer() {
    let pool = common::setup_test_db().await;
    let lock = DistributedLock::new(pool);
    let aggregate_id = Uuid::new_v4();

    assert!(lock.try_acquire(aggregate_id, "worker-a", 30).await.unwrap());
    assert!(!lock.try_acquire(aggregate_id, "worker-b", 30).await.unwrap());

    assert!(lock.release(aggregate_id, "worker-a").await.unwrap());
    assert!(lock.try_acquire(aggregate_id, "worker-b", 30).await.unwrap());
}

#[tokio::test]
async fn test_release_by_non_holder_is_a_no_op() {
    let pool = common::setup_test_db().await;
    let lock = DistributedLock::new(pool);
    let aggregate_id = Uuid::new_v4();

    assert!(lock.try_acquire(aggregate_id, "worker-a", 30).await.unwrap());

    // worker-b never held the lock; releasing must not touch worker-a's row.
    assert!(!lock.release(aggregate_id, "worker-b").await.unwrap());
    assert!(!lock.try_acquire(aggregate_id, "worker-c", 30).await.unwrap());
}

#[tokio::test]
async fn test_expired_lock_can_be_stolen() {
    let pool = common::setup_test_db().await;
    let lock = DistributedLock::new(pool);
    let aggregate_id = Uuid::new_v4();

    // A 0-second TTL lock is expired as soon as it is acquired (`expires_at
    // < NOW()` becomes true almost immediately), simulating a crashed
    // worker's stale lock being stolen without needing a real sleep.
    assert!(lock.try_acquire(aggregate_id, "worker-a", 0).await.unwrap());
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    assert!(lock.try_acquire(aggregate_id, "worker-b", 30).await.unwrap());

    let row = lock.peek(aggregate_id).await.unwrap().unwrap();
    assert_eq!(row.worker_id, "worker-b");
}

#[tokio::test]
async fn test_cleanup_expired_removes_only_stale_rows() {
    let pool = common::setup_test_db().await;
    let lock = DistributedLock::new(pool);

    let stale_id = Uuid::new_v4();
    let fresh_id = Uuid::new_v4();

    assert!(lock.try_acquire(stale_id, "worker-a", 0).await.unwrap());
    assert!(lock.try_acquire(fresh_id, "worker-b", 30).await.unwrap());
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let removed = lock.cleanup_expired().await.unwrap();
    assert_eq!(removed, 1);

    assert!(lock.peek(stale_id).await.unwrap().is_none());
    assert!(lock.peek(fresh_id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_peek_on_unlocked_aggregate_returns_none() {
    let pool = common::setup_test_db().await;
    let lock = DistributedLock::new(pool);
    assert!(lock.peek(Uuid::new_v4()).await.unwrap().is_none());
}
