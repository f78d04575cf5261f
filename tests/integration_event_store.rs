//! Integration tests for the event store: sequence allocation, the
//! gap-free uniqueness invariant, and the void-check read path (§4.1, §8).

use std::collections::HashMap;

use authorization_core::domain::events::AuthEvent;
use authorization_core::domain::AmountCents;
use authorization_core::event_store::EventStore;
use chrono::Utc;
use uuid::Uuid;

mod common;

fn created_event(auth_request_id: Uuid, restaurant_id: Uuid) -> AuthEvent {
    AuthEvent::AuthRequestCreated {
        auth_request_id,
        restaurant_id,
        payment_token: "tok_test".to_string(),
        amount_cents: AmountCents::new(1000).unwrap(),
        currency: "USD".to_string(),
        created_at: Utc::now(),
    }
}

#[tokio::test]
async fn test_append_and_load_events_in_sequence_order() {
    let pool = common::setup_test_db().await;
    let event_store = EventStore::new(pool);

    let auth_request_id = Uuid::new_v4();
    let restaurant_id = Uuid::new_v4();
    let metadata = HashMap::new();

    let mut tx = event_store.pool().begin().await.unwrap();
    let seq = event_store.next_sequence(&mut tx, auth_request_id).await.unwrap();
    assert_eq!(seq, 1);
    event_store
        .append(&mut tx, &created_event(auth_request_id, restaurant_id), seq, &metadata)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let mut tx = event_store.pool().begin().await.unwrap();
    let seq = event_store.next_sequence(&mut tx, auth_request_id).await.unwrap();
    assert_eq!(seq, 2);
    let event = AuthEvent::AuthAttemptStarted {
        auth_request_id,
        worker_id: "worker-1".to_string(),
        attempt_number: 1,
        started_at: Utc::now(),
    };
    event_store.append(&mut tx, &event, seq, &metadata).await.unwrap();
    tx.commit().await.unwrap();

    let events = event_store.get_events(auth_request_id).await.unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].sequence_number, 1);
    assert_eq!(events[0].event_type, "AuthRequestCreated");
    assert_eq!(events[1].sequence_number, 2);
    assert_eq!(events[1].event_type, "AuthAttemptStarted");
}

#[tokio::test]
async fn test_duplicate_sequence_number_rejected() {
    let pool = common::setup_test_db().await;
    let event_store = EventStore::new(pool);

    let auth_request_id = Uuid::new_v4();
    let restaurant_id = Uuid::new_v4();
    let metadata = HashMap::new();

    let mut tx = event_store.pool().begin().await.unwrap();
    event_store
        .append(&mut tx, &created_event(auth_request_id, restaurant_id), 1, &metadata)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    // A second writer racing on the same pre-allocated sequence number
    // must fail the uniqueness constraint rather than silently overwrite.
    let mut tx = event_store.pool().begin().await.unwrap();
    let result = event_store
        .append(&mut tx, &created_event(auth_request_id, restaurant_id), 1, &metadata)
        .await;

    assert!(result.is_err());
    assert!(result.unwrap_err().is_concurrency_conflict());
}

#[tokio::test]
async fn test_has_void_event_detects_recorded_void() {
    let pool = common::setup_test_db().await;
    let event_store = EventStore::new(pool);

    let auth_request_id = Uuid::new_v4();
    let restaurant_id = Uuid::new_v4();
    let metadata = HashMap::new();

    let mut tx = event_store.pool().begin().await.unwrap();
    event_store
        .append(&mut tx, &created_event(auth_request_id, restaurant_id), 1, &metadata)
        .await
        .unwrap();
    let has_void = event_store.has_void_event(&mut tx, auth_request_id).await.unwrap();
    assert!(!has_void);
    tx.commit().await.unwrap();

    let mut tx = event_store.pool().begin().await.unwrap();
    let void_event = AuthEvent::AuthVoidRequested {
        auth_request_id,
        requested_by: Some("ops-console".to_string()),
        requested_at: Utc::now(),
    };
    event_store.append(&mut tx, &void_event, 2, &metadata).await.unwrap();
    let has_void = event_store.has_void_event(&mut tx, auth_request_id).await.unwrap();
    assert!(has_void);
    tx.commit().await.unwrap();
}

#[tokio::test]
async fn test_sequence_numbers_form_gap_free_prefix_per_aggregate() {
    let pool = common::setup_test_db().await;
    let event_store = EventStore::new(pool);

    let auth_request_id = Uuid::new_v4();
    let restaurant_id = Uuid::new_v4();
    let metadata = HashMap::new();

    for i in 0..3 {
        let mut tx = event_store.pool().begin().await.unwrap();
        let seq = event_store.next_sequence(&mut tx, auth_request_id).await.unwrap();
        assert_eq!(seq, i + 1);
        event_store
            .append(&mut tx, &created_event(auth_request_id, restaurant_id), seq, &metadata)
            .await
            .unwrap();
        tx.commit().await.unwrap();
    }

    let events = event_store.get_events(auth_request_id).await.unwrap();
    let sequences: Vec<i32> = events.iter().map(|e| e.sequence_number).collect();
    assert_eq!(sequences, vec![1, 2, 3]);
}
