//! Queue module
//!
//! The FIFO queue sits between the outbox dispatcher and the worker; the
//! actual queueing service is an external collaborator out of scope for
//! this crate (§1), so only its contract is modeled here: long-poll
//! receive with re-delivery counts, group-keyed FIFO ordering, visibility
//! timeouts, and deduplication-id-based at-least-once delivery. Grounded
//! on the consumer contract in
//! `auth_processor_worker/infrastructure/sqs_consumer.py`.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

/// A message handed to the consumer, carrying the queue's own re-delivery
/// bookkeeping alongside the opaque body.
#[derive(Debug, Clone)]
pub struct QueueMessage {
    pub receipt_handle: String,
    pub body: Vec<u8>,
    pub message_group_id: String,
    pub deduplication_id: String,
    pub approximate_receive_count: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("unknown receipt handle: {0}")]
    UnknownReceipt(String),
}

/// The FIFO queue contract consumed by the outbox dispatcher (producer)
/// and the queue consumer (consumer half of §4.8).
#[async_trait]
pub trait Queue: Send + Sync {
    /// Enqueue a message body, grouped by `message_group_id` to preserve
    /// per-tenant ordering, deduplicated by `deduplication_id`.
    async fn enqueue(
        &self,
        body: Vec<u8>,
        message_group_id: String,
        deduplication_id: String,
    ) -> Result<(), QueueError>;

    /// Long-poll receive up to `max_messages`, waiting up to `wait_time`
    /// for at least one to become available.
    async fn receive(&self, max_messages: usize, wait_time: Duration) -> Vec<QueueMessage>;

    /// Acknowledge successful processing, permanently removing the message.
    async fn delete(&self, receipt_handle: &str) -> Result<(), QueueError>;
}

struct InFlight {
    message: QueueMessage,
    visible_at: Instant,
}

/// In-process FIFO queue implementation. Messages are partitioned by
/// `message_group_id`; within a group, delivery is strictly FIFO, and a
/// message already in flight for that group blocks its successors from
/// being received, mirroring SQS FIFO semantics.
pub struct FifoQueue {
    inner: Arc<Mutex<FifoQueueState>>,
    visibility_timeout: Duration,
}

#[derive(Default)]
struct FifoQueueState {
    groups: HashMap<String, VecDeque<QueueMessage>>,
    group_order: VecDeque<String>,
    in_flight: HashMap<String, InFlight>,
    seen_dedup_ids: std::collections::HashSet<String>,
}

impl FifoQueue {
    pub fn new(visibility_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(FifoQueueState::default())),
            visibility_timeout,
        }
    }

    /// Release expired in-flight messages back onto their group queues.
    /// Called lazily on receive; a production queueing service does this
    /// internally.
    async fn reap_expired(&self, state: &mut FifoQueueState) {
        let now = Instant::now();
        let expired: Vec<String> = state
            .in_flight
            .iter()
            .filter(|(_, f)| f.visible_at <= now)
            .map(|(handle, _)| handle.clone())
            .collect();

        for handle in expired {
            if let Some(mut in_flight) = state.in_flight.remove(&handle) {
                in_flight.message.approximate_receive_count += 1;
                let group = in_flight.message.message_group_id.clone();
                state.groups.entry(group.clone()).or_default().push_front(in_flight.message);
                if !state.group_order.contains(&group) {
                    state.group_order.push_back(group);
                }
            }
        }
    }
}

#[async_trait]
impl Queue for FifoQueue {
    async fn enqueue(
        &self,
        body: Vec<u8>,
        message_group_id: String,
        deduplication_id: String,
    ) -> Result<(), QueueError> {
        let mut state = self.inner.lock().await;

        if !state.seen_dedup_ids.insert(deduplication_id.clone()) {
            return Ok(());
        }

        let message = QueueMessage {
            receipt_handle: Uuid::new_v4().to_string(),
            body,
            message_group_id: message_group_id.clone(),
            deduplication_id,
            approximate_receive_count: 0,
        };

        if !state.groups.contains_key(&message_group_id) {
            state.group_order.push_back(message_group_id.clone());
        }
        state.groups.entry(message_group_id).or_default().push_back(message);

        Ok(())
    }

    async fn receive(&self, max_messages: usize, wait_time: Duration) -> Vec<QueueMessage> {
        let deadline = Instant::now() + wait_time;
        loop {
            {
                let mut state = self.inner.lock().await;
                self.reap_expired(&mut state).await;

                let mut received = Vec::new();
                let groups: Vec<String> = state.group_order.iter().cloned().collect();

                for group in groups {
                    if received.len() >= max_messages {
                        break;
                    }
                    let already_in_flight = state
                        .in_flight
                        .values()
                        .any(|f| f.message.message_group_id == group);
                    if already_in_flight {
                        continue;
                    }
                    if let Some(queue) = state.groups.get_mut(&group) {
                        if let Some(mut message) = queue.pop_front() {
                            message.approximate_receive_count += 1;
                            let handle = message.receipt_handle.clone();
                            received.push(message.clone());
                            state.in_flight.insert(
                                handle,
                                InFlight {
                                    message,
                                    visible_at: Instant::now() + self.visibility_timeout,
                                },
                            );
                        }
                    }
                }

                if !received.is_empty() || Instant::now() >= deadline {
                    return received;
                }
            }

            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    async fn delete(&self, receipt_handle: &str) -> Result<(), QueueError> {
        let mut state = self.inner.lock().await;
        state
            .in_flight
            .remove(receipt_handle)
            .map(|_| ())
            .ok_or_else(|| QueueError::UnknownReceipt(receipt_handle.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_enqueue_and_receive_roundtrip() {
        let queue = FifoQueue::new(Duration::from_secs(30));
        queue
            .enqueue(b"payload".to_vec(), "restaurant-1".to_string(), "dedup-1".to_string())
            .await
            .unwrap();

        let received = queue.receive(10, Duration::from_millis(50)).await;
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].body, b"payload");
        assert_eq!(received[0].approximate_receive_count, 1);
    }

    #[tokio::test]
    async fn test_duplicate_deduplication_id_collapses() {
        let queue = FifoQueue::new(Duration::from_secs(30));
        queue
            .enqueue(b"a".to_vec(), "r-1".to_string(), "same-dedup".to_string())
            .await
            .unwrap();
        queue
            .enqueue(b"b".to_vec(), "r-1".to_string(), "same-dedup".to_string())
            .await
            .unwrap();

        let received = queue.receive(10, Duration::from_millis(50)).await;
        assert_eq!(received.len(), 1);
    }

    #[tokio::test]
    async fn test_in_flight_message_blocks_group_until_deleted() {
        let queue = FifoQueue::new(Duration::from_secs(30));
        queue
            .enqueue(b"first".to_vec(), "r-1".to_string(), "d1".to_string())
            .await
            .unwrap();
        queue
            .enqueue(b"second".to_vec(), "r-1".to_string(), "d2".to_string())
            .await
            .unwrap();

        let first = queue.receive(10, Duration::from_millis(50)).await;
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].body, b"first");

        let none_yet = queue.receive(10, Duration::from_millis(50)).await;
        assert!(none_yet.is_empty());

        queue.delete(&first[0].receipt_handle).await.unwrap();

        let second = queue.receive(10, Duration::from_millis(50)).await;
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].body, b"second");
    }

    #[tokio::test]
    async fn test_expired_visibility_timeout_redelivers_with_incremented_count() {
        let queue = FifoQueue::new(Duration::from_millis(30));
        queue
            .enqueue(b"x".to_vec(), "r-1".to_string(), "d1".to_string())
            .await
            .unwrap();

        let first = queue.receive(10, Duration::from_millis(50)).await;
        assert_eq!(first[0].approximate_receive_count, 1);

        tokio::time::sleep(Duration::from_millis(60)).await;

        let redelivered = queue.receive(10, Duration::from_millis(50)).await;
        assert_eq!(redelivered.len(), 1);
        assert_eq!(redelivered[0].approximate_receive_count, 2);
    }
}
