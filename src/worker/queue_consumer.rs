//! Queue consumer
//!
//! Long-polls the FIFO queue and hands each message to the worker
//! orchestrator, deleting it unless the outcome is retryable. Grounded on
//! the polling loop in `auth_processor_worker/infrastructure/sqs_consumer.py`.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::outbox::AuthRequestQueuedPayload;
use crate::queue::Queue;

use super::orchestrator::{ProcessingResult, WorkerOrchestrator};

pub struct QueueConsumer {
    queue: Arc<dyn Queue>,
    orchestrator: Arc<WorkerOrchestrator>,
    worker_id: String,
    wait_time: Duration,
    batch_size: usize,
}

impl QueueConsumer {
    pub fn new(
        queue: Arc<dyn Queue>,
        orchestrator: Arc<WorkerOrchestrator>,
        worker_id: String,
        wait_time: Duration,
        batch_size: usize,
    ) -> Self {
        Self {
            queue,
            orchestrator,
            worker_id,
            wait_time,
            batch_size,
        }
    }

    /// Run until `shutdown` reports `true`.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(worker_id = %self.worker_id, "queue consumer started");

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        tracing::info!(worker_id = %self.worker_id, "queue consumer shutting down");
                        break;
                    }
                }
                _ = self.poll_once() => {}
            }
        }
    }

    async fn poll_once(&self) {
        let messages = self.queue.receive(self.batch_size, self.wait_time).await;
        for message in messages {
            self.handle_message(message).await;
        }
    }

    async fn handle_message(&self, message: crate::queue::QueueMessage) {
        let payload: AuthRequestQueuedPayload = match bincode::deserialize(&message.body) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::error!(error = %err, "failed to decode queue message, discarding");
                if let Err(err) = self.queue.delete(&message.receipt_handle).await {
                    tracing::error!(error = %err, "failed to delete undecodable message");
                }
                return;
            }
        };

        let result = self
            .orchestrator
            .process(payload.auth_request_id, &self.worker_id, message.approximate_receive_count as i32)
            .await;

        if result == ProcessingResult::RetryableFailure {
            tracing::debug!(
                auth_request_id = %payload.auth_request_id,
                "retryable failure, leaving message for redelivery"
            );
            return;
        }

        if let Err(err) = self.queue.delete(&message.receipt_handle).await {
            tracing::error!(
                auth_request_id = %payload.auth_request_id,
                error = %err,
                "failed to delete processed message"
            );
        }
    }
}
