//! Outbox Dispatcher
//!
//! Drains unprocessed outbox rows onto the FIFO queue at-least-once, and
//! sweeps two other time-based maintenance concerns: expired processing
//! locks and expired idempotency keys. Structured as three independent
//! interval ticks on one `tokio::select!` loop, the same shape as
//! `JobScheduler` in `src/jobs/mod.rs`.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::interval;

use crate::idempotency::IdempotencyRepository;
use crate::locking::DistributedLock;
use crate::outbox::OutboxRepository;
use crate::queue::Queue;

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub outbox_batch_size: i64,
    pub outbox_poll_interval: Duration,
    pub lock_sweep_interval: Duration,
    pub idempotency_sweep_interval: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            outbox_batch_size: 50,
            outbox_poll_interval: Duration::from_secs(1),
            lock_sweep_interval: Duration::from_secs(30),
            idempotency_sweep_interval: Duration::from_secs(3600),
        }
    }
}

pub struct OutboxDispatcher {
    outbox: OutboxRepository,
    queue: Arc<dyn Queue>,
    lock: DistributedLock,
    idempotency: IdempotencyRepository,
    config: DispatcherConfig,
}

impl OutboxDispatcher {
    pub fn new(
        outbox: OutboxRepository,
        queue: Arc<dyn Queue>,
        lock: DistributedLock,
        idempotency: IdempotencyRepository,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            outbox,
            queue,
            lock,
            idempotency,
            config,
        }
    }

    /// Spawn the dispatcher loop in the background.
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(&self) {
        tracing::info!("outbox dispatcher started");

        let mut outbox_interval = interval(self.config.outbox_poll_interval);
        let mut lock_interval = interval(self.config.lock_sweep_interval);
        let mut idempotency_interval = interval(self.config.idempotency_sweep_interval);

        loop {
            tokio::select! {
                _ = outbox_interval.tick() => {
                    if let Err(err) = self.drain_outbox().await {
                        tracing::error!(error = %err, "outbox drain failed");
                    }
                }
                _ = lock_interval.tick() => {
                    match self.lock.cleanup_expired().await {
                        Ok(count) if count > 0 => {
                            tracing::info!(rows_deleted = count, "swept expired processing locks");
                        }
                        Ok(_) => {}
                        Err(err) => tracing::error!(error = %err, "lock sweep failed"),
                    }
                }
                _ = idempotency_interval.tick() => {
                    match self.idempotency.cleanup_expired().await {
                        Ok(count) if count > 0 => {
                            tracing::info!(rows_deleted = count, "swept expired idempotency keys");
                        }
                        Ok(_) => {}
                        Err(err) => tracing::error!(error = %err, "idempotency sweep failed"),
                    }
                }
            }
        }
    }

    /// Relay unprocessed outbox rows to the queue, one enqueue per row.
    /// A row is left unprocessed if the enqueue call fails so the next
    /// tick retries it (at-least-once; see DESIGN.md on duplicate claims
    /// across dispatcher replicas).
    async fn drain_outbox(&self) -> anyhow::Result<()> {
        let entries = self.outbox.claim_unprocessed(self.config.outbox_batch_size).await?;

        for entry in entries {
            let payload = match entry.decode_auth_request_queued() {
                Ok(payload) => payload,
                Err(err) => {
                    tracing::error!(outbox_id = entry.id, error = %err, "failed to decode outbox payload, skipping");
                    continue;
                }
            };

            let enqueue_result = self
                .queue
                .enqueue(entry.payload.clone(), payload.restaurant_id.to_string(), entry.id.to_string())
                .await;

            match enqueue_result {
                Ok(()) => {
                    if let Err(err) = self.outbox.mark_processed(entry.id).await {
                        tracing::error!(outbox_id = entry.id, error = %err, "failed to mark outbox row processed");
                    }
                }
                Err(err) => {
                    tracing::error!(outbox_id = entry.id, error = %err, "failed to enqueue outbox row, will retry");
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::FifoQueue;
    use std::time::Duration as StdDuration;

    #[test]
    fn test_default_config() {
        let config = DispatcherConfig::default();
        assert_eq!(config.outbox_batch_size, 50);
        assert_eq!(config.outbox_poll_interval, StdDuration::from_secs(1));
    }

    #[tokio::test]
    async fn test_queue_handle_is_send_sync() {
        let queue: Arc<dyn Queue> = Arc::new(FifoQueue::new(Duration::from_secs(30)));
        queue
            .enqueue(b"x".to_vec(), "r-1".to_string(), "d-1".to_string())
            .await
            .unwrap();
        let received = queue.receive(10, Duration::from_millis(10)).await;
        assert_eq!(received.len(), 1);
    }
}
