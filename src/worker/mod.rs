//! Worker Orchestrator
//!
//! Ties together the distributed lock, event store, read model, transaction
//! coordinator, tokenization client, and processor registry into the single
//! per-message processing pipeline described in §4.7, plus the queue
//! consumer loop that feeds it (§4.8).

mod orchestrator;
mod queue_consumer;

pub use orchestrator::{ProcessingResult, WorkerOrchestrator};
pub use queue_consumer::QueueConsumer;
