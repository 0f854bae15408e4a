//! Background persistence worker
//!
//! A single `BatchAccumulator` drains the queue into the store. There is
//! exactly one per process and nothing else touches its buffer.

pub mod accumulator;

pub use accumulator::{AccumulatorConfig, AccumulatorState, BatchAccumulator, ShutdownReport, Step};

use crate::queue::LogQueue;
use crate::signals::ShutdownSignal;
use crate::store::LogStore;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Spawn the accumulator loop on the runtime.
///
/// The task finishes after `shutdown` fires and the final flush completes.
pub fn spawn_worker(
    queue: Arc<dyn LogQueue>,
    store: Arc<dyn LogStore>,
    config: AccumulatorConfig,
    shutdown: broadcast::Receiver<ShutdownSignal>,
) -> tokio::task::JoinHandle<ShutdownReport> {
    let accumulator = BatchAccumulator::new(queue, store, config);
    tokio::spawn(accumulator.run(shutdown))
}
