//! Batch accumulator
//!
//! Pops serialized records from the queue into an in-memory buffer and
//! flushes the buffer to the store when either trigger fires:
//! - size: the buffer holds `batch_size` records
//! - time: the buffer is non-empty and `time_limit` has passed since the
//!   last flush
//!
//! A failed flush puts the batch back at the front of the buffer and the
//! next attempt waits out an exponential backoff. Dequeuing pauses while
//! the buffer is full, so a broken store leaves the backlog in the durable
//! queue instead of in memory.
//!
//! Records popped but not yet persisted live only in this process. A crash
//! in that window loses them.

use crate::config::WorkerConfig;
use crate::model::LogRecord;
use crate::queue::{self, LogQueue};
use crate::signals::{shutdown_requested, ShutdownSignal};
use crate::store::LogStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct AccumulatorConfig {
    pub batch_size: usize,
    pub time_limit: Duration,
    pub idle_wait: Duration,
    pub retry_backoff: Duration,
    pub max_retry_backoff: Duration,
}

impl Default for AccumulatorConfig {
    fn default() -> Self {
        Self::from(&WorkerConfig::default())
    }
}

impl From<&WorkerConfig> for AccumulatorConfig {
    fn from(config: &WorkerConfig) -> Self {
        Self {
            batch_size: config.batch_size.max(1),
            time_limit: config.flush_interval(),
            idle_wait: config.idle_wait(),
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
            max_retry_backoff: Duration::from_millis(config.max_retry_backoff_ms),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccumulatorState {
    /// Buffer empty
    Idle,
    /// Buffer holds records below the flush threshold
    Accumulating,
    /// Insert in progress
    Flushing,
}

/// Outcome of one loop iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Batch of this many records persisted
    Flushed(usize),
    /// Insert of this many records failed; they are buffered again
    FlushFailed(usize),
    /// One record moved from the queue into the buffer
    Buffered,
    /// Popped entry could not be decoded and was dropped
    Discarded,
    /// Queue had nothing to hand out
    QueueEmpty,
    /// Queue could not be reached
    QueueUnavailable,
    /// Buffer is full but the next flush attempt is still backing off
    Waiting,
}

impl Step {
    /// Whether the run loop should idle before the next iteration
    fn should_idle(self) -> bool {
        matches!(self, Step::QueueEmpty | Step::QueueUnavailable | Step::Waiting)
    }
}

/// What happened during shutdown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShutdownReport {
    /// Records persisted by the final flush
    pub flushed: usize,
    /// Records still buffered when the worker exited
    pub unpersisted: usize,
}

pub struct BatchAccumulator {
    queue: Arc<dyn LogQueue>,
    store: Arc<dyn LogStore>,
    config: AccumulatorConfig,
    buffer: Vec<LogRecord>,
    last_flush: Instant,
    state: AccumulatorState,
    consecutive_failures: u32,
    retry_at: Option<Instant>,
}

impl BatchAccumulator {
    pub fn new(
        queue: Arc<dyn LogQueue>,
        store: Arc<dyn LogStore>,
        config: AccumulatorConfig,
    ) -> Self {
        let capacity = config.batch_size;
        Self {
            queue,
            store,
            config,
            buffer: Vec::with_capacity(capacity),
            last_flush: Instant::now(),
            state: AccumulatorState::Idle,
            consecutive_failures: 0,
            retry_at: None,
        }
    }

    pub fn state(&self) -> AccumulatorState {
        self.state
    }

    pub fn buffered(&self) -> &[LogRecord] {
        &self.buffer
    }

    /// Size or time trigger fired and no backoff is pending
    pub fn flush_due(&self) -> bool {
        if self.buffer.is_empty() {
            return false;
        }

        if let Some(retry_at) = self.retry_at {
            if Instant::now() < retry_at {
                return false;
            }
        }

        self.buffer.len() >= self.config.batch_size
            || self.last_flush.elapsed() >= self.config.time_limit
    }

    /// Run one iteration: flush if due, otherwise pull one record
    pub async fn step(&mut self) -> Step {
        if self.flush_due() {
            return self.flush().await;
        }

        if self.buffer.len() >= self.config.batch_size {
            return Step::Waiting;
        }

        match self.queue.dequeue().await {
            Ok(Some(payload)) => match queue::decode(&payload) {
                Ok(record) => {
                    self.buffer.push(record);
                    self.state = AccumulatorState::Accumulating;
                    Step::Buffered
                }
                Err(e) => {
                    warn!(error = %e, payload_len = payload.len(), "Discarding undecodable queue entry");
                    Step::Discarded
                }
            },
            Ok(None) => {
                crate::metrics::set_queue_depth(0);
                Step::QueueEmpty
            }
            Err(e) => {
                warn!(error = %e, "Failed to dequeue log record");
                Step::QueueUnavailable
            }
        }
    }

    /// Attempt one bulk insert of everything buffered.
    ///
    /// The buffer is swapped out first, so the in-flight batch never mixes
    /// with records pulled afterwards. On failure the batch goes back in
    /// front of them.
    pub async fn flush(&mut self) -> Step {
        if self.buffer.is_empty() {
            return Step::Flushed(0);
        }

        let batch = std::mem::replace(
            &mut self.buffer,
            Vec::with_capacity(self.config.batch_size),
        );
        self.last_flush = Instant::now();
        self.state = AccumulatorState::Flushing;

        let count = batch.len();
        let started = std::time::Instant::now();

        let step = match self.store.insert_batch(&batch).await {
            Ok(_) => {
                let elapsed = started.elapsed();
                info!(
                    count = count,
                    duration_ms = elapsed.as_millis() as u64,
                    "Inserted logs into database"
                );
                crate::metrics::record_flush(count, elapsed);
                self.report_queue_depth().await;

                self.consecutive_failures = 0;
                self.retry_at = None;
                Step::Flushed(count)
            }
            Err(e) => {
                crate::metrics::record_flush_failure(started.elapsed());

                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                let backoff = self.current_backoff();
                self.retry_at = Some(Instant::now() + backoff);

                error!(
                    error = %e,
                    count = count,
                    attempt = self.consecutive_failures,
                    retry_in_ms = backoff.as_millis() as u64,
                    "Failed to insert log batch, keeping it buffered"
                );

                let mut restored = batch;
                restored.append(&mut self.buffer);
                self.buffer = restored;
                Step::FlushFailed(count)
            }
        };

        self.state = if self.buffer.is_empty() {
            AccumulatorState::Idle
        } else {
            AccumulatorState::Accumulating
        };
        crate::metrics::set_buffer_size(self.buffer.len());

        step
    }

    /// Sample the queue length into the depth gauge
    async fn report_queue_depth(&self) {
        match self.queue.len().await {
            Ok(depth) => crate::metrics::set_queue_depth(depth),
            Err(e) => debug!(error = %e, "Could not read queue depth"),
        }
    }

    fn current_backoff(&self) -> Duration {
        let exponent = self.consecutive_failures.saturating_sub(1).min(16);
        self.config
            .retry_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.config.max_retry_backoff)
    }

    /// Loop until shutdown, then make one final flush attempt
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<ShutdownSignal>) -> ShutdownReport {
        info!(
            batch_size = self.config.batch_size,
            time_limit_ms = self.config.time_limit.as_millis() as u64,
            "Worker started, waiting for logs"
        );

        loop {
            if shutdown_requested(&mut shutdown) {
                break;
            }

            let step = self.step().await;
            debug!(?step, buffered = self.buffer.len(), "Worker step");

            if step.should_idle() {
                tokio::select! {
                    _ = tokio::time::sleep(self.config.idle_wait) => {}
                    _ = shutdown.recv() => break,
                }
            }
        }

        self.shutdown().await
    }

    async fn shutdown(mut self) -> ShutdownReport {
        info!(buffered = self.buffer.len(), "Received stop signal, flushing remaining logs");

        let report = match self.flush().await {
            Step::Flushed(flushed) => ShutdownReport {
                flushed,
                unpersisted: 0,
            },
            _ => {
                warn!(
                    unpersisted = self.buffer.len(),
                    "Final flush failed, buffered logs are lost"
                );
                ShutdownReport {
                    flushed: 0,
                    unpersisted: self.buffer.len(),
                }
            }
        };

        info!("Worker shut down");
        report
    }
}
