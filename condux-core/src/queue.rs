//! Batching host: commits wait in a queue until flushed
//!
//! [`CommitQueue`] only records commits. A flush applies every pending
//! transform in issue order and then acknowledges the whole batch, so several
//! updates can land before any of their futures resolve.
//!
//! Flushing is manual ([`CommitQueue::flush`]) or driven by a tokio task
//! ([`CommitQueue::spawn`]) that gathers commits for a short batch window.
//!
//! ```ignore
//! use tokio_util::sync::CancellationToken;
//!
//! let queue = Arc::new(CommitQueue::new(AppState::default(), QueueConfig::default()));
//! let cancel = CancellationToken::new();
//! let driver = queue.spawn(cancel.clone());
//!
//! // ... dispatch updates through the queue ...
//!
//! cancel.cancel();
//! driver.await?;
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::cell::StateCell;
use crate::commit::{Acknowledge, Commit, State, Transform};
use crate::error::Error;

/// Configuration for the queue driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// How long the driver waits after the first pending commit before
    /// flushing, letting further commits join the batch.
    #[serde(with = "millis")]
    pub batch_window: Duration,
    /// Upper bound on commits applied per flush. `0` means unbounded.
    pub max_batch: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            batch_window: Duration::from_millis(1),
            max_batch: 0,
        }
    }
}

impl QueueConfig {
    /// Flush as soon as anything is pending.
    pub fn immediate() -> Self {
        Self {
            batch_window: Duration::ZERO,
            max_batch: 0,
        }
    }

    /// Set the batch window.
    pub fn batch_window(mut self, window: Duration) -> Self {
        self.batch_window = window;
        self
    }

    /// Set the maximum batch size.
    pub fn max_batch(mut self, max: usize) -> Self {
        self.max_batch = max;
        self
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

struct Pending<S> {
    transform: Transform<S>,
    on_acknowledged: Acknowledge,
}

/// Host that defers commits until a flush.
pub struct CommitQueue<S> {
    cell: StateCell<S>,
    pending: Mutex<VecDeque<Pending<S>>>,
    wake: Notify,
    config: QueueConfig,
}

impl<S: State> CommitQueue<S> {
    /// Create a queue over a fresh cell holding `initial`.
    pub fn new(initial: S, config: QueueConfig) -> Self {
        Self::with_cell(StateCell::new(initial), config)
    }

    /// Create a queue over an existing cell.
    pub fn with_cell(cell: StateCell<S>, config: QueueConfig) -> Self {
        Self {
            cell,
            pending: Mutex::new(VecDeque::new()),
            wake: Notify::new(),
            config,
        }
    }

    /// The cell holding committed state.
    pub fn cell(&self) -> &StateCell<S> {
        &self.cell
    }

    /// Latest committed snapshot. Pending commits are not reflected.
    pub fn get(&self) -> Arc<S> {
        self.cell.get()
    }

    /// Watch for committed snapshots.
    pub fn subscribe(&self) -> watch::Receiver<Arc<S>> {
        self.cell.subscribe()
    }

    /// Driver configuration.
    pub fn config(&self) -> QueueConfig {
        self.config
    }

    /// Number of commits waiting for a flush.
    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Whether no commits are waiting.
    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }

    /// Apply up to `max_batch` pending commits in issue order, then
    /// acknowledge them in the same order.
    ///
    /// Returns the number of commits processed.
    pub fn flush(&self) -> usize {
        let batch: Vec<Pending<S>> = {
            let mut pending = self.pending.lock();
            let take = match self.config.max_batch {
                0 => pending.len(),
                max => max.min(pending.len()),
            };
            pending.drain(..take).collect()
        };
        if batch.is_empty() {
            return 0;
        }

        let count = batch.len();
        let mut acks = Vec::with_capacity(count);
        for entry in batch {
            self.cell.apply(entry.transform);
            acks.push(entry.on_acknowledged);
        }
        for ack in acks {
            ack();
        }

        tracing::debug!(count, revision = self.cell.revision(), "flushed commit batch");
        count
    }

    /// Flush until nothing is pending.
    pub fn flush_all(&self) -> usize {
        let mut total = 0;
        loop {
            match self.flush() {
                0 => return total,
                n => total += n,
            }
        }
    }

    /// Drive flushing until `cancel` fires, then flush what is left.
    pub async fn run(&self, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = self.wake.notified() => {
                    if !self.config.batch_window.is_zero() {
                        tokio::select! {
                            _ = cancel.cancelled() => break,
                            _ = tokio::time::sleep(self.config.batch_window) => {}
                        }
                    }
                    self.flush_all();
                }
            }
        }

        let remaining = self.flush_all();
        tracing::debug!(remaining, "commit queue driver stopped");
    }

    /// Spawn [`CommitQueue::run`] on the current tokio runtime.
    pub fn spawn(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let queue = Arc::clone(self);
        tokio::spawn(async move { queue.run(cancel).await })
    }
}

impl<S: State> Commit<S> for CommitQueue<S> {
    fn commit(&self, transform: Transform<S>, on_acknowledged: Acknowledge) -> Result<(), Error> {
        self.pending.lock().push_back(Pending {
            transform,
            on_acknowledged,
        });
        self.wake.notify_one();
        Ok(())
    }
}

impl<S: fmt::Debug> fmt::Debug for CommitQueue<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommitQueue")
            .field("cell", &self.cell)
            .field("pending", &self.pending.lock().len())
            .field("config", &self.config)
            .finish()
    }
}
