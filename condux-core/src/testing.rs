//! Test utilities for stores built on condux
//!
//! - [`DeferredAcks`]: host that applies commits immediately but holds every
//!   acknowledgement until the test releases it
//! - [`FailingCommit`]: host whose commit primitive always fails
//! - [`assert_pending!`](crate::assert_pending): assert a future has not
//!   resolved yet
//!
//! # Example
//!
//! ```
//! use condux_core::testing::DeferredAcks;
//! use condux_core::{produce_state, Draft};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let host = DeferredAcks::new(0u32);
//! let mut pending = Box::pin(produce_state(&host, |draft: &mut Draft<'_, u32>| **draft += 1));
//!
//! assert_eq!(*host.get(), 1);
//! condux_core::assert_pending!(pending);
//!
//! host.acknowledge_all();
//! pending.await.unwrap();
//! # });
//! ```

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::cell::StateCell;
use crate::commit::{Acknowledge, Commit, State, Transform};
use crate::error::Error;

/// Host that applies transforms at once and defers acknowledgement.
///
/// Readers observe every committed snapshot immediately; the update futures
/// stay pending until [`DeferredAcks::acknowledge_all`] (or one of its
/// siblings) releases them.
pub struct DeferredAcks<S> {
    cell: StateCell<S>,
    acks: Mutex<Vec<Acknowledge>>,
}

impl<S: State> DeferredAcks<S> {
    pub fn new(initial: S) -> Self {
        Self {
            cell: StateCell::new(initial),
            acks: Mutex::new(Vec::new()),
        }
    }

    /// The cell holding applied state.
    pub fn cell(&self) -> &StateCell<S> {
        &self.cell
    }

    /// Latest applied snapshot.
    pub fn get(&self) -> Arc<S> {
        self.cell.get()
    }

    /// Number of acknowledgements being held.
    pub fn pending_acks(&self) -> usize {
        self.acks.lock().len()
    }

    /// Release the oldest held acknowledgement.
    ///
    /// Returns `false` when nothing is held.
    pub fn acknowledge_next(&self) -> bool {
        let next = {
            let mut acks = self.acks.lock();
            if acks.is_empty() {
                None
            } else {
                Some(acks.remove(0))
            }
        };
        match next {
            Some(ack) => {
                ack();
                true
            }
            None => false,
        }
    }

    /// Release the newest held acknowledgement.
    ///
    /// Returns `false` when nothing is held.
    pub fn acknowledge_latest(&self) -> bool {
        let latest = self.acks.lock().pop();
        match latest {
            Some(ack) => {
                ack();
                true
            }
            None => false,
        }
    }

    /// Release every held acknowledgement in commit order.
    pub fn acknowledge_all(&self) -> usize {
        let acks = std::mem::take(&mut *self.acks.lock());
        let count = acks.len();
        for ack in acks {
            ack();
        }
        count
    }

    /// Release every held acknowledgement, newest first.
    pub fn acknowledge_reversed(&self) -> usize {
        let acks = std::mem::take(&mut *self.acks.lock());
        let count = acks.len();
        for ack in acks.into_iter().rev() {
            ack();
        }
        count
    }

    /// Drop every held acknowledgement without invoking it.
    pub fn abandon_all(&self) -> usize {
        let acks = std::mem::take(&mut *self.acks.lock());
        acks.len()
    }
}

impl<S: State> Commit<S> for DeferredAcks<S> {
    fn commit(&self, transform: Transform<S>, on_acknowledged: Acknowledge) -> Result<(), Error> {
        self.cell.apply(transform);
        self.acks.lock().push(on_acknowledged);
        Ok(())
    }
}

impl<S: fmt::Debug> fmt::Debug for DeferredAcks<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredAcks")
            .field("cell", &self.cell)
            .field("pending_acks", &self.acks.lock().len())
            .finish()
    }
}

/// Host whose commit primitive always fails with [`Error::Commit`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingCommit;

impl<S: State> Commit<S> for FailingCommit {
    fn commit(&self, _transform: Transform<S>, _on_acknowledged: Acknowledge) -> Result<(), Error> {
        Err(Error::commit("host rejected the commit"))
    }
}

/// Assert that a pinned future is still pending after a short wait.
///
/// The future must be `Unpin` (e.g. `Box::pin(..)`) so it can be polled
/// again afterwards.
///
/// # Example
///
/// ```
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let mut never = Box::pin(std::future::pending::<()>());
/// condux_core::assert_pending!(never);
/// # });
/// ```
#[macro_export]
macro_rules! assert_pending {
    ($fut:expr) => {
        $crate::assert_pending!($fut, 20)
    };
    ($fut:expr, $millis:expr) => {{
        let polled =
            ::tokio::time::timeout(::std::time::Duration::from_millis($millis), &mut $fut).await;
        assert!(polled.is_err(), "future resolved while it should be pending");
    }};
}
