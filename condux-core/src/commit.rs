//! Host boundary for committing state transitions
//!
//! The update protocol never replaces state itself. It hands the host a
//! [`Transform`] plus an [`Acknowledge`] callback, and the host decides when
//! the transform runs and when the new value counts as observable.

use std::sync::Arc;

use crate::error::Error;

/// Marker trait for application state held by a store.
///
/// Snapshots are shared as `Arc<S>` and replaced wholesale on every update,
/// so state must be cheap to share across tasks and cloneable for drafting.
pub trait State: Clone + Send + Sync + 'static {}

impl<T> State for T where T: Clone + Send + Sync + 'static {}

/// Pure mapping from the current snapshot to the next one.
///
/// Returns `None` when the update produced no transition (the mutator failed),
/// in which case the host must keep the current snapshot.
pub type Transform<S> = Box<dyn FnOnce(&Arc<S>) -> Option<Arc<S>> + Send>;

/// Callback the host invokes once the new snapshot is externally observable.
pub type Acknowledge = Box<dyn FnOnce() + Send>;

/// Commit primitive supplied by the host.
///
/// Implementations must:
/// - run each transform at most once, against the latest snapshot at the time
///   it runs
/// - invoke `on_acknowledged` strictly after the resulting snapshot (if any)
///   is visible to readers
/// - either invoke or drop every acknowledgement; dropping it resolves the
///   pending update as [`Error::Abandoned`]
///
/// Returning `Err` means the transform was not scheduled.
pub trait Commit<S>: Send + Sync {
    /// Schedule `transform` and acknowledge through `on_acknowledged`.
    fn commit(&self, transform: Transform<S>, on_acknowledged: Acknowledge) -> Result<(), Error>;
}

impl<S, C> Commit<S> for Arc<C>
where
    C: Commit<S> + ?Sized,
{
    fn commit(&self, transform: Transform<S>, on_acknowledged: Acknowledge) -> Result<(), Error> {
        (**self).commit(transform, on_acknowledged)
    }
}

/// Adapter turning a plain function into a [`Commit`] primitive.
///
/// ```
/// use condux_core::{commit_fn, Acknowledge, Commit, Error, Transform};
///
/// let refuse = commit_fn(|_t: Transform<u32>, _ack: Acknowledge| {
///     Err(Error::commit("read only"))
/// });
/// let transform: Transform<u32> = Box::new(|s| Some(s.clone()));
/// assert!(refuse.commit(transform, Box::new(|| {})).is_err());
/// ```
#[derive(Clone, Copy)]
pub struct CommitFn<F>(F);

/// Wrap `f` as a [`Commit`] primitive.
pub fn commit_fn<S, F>(f: F) -> CommitFn<F>
where
    F: Fn(Transform<S>, Acknowledge) -> Result<(), Error> + Send + Sync,
{
    CommitFn(f)
}

impl<S, F> Commit<S> for CommitFn<F>
where
    F: Fn(Transform<S>, Acknowledge) -> Result<(), Error> + Send + Sync,
{
    fn commit(&self, transform: Transform<S>, on_acknowledged: Acknowledge) -> Result<(), Error> {
        (self.0)(transform, on_acknowledged)
    }
}

impl<F> std::fmt::Debug for CommitFn<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CommitFn")
    }
}
