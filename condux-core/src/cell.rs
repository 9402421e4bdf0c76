//! Immediate host: a serialized, observable state cell
//!
//! [`StateCell`] applies each transform as soon as it is committed, publishes
//! the new snapshot to watchers, runs the after-commit hooks and only then
//! acknowledges. Commits from concurrent tasks are serialized by a commit
//! lock, so each transform sees every edit committed before it.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;

use crate::commit::{Acknowledge, Commit, State, Transform};
use crate::error::Error;

type Hook<S> = Box<dyn Fn(&Arc<S>) + Send + Sync>;

/// Mutex-serialized state cell with notify-after-write.
pub struct StateCell<S> {
    current: watch::Sender<Arc<S>>,
    commit_lock: Mutex<()>,
    hooks: RwLock<Vec<Hook<S>>>,
    revision: AtomicU64,
}

impl<S: State> StateCell<S> {
    /// Create a cell holding `initial`.
    pub fn new(initial: S) -> Self {
        Self::from_snapshot(Arc::new(initial))
    }

    /// Create a cell from an existing snapshot.
    pub fn from_snapshot(snapshot: Arc<S>) -> Self {
        let (current, _) = watch::channel(snapshot);
        Self {
            current,
            commit_lock: Mutex::new(()),
            hooks: RwLock::new(Vec::new()),
            revision: AtomicU64::new(0),
        }
    }

    /// Latest committed snapshot.
    pub fn get(&self) -> Arc<S> {
        Arc::clone(&self.current.borrow())
    }

    /// Number of transitions committed so far.
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::Acquire)
    }

    /// Watch for new snapshots.
    ///
    /// The receiver is marked changed after every committed transition.
    pub fn subscribe(&self) -> watch::Receiver<Arc<S>> {
        self.current.subscribe()
    }

    /// Register a hook invoked after every committed transition.
    ///
    /// Hooks run in commit order, under the commit lock and before the
    /// transition is acknowledged. They must not commit to this cell.
    pub fn after_commit<F>(&self, hook: F)
    where
        F: Fn(&Arc<S>) + Send + Sync + 'static,
    {
        self.hooks.write().push(Box::new(hook));
    }

    /// Run `transform` against the latest snapshot and publish the result.
    ///
    /// Returns the new snapshot, or `None` when the transform produced no
    /// transition. Does not acknowledge anything.
    pub(crate) fn apply(&self, transform: Transform<S>) -> Option<Arc<S>> {
        let _guard = self.commit_lock.lock();
        let current = self.get();
        let next = transform(&current)?;
        self.current.send_replace(Arc::clone(&next));

        let revision = self.revision.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::trace!(revision, "state committed");

        // Still under the commit lock, so hooks observe commits in order
        for hook in self.hooks.read().iter() {
            hook(&next);
        }
        Some(next)
    }
}

impl<S: State> Commit<S> for StateCell<S> {
    fn commit(&self, transform: Transform<S>, on_acknowledged: Acknowledge) -> Result<(), Error> {
        self.apply(transform);
        on_acknowledged();
        Ok(())
    }
}

impl<S: fmt::Debug> fmt::Debug for StateCell<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateCell")
            .field("current", &*self.current.borrow())
            .field("revision", &self.revision.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}
