//! Update protocol: draft-based state production and dispatch
//!
//! Every state transition goes through [`produce_state`] (or
//! [`try_produce_state`]): the mutator edits a [`Draft`] of the current
//! snapshot inside a transform handed to the host's [`Commit`] primitive, and
//! the returned future resolves with the mutator's value only once the host
//! acknowledges the commit.
//!
//! [`create_dispatch`] binds a state accessor and a commit primitive into a
//! [`Dispatch`] handle. Each `dispatch` call runs an update action with a
//! fresh [`Updater`]; the action may produce state any number of times.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use condux_core::{create_dispatch, StateCell};
//!
//! #[derive(Clone, Default)]
//! struct Counter {
//!     count: i32,
//! }
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let cell = Arc::new(StateCell::new(Counter::default()));
//! let reader = Arc::clone(&cell);
//! let dispatch = create_dispatch(move || reader.get(), Arc::clone(&cell));
//!
//! let doubled = dispatch
//!     .dispatch(|updater| async move {
//!         updater.produce(|draft| draft.count += 1).await?;
//!         updater.produce(|draft| {
//!             draft.count *= 2;
//!             draft.count
//!         })
//!         .await
//!     })
//!     .await?;
//!
//! assert_eq!(doubled, 2);
//! assert_eq!(cell.get().count, 2);
//! # Ok::<(), condux_core::Error>(())
//! # }).unwrap();
//! ```

use std::any::Any;
use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::ops::Deref;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::commit::{commit_fn, Acknowledge, Commit, State, Transform};
use crate::draft::Draft;
use crate::error::{BoxError, Error};

/// Apply one infallible draft mutation through `commit`.
///
/// The commit is issued before this function returns, so issue order always
/// matches call order. The future resolves with the mutator's return value
/// once the host acknowledges the new snapshot.
pub fn produce_state<S, C, F, R>(
    commit: &C,
    mutator: F,
) -> impl Future<Output = Result<R, Error>> + Send + 'static
where
    S: State,
    C: Commit<S> + ?Sized,
    F: FnOnce(&mut Draft<'_, S>) -> R + Send + 'static,
    R: Send + 'static,
{
    try_produce_state(commit, move |draft: &mut Draft<'_, S>| {
        Ok::<R, Infallible>(mutator(draft))
    })
}

/// Apply one fallible draft mutation through `commit`.
///
/// When the mutator returns `Err` or panics, the draft is discarded, no
/// transition is committed and the future resolves to [`Error::Action`]
/// carrying that error (or [`MutatorPanicked`]).
/// A synchronous failure of `commit` itself resolves to the host's error.
pub fn try_produce_state<S, C, F, R, E>(
    commit: &C,
    mutator: F,
) -> impl Future<Output = Result<R, Error>> + Send + 'static
where
    S: State,
    C: Commit<S> + ?Sized,
    F: FnOnce(&mut Draft<'_, S>) -> Result<R, E> + Send + 'static,
    R: Send + 'static,
    E: Into<BoxError>,
{
    let outcome: Arc<Mutex<Option<Result<R, Error>>>> = Arc::new(Mutex::new(None));
    let (ack_tx, ack_rx) = oneshot::channel::<()>();

    let slot = Arc::clone(&outcome);
    let transform: Transform<S> = Box::new(move |current: &Arc<S>| {
        let mut draft = Draft::new(current);
        // A panicking mutator fails only its own update
        let ran = panic::catch_unwind(AssertUnwindSafe(|| mutator(&mut draft)));
        match ran {
            Ok(Ok(value)) => {
                *slot.lock() = Some(Ok(value));
                Some(draft.finish())
            }
            Ok(Err(err)) => {
                *slot.lock() = Some(Err(Error::action(err)));
                None
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::warn!(panic = %message, "draft mutator panicked");
                *slot.lock() = Some(Err(Error::action(MutatorPanicked(message))));
                None
            }
        }
    });
    let on_acknowledged: Acknowledge = Box::new(move || {
        let _ = ack_tx.send(());
    });

    let issued = commit.commit(transform, on_acknowledged);

    async move {
        let acknowledged = match issued {
            Ok(()) => ack_rx.await.is_ok(),
            Err(err) => {
                // A mutator failure that ran before the host bailed wins
                if let Some(Err(action_err)) = outcome.lock().take() {
                    return Err(action_err);
                }
                tracing::debug!(error = %err, "commit rejected update");
                return Err(err);
            }
        };

        let settled = outcome.lock().take();
        match settled {
            Some(Err(err)) => Err(err),
            Some(Ok(value)) if acknowledged => Ok(value),
            _ => Err(Error::Abandoned),
        }
    }
}

/// A draft mutator panicked; carried as the source of [`Error::Action`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("draft mutator panicked: {0}")]
pub struct MutatorPanicked(pub String);

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Build a dispatch handle from a state accessor and a commit primitive.
///
/// `get_state` is called on every read, so the handle always observes the
/// latest committed snapshot rather than one captured at construction.
pub fn create_dispatch<S, G, C>(get_state: G, commit: C) -> Dispatch<S>
where
    S: State,
    G: Fn() -> Arc<S> + Send + Sync + 'static,
    C: Commit<S> + 'static,
{
    Dispatch {
        inner: Arc::new(DispatchInner {
            get_state: Box::new(get_state),
            commit: Arc::new(commit),
        }),
    }
}

struct DispatchInner<S> {
    get_state: Box<dyn Fn() -> Arc<S> + Send + Sync>,
    commit: Arc<dyn Commit<S>>,
}

/// Entry point for all state transitions of one store.
///
/// Cloning is cheap and every clone is the same binding ([`Dispatch::ptr_eq`]).
pub struct Dispatch<S> {
    inner: Arc<DispatchInner<S>>,
}

impl<S> Clone for Dispatch<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S> fmt::Debug for Dispatch<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatch")
            .field("binding", &Arc::as_ptr(&self.inner))
            .finish()
    }
}

impl<S: State> Dispatch<S> {
    /// A handle with no store behind it.
    ///
    /// Reads always return `snapshot`; every commit fails with
    /// [`Error::Detached`].
    pub fn detached(snapshot: Arc<S>) -> Self {
        create_dispatch(
            move || Arc::clone(&snapshot),
            commit_fn(|_transform: Transform<S>, _ack: Acknowledge| Err(Error::Detached)),
        )
    }

    /// Run an update action with a fresh [`Updater`].
    ///
    /// Returns exactly the action's future; errors propagate unchanged.
    pub fn dispatch<F, Fut>(&self, action: F) -> Fut
    where
        F: FnOnce(Updater<S>) -> Fut,
        Fut: Future,
    {
        action(self.updater())
    }

    /// Capabilities handed to an update action.
    pub fn updater(&self) -> Updater<S> {
        Updater {
            dispatch: self.clone(),
        }
    }

    /// Latest committed snapshot.
    pub fn snapshot(&self) -> Arc<S> {
        (self.inner.get_state)()
    }

    /// Latest committed snapshot paired with this handle.
    pub fn state(&self) -> DispatchableState<S> {
        DispatchableState {
            state: self.snapshot(),
            dispatch: self.clone(),
        }
    }

    /// Whether two handles share the same binding.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Capabilities granted to an update action for one dispatch.
pub struct Updater<S> {
    dispatch: Dispatch<S>,
}

impl<S> Clone for Updater<S> {
    fn clone(&self) -> Self {
        Self {
            dispatch: self.dispatch.clone(),
        }
    }
}

impl<S> fmt::Debug for Updater<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Updater")
            .field("dispatch", &self.dispatch)
            .finish()
    }
}

impl<S: State> Updater<S> {
    /// Apply one draft mutation; see [`produce_state`].
    pub fn produce<F, R>(&self, mutator: F) -> impl Future<Output = Result<R, Error>> + Send + 'static
    where
        F: FnOnce(&mut Draft<'_, S>) -> R + Send + 'static,
        R: Send + 'static,
    {
        produce_state(&*self.dispatch.inner.commit, mutator)
    }

    /// Apply one fallible draft mutation; see [`try_produce_state`].
    pub fn try_produce<F, R, E>(
        &self,
        mutator: F,
    ) -> impl Future<Output = Result<R, Error>> + Send + 'static
    where
        F: FnOnce(&mut Draft<'_, S>) -> Result<R, E> + Send + 'static,
        R: Send + 'static,
        E: Into<BoxError>,
    {
        try_produce_state(&*self.dispatch.inner.commit, mutator)
    }

    /// Latest committed state, including the dispatch handle.
    pub fn state(&self) -> DispatchableState<S> {
        self.dispatch.state()
    }

    /// The dispatch handle this updater belongs to.
    pub fn dispatch(&self) -> &Dispatch<S> {
        &self.dispatch
    }
}

/// A committed snapshot plus the dispatch handle bound to its store.
///
/// Dereferences to the state, so fields read as `value.count`.
pub struct DispatchableState<S> {
    state: Arc<S>,
    dispatch: Dispatch<S>,
}

impl<S> Clone for DispatchableState<S> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            dispatch: self.dispatch.clone(),
        }
    }
}

impl<S: fmt::Debug> fmt::Debug for DispatchableState<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchableState")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<S> Deref for DispatchableState<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.state
    }
}

impl<S: State> DispatchableState<S> {
    /// Pair a snapshot with a dispatch handle.
    pub fn new(state: Arc<S>, dispatch: Dispatch<S>) -> Self {
        Self { state, dispatch }
    }

    /// The snapshot this value was read at.
    pub fn snapshot(&self) -> &Arc<S> {
        &self.state
    }

    /// The bound dispatch handle.
    pub fn dispatcher(&self) -> &Dispatch<S> {
        &self.dispatch
    }

    /// Shorthand for `self.dispatcher().dispatch(action)`.
    pub fn dispatch<F, Fut>(&self, action: F) -> Fut
    where
        F: FnOnce(Updater<S>) -> Fut,
        Fut: Future,
    {
        self.dispatch.dispatch(action)
    }
}
