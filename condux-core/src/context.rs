//! Context binding: providers, nearest-value reads and named actions
//!
//! [`build_context`] creates a [`Context`] around a [`SharedSlot`] of
//! [`DispatchableState`]. A [`Provider`] mounts a store, publishes its current
//! state and dispatch handle while rendering children, and any descendant
//! reads it back with [`Context::use_context`].
//!
//! # Example
//!
//! ```
//! use condux_core::{build_context, ContextOptions};
//! use serde::Serialize;
//!
//! #[derive(Clone, Debug, Default, Serialize)]
//! struct Todos {
//!     items: Vec<String>,
//! }
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let ctx = build_context(ContextOptions::<Todos>::new());
//! let provider = ctx.provider(None)?;
//!
//! let add = ctx.create_action("add", |text: String| {
//!     move |updater: condux_core::Updater<Todos>| async move {
//!         updater.produce(move |draft| draft.items.push(text)).await
//!     }
//! });
//!
//! // A descendant reads the nearest value and dispatches through it
//! let pending = provider.render(|| ctx.use_context().dispatch(add.call("milk".to_string())));
//! pending.await?;
//!
//! assert_eq!(provider.state().items, vec!["milk"]);
//! # Ok::<(), condux_core::Error>(())
//! # }).unwrap();
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

use crate::action::{self, NamedAction};
use crate::cell::StateCell;
use crate::commit::{Commit, State};
use crate::debug::{TraceConfig, Tracer};
use crate::dispatch::{create_dispatch, Dispatch, DispatchableState};
use crate::error::Error;
use crate::queue::{CommitQueue, QueueConfig};
use crate::reserved::check_reserved;
use crate::slot::SharedSlot;

/// Options for [`build_context`].
#[derive(Debug, Clone)]
pub struct ContextOptions<S> {
    /// Initial state for providers that are not given one
    pub initial: Option<S>,
    /// Diagnostics for actions and committed state
    pub trace: TraceConfig,
}

impl<S> Default for ContextOptions<S> {
    fn default() -> Self {
        Self {
            initial: None,
            trace: TraceConfig::default(),
        }
    }
}

impl<S> ContextOptions<S> {
    /// Options with no initial state and tracing disabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the shared initial state.
    pub fn initial(mut self, state: S) -> Self {
        self.initial = Some(state);
        self
    }

    /// Set the trace configuration.
    pub fn trace(mut self, trace: TraceConfig) -> Self {
        self.trace = trace;
        self
    }
}

/// Build a context for state type `S`.
pub fn build_context<S>(options: ContextOptions<S>) -> Context<S>
where
    S: State + Default + Serialize,
{
    let fallback = Arc::new(S::default());
    let default_value =
        DispatchableState::new(Arc::clone(&fallback), Dispatch::detached(fallback));

    Context {
        slot: Arc::new(SharedSlot::new(default_value)),
        initial: options.initial,
        tracer: Tracer::new(options.trace),
    }
}

/// A state context: shared slot, default initial state and tracer.
pub struct Context<S> {
    slot: Arc<SharedSlot<DispatchableState<S>>>,
    initial: Option<S>,
    tracer: Tracer,
}

impl<S> Clone for Context<S>
where
    S: Clone,
{
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
            initial: self.initial.clone(),
            tracer: self.tracer.clone(),
        }
    }
}

impl<S: fmt::Debug> fmt::Debug for Context<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("initial", &self.initial)
            .field("tracer", &self.tracer)
            .finish_non_exhaustive()
    }
}

impl<S> Context<S>
where
    S: State + Default + Serialize,
{
    /// Mount a provider whose commits apply immediately.
    ///
    /// `initial` overrides the context's initial state; with neither, the
    /// provider starts from `S::default()`.
    pub fn provider(&self, initial: Option<S>) -> Result<Provider<S>, Error> {
        let cell = Arc::new(StateCell::new(self.initial_state(initial)?));
        let commit: Arc<dyn Commit<S>> = Arc::clone(&cell) as Arc<dyn Commit<S>>;
        Ok(self.mount(Arc::clone(&cell), commit, None))
    }

    /// Mount a provider whose commits wait in a [`CommitQueue`].
    ///
    /// Nothing drives the queue by default; call [`CommitQueue::flush`] or
    /// [`CommitQueue::spawn`] on [`Provider::queue`].
    pub fn batched_provider(
        &self,
        initial: Option<S>,
        config: QueueConfig,
    ) -> Result<Provider<S>, Error> {
        let queue = Arc::new(CommitQueue::new(self.initial_state(initial)?, config));
        let commit: Arc<dyn Commit<S>> = Arc::clone(&queue) as Arc<dyn Commit<S>>;
        let reader = QueueReader(Arc::clone(&queue));
        Ok(self.mount(reader, commit, Some(queue)))
    }

    /// Nearest enclosing provider value, or the detached default.
    pub fn use_context(&self) -> DispatchableState<S> {
        self.slot.read_nearest()
    }

    /// Tag `callback` with `name` for tracing.
    pub fn create_action<F>(&self, name: impl Into<Arc<str>>, callback: F) -> NamedAction<F> {
        action::create_action(name, callback, self.tracer.clone())
    }

    /// Tag every callback in `actions` with its key.
    pub fn create_actions<K, F>(&self, actions: BTreeMap<K, F>) -> BTreeMap<K, NamedAction<F>>
    where
        K: Ord + AsRef<str>,
    {
        action::create_actions(actions, &self.tracer)
    }

    /// The context's tracer.
    pub fn tracer(&self) -> &Tracer {
        &self.tracer
    }

    fn initial_state(&self, initial: Option<S>) -> Result<S, Error> {
        let state = initial
            .or_else(|| self.initial.clone())
            .unwrap_or_default();
        check_reserved(&state)?;
        Ok(state)
    }

    fn mount<R>(
        &self,
        reader: R,
        commit: Arc<dyn Commit<S>>,
        queue: Option<Arc<CommitQueue<S>>>,
    ) -> Provider<S>
    where
        R: SnapshotSource<S>,
    {
        let cell = reader.cell_hooks();
        if self.tracer.config().should_trace_state() {
            let tracer = self.tracer.clone();
            cell.after_commit(move |snapshot: &Arc<S>| tracer.state(&**snapshot));
        }

        let subscriber = reader.subscribe();
        let source = Arc::new(reader);
        let read = Arc::clone(&source);
        let dispatch = create_dispatch(move || read.snapshot(), commit);
        tracing::debug!(binding = ?dispatch, "provider mounted");

        Provider {
            source,
            dispatch,
            slot: Arc::clone(&self.slot),
            subscriber,
            queue,
        }
    }
}

trait SnapshotSource<S>: Send + Sync + 'static {
    fn snapshot(&self) -> Arc<S>;
    fn subscribe(&self) -> watch::Receiver<Arc<S>>;
    fn cell_hooks(&self) -> &StateCell<S>;
}

impl<S: State> SnapshotSource<S> for Arc<StateCell<S>> {
    fn snapshot(&self) -> Arc<S> {
        self.get()
    }

    fn subscribe(&self) -> watch::Receiver<Arc<S>> {
        StateCell::subscribe(self)
    }

    fn cell_hooks(&self) -> &StateCell<S> {
        self
    }
}

struct QueueReader<S>(Arc<CommitQueue<S>>);

impl<S: State> SnapshotSource<S> for QueueReader<S> {
    fn snapshot(&self) -> Arc<S> {
        self.0.get()
    }

    fn subscribe(&self) -> watch::Receiver<Arc<S>> {
        self.0.subscribe()
    }

    fn cell_hooks(&self) -> &StateCell<S> {
        self.0.cell()
    }
}

/// A mounted store publishing its state into a context.
pub struct Provider<S> {
    source: Arc<dyn SnapshotSource<S>>,
    dispatch: Dispatch<S>,
    slot: Arc<SharedSlot<DispatchableState<S>>>,
    subscriber: watch::Receiver<Arc<S>>,
    queue: Option<Arc<CommitQueue<S>>>,
}

impl<S: State> Provider<S> {
    /// Current state paired with this provider's dispatch handle.
    pub fn value(&self) -> DispatchableState<S> {
        DispatchableState::new(self.source.snapshot(), self.dispatch.clone())
    }

    /// Latest committed snapshot.
    pub fn state(&self) -> Arc<S> {
        self.source.snapshot()
    }

    /// This provider's dispatch handle; stable for its whole lifetime.
    pub fn dispatch(&self) -> &Dispatch<S> {
        &self.dispatch
    }

    /// Run `children` with this provider's value as the nearest context value.
    pub fn render<R>(&self, children: impl FnOnce() -> R) -> R {
        self.slot.publish(self.value(), children)
    }

    /// Watch for committed snapshots (a re-render signal).
    pub fn subscribe(&self) -> watch::Receiver<Arc<S>> {
        self.subscriber.clone()
    }

    /// The commit queue, for providers made with [`Context::batched_provider`].
    pub fn queue(&self) -> Option<&Arc<CommitQueue<S>>> {
        self.queue.as_ref()
    }
}

impl<S: fmt::Debug> fmt::Debug for Provider<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("dispatch", &self.dispatch)
            .field("batched", &self.queue.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::Updater;
    use serde::Serialize;

    #[derive(Clone, Debug, Default, PartialEq, Serialize)]
    struct Counter {
        count: i32,
    }

    #[derive(Clone, Debug, Default, Serialize)]
    struct Reserved {
        dispatch: bool,
    }

    #[test]
    fn test_reserved_state_rejected_before_publish() {
        let ctx = build_context(ContextOptions::<Reserved>::new());
        let err = ctx.provider(Some(Reserved { dispatch: true })).unwrap_err();
        assert!(matches!(err, Error::ReservedFieldConflict));
        let fallback = ctx.use_context();
        assert!(!fallback.snapshot().dispatch);
    }

    #[test]
    fn test_reserved_static_initial_rejected() {
        let ctx = build_context(ContextOptions::new().initial(Reserved { dispatch: false }));
        assert!(matches!(ctx.provider(None), Err(Error::ReservedFieldConflict)));
    }

    #[test]
    fn test_initial_state_precedence() {
        let ctx = build_context(ContextOptions::new().initial(Counter { count: 5 }));
        assert_eq!(ctx.provider(None).unwrap().state().count, 5);
        assert_eq!(
            ctx.provider(Some(Counter { count: 9 })).unwrap().state().count,
            9
        );

        let bare = build_context(ContextOptions::<Counter>::new());
        assert_eq!(bare.provider(None).unwrap().state().count, 0);
    }

    #[test]
    fn test_render_publishes_value() {
        let ctx = build_context(ContextOptions::new().initial(Counter { count: 3 }));
        let provider = ctx.provider(None).unwrap();

        let seen = provider.render(|| {
            let value = ctx.use_context();
            assert!(value.dispatcher().ptr_eq(provider.dispatch()));
            value.count
        });
        assert_eq!(seen, 3);
    }

    #[tokio::test]
    async fn test_outside_provider_is_detached() {
        let ctx = build_context(ContextOptions::<Counter>::new());
        let value = ctx.use_context();
        assert_eq!(value.count, 0);

        let err = value
            .dispatch(|updater: Updater<Counter>| updater.produce(|draft| draft.count += 1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Detached));
    }

    #[tokio::test]
    async fn test_state_traced_per_commit() {
        let ctx = build_context(
            ContextOptions::<Counter>::new().trace(TraceConfig::enabled().log_capacity(8)),
        );
        let provider = ctx.provider(None).unwrap();

        provider
            .dispatch()
            .dispatch(|updater| updater.produce(|draft| draft.count = 2))
            .await
            .unwrap();

        let log = ctx.tracer().log().unwrap();
        let states: Vec<_> = log.states().map(|e| e.kind.clone()).collect();
        assert_eq!(
            states,
            vec![crate::debug::TraceKind::State {
                json: r#"{"count":2}"#.to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_batched_provider_waits_for_flush() {
        let ctx = build_context(ContextOptions::<Counter>::new());
        let provider = ctx
            .batched_provider(None, QueueConfig::default())
            .unwrap();

        let pending = provider
            .dispatch()
            .dispatch(|updater| updater.produce(|draft| draft.count += 1));
        assert_eq!(provider.state().count, 0);

        let queue = provider.queue().unwrap();
        assert_eq!(queue.flush(), 1);
        pending.await.unwrap();
        assert_eq!(provider.state().count, 1);
    }
}
