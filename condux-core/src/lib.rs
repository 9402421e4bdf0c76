//! Core update protocol and context binding for condux
//!
//! This crate provides an observable state container whose updates are
//! serialized, draft-based and asynchronous:
//!
//! # Core Concepts
//!
//! - **Commit**: the host's primitive that applies a transform and later
//!   acknowledges it ([`StateCell`] applies immediately, [`CommitQueue`]
//!   batches)
//! - **produce_state**: edit a [`Draft`] of the latest snapshot and resolve
//!   once the new snapshot is observable
//! - **Dispatch**: a stable handle that runs update actions against one store
//! - **Context**: a [`SharedSlot`] that providers publish into and any
//!   descendant reads from
//!
//! # Basic Example
//!
//! ```
//! use condux_core::prelude::*;
//! use serde::Serialize;
//!
//! #[derive(Clone, Debug, Default, Serialize)]
//! struct AppState {
//!     counter: i32,
//! }
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let ctx = build_context(ContextOptions::<AppState>::new());
//! let provider = ctx.provider(None)?;
//!
//! let counter = provider
//!     .dispatch()
//!     .dispatch(|updater| async move {
//!         updater.produce(|draft| draft.counter += 1).await?;
//!         Ok::<_, Error>(updater.state().counter)
//!     })
//!     .await?;
//!
//! assert_eq!(counter, 1);
//! # Ok::<(), Error>(())
//! # }).unwrap();
//! ```
//!
//! # Async Update Pattern
//!
//! An update action receives an [`Updater`] and may await anything between
//! productions. Each production reads the snapshot current at the time it is
//! applied, so edits issued by other actions in the meantime are never lost:
//!
//! ```ignore
//! let load = ctx.create_action("load", |id: u64| {
//!     move |updater: Updater<AppState>| async move {
//!         updater.produce(|draft| draft.loading = true).await?;
//!         let item = fetch(id).await.map_err(Error::action)?;
//!         updater
//!             .produce(move |draft| {
//!                 draft.loading = false;
//!                 draft.items.push(item);
//!             })
//!             .await
//!     }
//! });
//! ```

pub mod action;
pub mod cell;
pub mod commit;
pub mod context;
pub mod debug;
pub mod dispatch;
pub mod draft;
pub mod error;
pub mod queue;
pub mod reserved;
pub mod slot;
pub mod testing;

// Update protocol exports
pub use commit::{commit_fn, Acknowledge, Commit, CommitFn, State, Transform};
pub use dispatch::{
    create_dispatch, produce_state, try_produce_state, Dispatch, DispatchableState,
    MutatorPanicked, Updater,
};
pub use draft::Draft;
pub use error::{BoxError, Error};

// Host exports
pub use cell::StateCell;
pub use queue::{CommitQueue, QueueConfig};

// Context exports
pub use action::{create_action, create_actions, NamedAction};
pub use context::{build_context, Context, ContextOptions, Provider};
pub use reserved::{check_reserved, RESERVED_FIELD};
pub use slot::SharedSlot;

// Testing exports
pub use testing::{DeferredAcks, FailingCommit};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cell::StateCell;
    pub use crate::commit::{commit_fn, Commit, State};
    pub use crate::context::{build_context, Context, ContextOptions, Provider};
    pub use crate::debug::TraceConfig;
    pub use crate::dispatch::{
        create_dispatch, produce_state, try_produce_state, Dispatch, DispatchableState, Updater,
    };
    pub use crate::draft::Draft;
    pub use crate::error::Error;
    pub use crate::queue::{CommitQueue, QueueConfig};
}
