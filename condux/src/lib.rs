//! condux: observable shared state with serialized, draft-based async updates
//!
//! A provider owns a snapshot and a dispatch handle. Update actions edit
//! drafts of the latest snapshot; every edit is committed by the host in issue
//! order and each update resolves only once its result is observable.
//!
//! # Example
//! ```
//! use condux::prelude::*;
//! use serde::Serialize;
//!
//! #[derive(Clone, Debug, Default, Serialize)]
//! struct Cart {
//!     items: Vec<String>,
//! }
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let ctx = build_context(ContextOptions::<Cart>::new());
//! let provider = ctx.provider(None)?;
//!
//! provider
//!     .render(|| {
//!         ctx.use_context()
//!             .dispatch(|updater| updater.produce(|draft| draft.items.push("tea".into())))
//!     })
//!     .await?;
//!
//! assert_eq!(provider.state().items, vec!["tea"]);
//! # Ok::<(), Error>(())
//! # }).unwrap();
//! ```

// Re-export everything from core
pub use condux_core::*;

/// Prelude for convenient imports
pub mod prelude {
    // Update protocol
    pub use condux_core::{
        commit_fn, create_dispatch, produce_state, try_produce_state, Commit, Dispatch,
        DispatchableState, Draft, Error, State, Updater,
    };

    // Hosts
    pub use condux_core::{CommitQueue, QueueConfig, StateCell};

    // Context binding
    pub use condux_core::{build_context, Context, ContextOptions, NamedAction, Provider};

    // Debug
    pub use condux_core::debug::{TraceConfig, Tracer};
}
