//! Diagnostic tracing of action invocations and committed state
//!
//! When enabled, a context traces two kinds of events through `tracing`:
//!
//! - **Actions**: the name and `Debug` arguments of every [`NamedAction`]
//!   call, filtered by glob patterns
//! - **State**: the JSON rendering of every committed snapshot
//!
//! Events can also be kept in an in-memory [`TraceLog`] ring buffer, which is
//! what tests and debug views read back.
//!
//! ```
//! use condux_core::debug::{TraceConfig, Tracer};
//!
//! let tracer = Tracer::new(TraceConfig::enabled().log_capacity(16));
//! tracer.action("increment", &(1,));
//!
//! let log = tracer.log().unwrap();
//! assert_eq!(log.len(), 1);
//! assert_eq!(log.entries().next().unwrap().label(), "increment");
//! ```
//!
//! [`NamedAction`]: crate::action::NamedAction

mod config;
mod trace_log;
mod tracer;

pub use config::{glob_match, TraceConfig};
pub use trace_log::{TraceEntry, TraceKind, TraceLog};
pub use tracer::Tracer;
