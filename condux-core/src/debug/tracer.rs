//! Tracing emitter shared by a context, its providers and its actions

use std::fmt::Debug;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use serde::Serialize;

use super::config::TraceConfig;
use super::trace_log::{TraceKind, TraceLog};

/// Cloneable handle that emits trace events and optionally records them.
///
/// Every clone writes to the same [`TraceLog`].
#[derive(Debug, Clone)]
pub struct Tracer {
    config: Arc<TraceConfig>,
    log: Option<Arc<Mutex<TraceLog>>>,
}

impl Default for Tracer {
    fn default() -> Self {
        Self::new(TraceConfig::default())
    }
}

impl Tracer {
    pub fn new(config: TraceConfig) -> Self {
        let log = (config.enabled && config.log_capacity > 0)
            .then(|| Arc::new(Mutex::new(TraceLog::new(config.log_capacity))));
        Self {
            config: Arc::new(config),
            log,
        }
    }

    pub fn config(&self) -> &TraceConfig {
        &self.config
    }

    /// Whether anything is traced at all.
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Trace an action invocation, if `name` passes the filter.
    pub fn action<A: Debug + ?Sized>(&self, name: &str, args: &A) {
        if !self.config.should_trace(name) {
            return;
        }
        let args = format!("{args:?}");
        tracing::debug!(action = %name, args = %args, "action");
        self.record(TraceKind::Action {
            name: name.to_string(),
            args,
        });
    }

    /// Trace a committed snapshot.
    ///
    /// Serialization failures are logged and otherwise ignored; tracing never
    /// affects the commit itself.
    pub fn state<S: Serialize + ?Sized>(&self, state: &S) {
        if !self.config.should_trace_state() {
            return;
        }
        match serde_json::to_string(state) {
            Ok(json) => {
                tracing::debug!(state = %json, "state committed");
                self.record(TraceKind::State { json });
            }
            Err(err) => tracing::warn!(error = %err, "failed to serialize state for tracing"),
        }
    }

    /// The in-memory log, when one is kept.
    pub fn log(&self) -> Option<MutexGuard<'_, TraceLog>> {
        self.log.as_ref().map(|log| log.lock())
    }

    fn record(&self, kind: TraceKind) {
        if let Some(log) = &self.log {
            log.lock().record(kind);
        }
    }
}
