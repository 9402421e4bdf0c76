//! Named update actions with optional invocation tracing
//!
//! An action callback takes its arguments and returns an update action (a
//! closure over [`Updater`](crate::Updater)) ready to be dispatched. Wrapping
//! it in a [`NamedAction`] gives it a name for diagnostics without changing
//! what it returns or how it fails.
//!
//! ```
//! use condux_core::action::create_action;
//! use condux_core::debug::Tracer;
//!
//! let add = create_action("add", |(a, b): (i32, i32)| a + b, Tracer::default());
//! assert_eq!(add.name(), "add");
//! assert_eq!(add.call((2, 3)), 5);
//! ```

use std::collections::BTreeMap;
use std::fmt::{self, Debug};
use std::sync::Arc;

use crate::debug::Tracer;

/// A callback tagged with a diagnostic name.
pub struct NamedAction<F> {
    name: Arc<str>,
    callback: F,
    tracer: Tracer,
}

impl<F> NamedAction<F> {
    /// The name used in traces.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke the callback.
    ///
    /// Traces the name and `args` first when tracing is enabled, then returns
    /// exactly what the callback returns.
    pub fn call<A, U>(&self, args: A) -> U
    where
        F: Fn(A) -> U,
        A: Debug,
    {
        self.tracer.action(&self.name, &args);
        (self.callback)(args)
    }

    /// The wrapped callback.
    pub fn callback(&self) -> &F {
        &self.callback
    }

    /// Unwrap the callback.
    pub fn into_inner(self) -> F {
        self.callback
    }
}

impl<F: Clone> Clone for NamedAction<F> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            callback: self.callback.clone(),
            tracer: self.tracer.clone(),
        }
    }
}

impl<F> Debug for NamedAction<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedAction")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Tag `callback` with `name`, tracing its invocations through `tracer`.
pub fn create_action<F>(name: impl Into<Arc<str>>, callback: F, tracer: Tracer) -> NamedAction<F> {
    NamedAction {
        name: name.into(),
        callback,
        tracer,
    }
}

/// Wrap every callback in `actions`, using its key as the name.
///
/// The map is consumed and returned upgraded, so no unwrapped callback stays
/// reachable through it.
pub fn create_actions<K, F>(actions: BTreeMap<K, F>, tracer: &Tracer) -> BTreeMap<K, NamedAction<F>>
where
    K: Ord + AsRef<str>,
{
    actions
        .into_iter()
        .map(|(key, callback)| {
            let action = create_action(key.as_ref(), callback, tracer.clone());
            (key, action)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debug::{TraceConfig, TraceKind};

    #[derive(Debug, PartialEq)]
    struct Rejected(&'static str);

    fn recording() -> Tracer {
        Tracer::new(TraceConfig::enabled().log_capacity(16))
    }

    #[test]
    fn test_call_returns_callback_value() {
        let action = create_action("square", |n: i32| n * n, Tracer::default());
        assert_eq!(action.call(7), 49);
    }

    #[test]
    fn test_call_passes_errors_through() {
        let action = create_action(
            "validate",
            |n: i32| {
                if n < 0 {
                    Err(Rejected("negative"))
                } else {
                    Ok(n)
                }
            },
            Tracer::default(),
        );
        assert_eq!(action.call(3), Ok(3));
        assert_eq!(action.call(-1), Err(Rejected("negative")));
    }

    #[test]
    fn test_call_traces_name_and_args() {
        let tracer = recording();
        let action = create_action("rename", |(id, _label): (u32, &str)| id, tracer.clone());
        action.call((4, "inbox"));

        let log = tracer.log().unwrap();
        let entry = log.actions().next().unwrap();
        assert_eq!(
            entry.kind,
            TraceKind::Action {
                name: "rename".to_string(),
                args: r#"(4, "inbox")"#.to_string(),
            }
        );
    }

    #[test]
    fn test_create_actions_uses_keys() {
        let tracer = recording();
        let mut map: BTreeMap<&str, fn(i32) -> i32> = BTreeMap::new();
        map.insert("inc", |n| n + 1);
        map.insert("dec", |n| n - 1);

        let actions = create_actions(map, &tracer);
        assert_eq!(actions["inc"].name(), "inc");
        assert_eq!(actions["inc"].call(1), 2);
        assert_eq!(actions["dec"].call(1), 0);

        let names: Vec<_> = tracer
            .log()
            .unwrap()
            .actions()
            .map(|e| e.label().to_string())
            .collect();
        assert_eq!(names, vec!["inc", "dec"]);
    }

    #[test]
    fn test_into_inner() {
        let action = create_action("id", |n: u8| n, Tracer::default());
        let callback = action.into_inner();
        assert_eq!(callback(5), 5);
    }
}
