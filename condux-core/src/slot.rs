//! Broadcast slot: a value visible to everything rendered beneath it
//!
//! A [`SharedSlot`] is the context mechanism of the component tree. A
//! provider publishes a value for the duration of rendering its children and
//! any descendant reads the nearest published value, however deep it sits.
//! Outside every publish the slot's default is returned.
//!
//! Published values live on a per-thread stack keyed by slot, so nested
//! publishes shadow outer ones and are popped when their children return
//! (or unwind).
//!
//! ```
//! use condux_core::SharedSlot;
//!
//! let theme = SharedSlot::new("light");
//! assert_eq!(theme.read_nearest(), "light");
//!
//! theme.publish("dark", || {
//!     assert_eq!(theme.read_nearest(), "dark");
//!     theme.publish("contrast", || assert_eq!(theme.read_nearest(), "contrast"));
//!     assert_eq!(theme.read_nearest(), "dark");
//! });
//! assert_eq!(theme.read_nearest(), "light");
//! ```

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_SLOT_ID: AtomicU64 = AtomicU64::new(0);

thread_local! {
    static PUBLISHED: RefCell<HashMap<u64, Vec<Box<dyn Any>>>> = RefCell::new(HashMap::new());
}

/// Broadcastable value cell with a default.
pub struct SharedSlot<T> {
    id: u64,
    default: T,
}

impl<T: Clone + 'static> SharedSlot<T> {
    /// Create a slot whose value outside any publish is `default`.
    pub fn new(default: T) -> Self {
        Self {
            id: NEXT_SLOT_ID.fetch_add(1, Ordering::Relaxed),
            default,
        }
    }

    /// Make `value` the nearest value while `children` runs.
    pub fn publish<R>(&self, value: T, children: impl FnOnce() -> R) -> R {
        PUBLISHED.with(|published| {
            published
                .borrow_mut()
                .entry(self.id)
                .or_default()
                .push(Box::new(value));
        });
        let _scope = PublishScope::<T> {
            id: self.id,
            _value: PhantomData,
        };
        children()
    }

    /// The closest enclosing published value, or the default.
    pub fn read_nearest(&self) -> T {
        PUBLISHED.with(|published| {
            published
                .borrow()
                .get(&self.id)
                .and_then(|stack| stack.last())
                .and_then(|value| value.downcast_ref::<T>())
                .cloned()
                .unwrap_or_else(|| self.default.clone())
        })
    }

    /// Number of enclosing publishes on this thread.
    pub fn depth(&self) -> usize {
        PUBLISHED.with(|published| published.borrow().get(&self.id).map_or(0, Vec::len))
    }

    /// The value returned outside any publish.
    pub fn default_value(&self) -> &T {
        &self.default
    }
}

impl<T: fmt::Debug> fmt::Debug for SharedSlot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedSlot")
            .field("id", &self.id)
            .field("default", &self.default)
            .finish()
    }
}

/// Pops the published value when the children scope ends.
struct PublishScope<T> {
    id: u64,
    _value: PhantomData<fn() -> T>,
}

impl<T> Drop for PublishScope<T> {
    fn drop(&mut self) {
        // Ignore access errors during thread teardown
        let _ = PUBLISHED.try_with(|published| {
            let mut published = published.borrow_mut();
            if let Some(stack) = published.get_mut(&self.id) {
                stack.pop();
                if stack.is_empty() {
                    published.remove(&self.id);
                }
            }
        });
    }
}
