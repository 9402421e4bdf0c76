//! Copy-on-write drafts over immutable snapshots
//!
//! A [`Draft`] lets a mutator edit a snapshot with ordinary `&mut` access while
//! the snapshot itself stays untouched. Reads go straight to the base value;
//! the first write clones it once and all further edits hit the copy.
//!
//! Nested data is shared rather than cloned when it lives behind an `Arc`:
//! cloning the state only bumps reference counts, and `Arc::make_mut` on the
//! draft copies just the branch being written.
//!
//! ```
//! use std::sync::Arc;
//! use condux_core::Draft;
//!
//! #[derive(Clone)]
//! struct Doc {
//!     title: String,
//!     tags: Arc<Vec<String>>,
//! }
//!
//! let base = Arc::new(Doc { title: "a".into(), tags: Arc::new(vec!["x".into()]) });
//! let mut draft = Draft::new(&base);
//! draft.title.push('b');
//!
//! let next = draft.finish();
//! assert_eq!(base.title, "a");
//! assert_eq!(next.title, "ab");
//! // Untouched branch is shared, not copied
//! assert!(Arc::ptr_eq(&base.tags, &next.tags));
//! ```

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// Mutable, scoped projection of a snapshot.
///
/// The lifetime ties the draft to the snapshot it was made from, so it cannot
/// outlive the mutator call that receives it.
pub struct Draft<'a, S: Clone> {
    base: &'a Arc<S>,
    copy: Option<S>,
}

impl<'a, S: Clone> Draft<'a, S> {
    /// Start a draft of `base`. Nothing is cloned until the first write.
    pub fn new(base: &'a Arc<S>) -> Self {
        Self { base, copy: None }
    }

    /// The snapshot this draft was created from.
    pub fn base(&self) -> &S {
        &**self.base
    }

    /// Whether any mutable access has happened yet.
    pub fn is_modified(&self) -> bool {
        self.copy.is_some()
    }

    /// Replace the whole drafted value.
    pub fn replace(&mut self, value: S) {
        self.copy = Some(value);
    }

    /// Produce the next snapshot.
    ///
    /// Always allocates a fresh `Arc`, even when nothing was written, so the
    /// result never aliases the base snapshot.
    pub fn finish(self) -> Arc<S> {
        match self.copy {
            Some(copy) => Arc::new(copy),
            None => Arc::new(S::clone(self.base)),
        }
    }
}

impl<S: Clone> Deref for Draft<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        match &self.copy {
            Some(copy) => copy,
            None => &**self.base,
        }
    }
}

impl<S: Clone> DerefMut for Draft<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        let base = self.base;
        self.copy.get_or_insert_with(|| S::clone(base))
    }
}

impl<S: Clone + fmt::Debug> fmt::Debug for Draft<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Draft")
            .field("value", &**self)
            .field("modified", &self.is_modified())
            .finish()
    }
}
