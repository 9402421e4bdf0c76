//! Error type shared by the update protocol, hosts and context binding

use thiserror::Error;

/// Boxed error carried by [`Error::Action`] and [`Error::Commit`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors produced while constructing providers or applying updates.
#[derive(Debug, Error)]
pub enum Error {
    /// The initial state already defines the reserved `dispatch` field.
    #[error("initial state defines the reserved `dispatch` field")]
    ReservedFieldConflict,

    /// A draft mutator or update action failed. Nothing was committed.
    #[error("update action failed: {0}")]
    Action(#[source] BoxError),

    /// The host's commit primitive rejected the update.
    #[error("commit failed: {0}")]
    Commit(#[source] BoxError),

    /// The host dropped the acknowledgement without invoking it.
    #[error("update was dropped by the host before it was acknowledged")]
    Abandoned,

    /// A commit was issued through a dispatch handle with no mounted provider.
    #[error("no provider is mounted for this context")]
    Detached,

    /// State could not be serialized for validation or tracing.
    #[error("failed to serialize state: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl Error {
    /// Wrap any error as an action failure.
    pub fn action(err: impl Into<BoxError>) -> Self {
        Self::Action(err.into())
    }

    /// Wrap any error as a commit failure.
    pub fn commit(err: impl Into<BoxError>) -> Self {
        Self::Commit(err.into())
    }

    /// Downcast the source of an [`Error::Action`] to a concrete type.
    ///
    /// Returns `None` for other variants or when the type does not match.
    pub fn action_source<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        match self {
            Self::Action(source) => source.downcast_ref::<E>(),
            _ => None,
        }
    }

    /// Whether this error came from the update itself rather than the host.
    pub fn is_action(&self) -> bool {
        matches!(self, Self::Action(_))
    }
}
