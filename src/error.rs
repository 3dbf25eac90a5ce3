use thiserror::Error;

/// Errors raised by the context registry.
#[non_exhaustive]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("context `{0}` is not provided")]
    ContextNotProvided(&'static str),

    #[error("context `{0}` is already provided")]
    ContextAlreadyProvided(&'static str),

    #[error("context `{name}` does not hold a `StateCell<{expected}>`")]
    ContextTypeMismatch {
        name: &'static str,
        expected: &'static str,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Error returned by [`StateCell::try_update`](crate::StateCell::try_update).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UpdateError<E> {
    /// The updater function failed. The cell was left unchanged.
    #[error("updater failed: {0}")]
    Updater(E),

    /// A fallible updater was issued from inside a notification pass.
    ///
    /// Re-entrant mutations are deferred until the pass completes, so there is no caller left to receive the failure.
    #[error("fallible update requested while observers are being notified")]
    Reentrant,
}
