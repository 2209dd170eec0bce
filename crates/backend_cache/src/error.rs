// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Error types shared by the backend capability traits and the caching decorators.

use std::{error::Error as StdError, sync::Arc};

/// An error reported by a backend capability or surfaced through a cached value.
///
/// Cached async values are shared between every caller waiting on the same key, so the
/// error has to be cheaply clonable. Foreign error types are therefore kept behind an [`Arc`].
///
/// # Examples
///
/// ```
/// use backend_cache::Error;
///
/// let error = Error::backend("service unavailable");
/// assert!(!error.is_cancelled());
/// assert!(Error::Cancelled.is_cancelled());
/// ```
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The operation was aborted through its cancellation signal.
    #[error("the operation was cancelled")]
    Cancelled,

    /// The requested object does not exist on the backend.
    #[error("not found: {what}")]
    NotFound {
        /// Description of the object that was not found.
        what: String,
    },

    /// The backend reported a failure.
    #[error("backend error: {message}")]
    Backend {
        /// Message describing the failure.
        message: String,
    },

    /// Any other failure raised by a backend implementation.
    #[error(transparent)]
    Other(Arc<dyn StdError + Send + Sync>),
}

impl Error {
    /// Creates a [`Error::Backend`] error from a message.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend { message: message.into() }
    }

    /// Creates a [`Error::NotFound`] error describing the missing object.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Wraps an arbitrary error raised by a backend implementation.
    pub fn other(source: impl StdError + Send + Sync + 'static) -> Self {
        Self::Other(Arc::new(source))
    }

    /// Returns `true` if this error is an abort-class error.
    ///
    /// The check walks the source chain of wrapped errors, so a backend that nests
    /// [`Error::Cancelled`] inside its own error type is still recognized.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::Other(source) => {
                let mut current: Option<&(dyn StdError + 'static)> = Some(source.as_ref());
                while let Some(error) = current {
                    if matches!(error.downcast_ref::<Self>(), Some(Self::Cancelled)) {
                        return true;
                    }
                    current = error.source();
                }
                false
            }
            Self::NotFound { .. } | Self::Backend { .. } => false,
        }
    }
}

/// Returns `true` if `error` is an abort-class error.
///
/// Abort errors get stronger invalidation than ordinary failures: the top-level execution
/// cache entry is dropped because the backend's cancellation token cannot be reused.
#[must_use]
pub fn is_abort_error(error: &Error) -> bool {
    error.is_cancelled()
}

/// A specialized [`Result`](std::result::Result) type for backend and cache operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;
