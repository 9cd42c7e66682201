//! Typed errors for the harvest engine.
//!
//! Client errors are split by scope: everything except [`ClientError::Fatal`]
//! only ends the current source.

use thiserror::Error;

/// Failures reported by a [`RemoteSourceClient`](crate::harvest::types::RemoteSourceClient).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    #[error("source not found: {0}")]
    SourceNotFound(String),

    /// Private source or the session is not a member.
    #[error("source is private or forbidden: {0}")]
    SourceForbidden(String),

    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("transient fetch error: {0}")]
    Transient(String),

    /// Unusable connection (e.g. unauthenticated). Aborts the whole harvest.
    #[error("fatal client error: {0}")]
    Fatal(String),
}

impl ClientError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, ClientError::Fatal(_))
    }
}

/// Harvest-scoped failures; a harvest ending in one of these has no result.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HarvestError {
    #[error("no valid source identifiers provided")]
    NoSources,

    #[error(transparent)]
    Fatal(ClientError),

    #[error("harvest cancelled")]
    Cancelled,
}
