//! Error Handling Module
//!
//! Domain error taxonomy for the matching engine. The HTTP layer consuming
//! this crate maps these onto status codes (NotFound → 404, Store → 500);
//! this crate only distinguishes what the caller can act on.
//!
//! Two failure modes deliberately do NOT appear here because they are
//! swallowed at the boundary where they occur:
//! - notification dispatch failure (fire-and-forget, logged only)
//! - a single demand failing inside the bulk refresh sweep (logged, skipped)

use thiserror::Error;

/// Errors surfaced by [`crate::services::MatchingService`].
#[derive(Debug, Error)]
pub enum MatchError {
    /// The referenced demand listing or match row does not exist
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Underlying store read/write failure, propagated unchanged.
    /// The matcher adds no retries; that is the store's contract.
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl MatchError {
    /// True for errors the caller caused (bad id), false for system faults.
    pub fn is_not_found(&self) -> bool {
        matches!(self, MatchError::NotFound(_))
    }
}
