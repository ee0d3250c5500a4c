//! Agent executor errors.

use relay_types::StoreError;
use thiserror::Error;

/// Errors from the oracle backing the reasoning loop.
#[derive(Debug, Error)]
pub enum OracleError {
    /// The oracle did not answer within the configured deadline.
    #[error("oracle did not respond within {0}s")]
    Timeout(u64),

    /// The backing service failed.
    #[error("oracle backend error: {0}")]
    Backend(String),

    /// The oracle's reply could not be interpreted.
    #[error("malformed oracle reply: {0}")]
    Malformed(String),
}

/// Errors that abort an agent run outright.
///
/// Capability failures are not here; a failed dispatch feeds the failure
/// counter and, past the threshold, fails the run itself.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The oracle failed or timed out.
    #[error(transparent)]
    Oracle(#[from] OracleError),

    /// The backing store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
