//! Error types for the capability crate.

use thiserror::Error;

/// Result type alias for connector internals.
pub type Result<T> = std::result::Result<T, CapabilityError>;

/// Errors a connector may raise internally.
///
/// These never cross the dispatcher boundary: the dispatcher converts every
/// error into a failed [`crate::Outcome`] so one broken step cannot crash a
/// whole run.
#[derive(Debug, Error)]
pub enum CapabilityError {
    /// No credential bundle for the provider this connector needs.
    #[error("no credentials connected for provider '{0}'")]
    MissingCredentials(String),

    /// The credential bundle is missing a required field.
    #[error("credential bundle for '{provider}' is missing '{field}'")]
    MalformedCredentials {
        /// The provider name.
        provider: String,
        /// The missing field.
        field: String,
    },

    /// The arguments don't match what the connector expects.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// The external call failed.
    #[error("provider call failed: {0}")]
    Provider(String),

    /// Serialization failure while building or parsing a payload.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<reqwest::Error> for CapabilityError {
    fn from(err: reqwest::Error) -> Self {
        Self::Provider(err.to_string())
    }
}
