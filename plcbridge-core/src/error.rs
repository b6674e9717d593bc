//! Error types for the bridge core.

use thiserror::Error;

/// Result type alias for bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors raised by the core and by the collaborators it drives.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// A collaborator could not be reached at connect or disconnect time.
    #[error("{target} is not available: {reason}")]
    Connectivity { target: String, reason: String },

    /// Registering for status-change notifications failed.
    #[error("unable to subscribe to {address}: {reason}")]
    Subscription { address: String, reason: String },

    /// An inbound command could not be decoded.
    #[error("malformed command: {0}")]
    MalformedCommand(String),

    /// Missing or malformed required settings.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// A register comparison needed a number and got something else.
    #[error("register update for {key} skipped: {value:?} is not numeric")]
    AggregationType { key: String, value: String },

    /// Reading a single variable failed.
    #[error("failed to read {address}: {reason}")]
    Read { address: String, reason: String },

    /// Publishing a payload failed.
    #[error("failed to publish to {topic}: {reason}")]
    Publish { topic: String, reason: String },

    /// The location collaborator did not answer.
    #[error("location lookup failed: {0}")]
    Location(String),

    /// The lifecycle call does not apply in the current state.
    #[error("controller is {actual}, expected {expected}")]
    InvalidState {
        expected: &'static str,
        actual: &'static str,
    },

    /// History store I/O failed.
    #[error("history store I/O error: {0}")]
    Storage(#[from] std::io::Error),

    /// A record could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BridgeError {
    /// Shorthand for a [`BridgeError::Connectivity`] error.
    pub fn connectivity(target: impl Into<String>, reason: impl ToString) -> Self {
        BridgeError::Connectivity {
            target: target.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether the error must terminate the owning lifecycle call.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BridgeError::Connectivity { .. }
                | BridgeError::Subscription { .. }
                | BridgeError::Configuration(_)
        )
    }
}
