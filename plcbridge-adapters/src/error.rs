//! Error types for adapters.

use plcbridge_core::BridgeError;
use thiserror::Error;

/// Errors raised while talking to an external system.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Failed to parse response.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Authentication failed.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Connection failed.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Timeout waiting for response.
    #[error("Request timed out")]
    Timeout,

    /// The adapter was used before `connect` or after `disconnect`.
    #[error("Not connected")]
    NotConnected,
}

impl AdapterError {
    /// Report as a failure to reach `target`.
    pub fn into_connectivity(self, target: &str) -> BridgeError {
        BridgeError::connectivity(target, self)
    }

    /// Report as a failed read of `address`.
    pub fn into_read(self, address: &str) -> BridgeError {
        BridgeError::Read {
            address: address.to_string(),
            reason: self.to_string(),
        }
    }

    /// Report as a failed subscription to `address`.
    pub fn into_subscription(self, address: &str) -> BridgeError {
        BridgeError::Subscription {
            address: address.to_string(),
            reason: self.to_string(),
        }
    }

    /// Report as a failed publish to `topic`.
    pub fn into_publish(self, topic: &str) -> BridgeError {
        BridgeError::Publish {
            topic: topic.to_string(),
            reason: self.to_string(),
        }
    }
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for AdapterError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AdapterError::Timeout
        } else if err.is_connect() {
            AdapterError::Connection(err.to_string())
        } else {
            AdapterError::Http(err.to_string())
        }
    }
}
