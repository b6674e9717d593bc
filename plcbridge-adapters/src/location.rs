//! Location lookup against the gateway's management endpoint.
//!
//! The endpoint answers `GET` with the receiver's raw readings:
//!
//! ```json
//! {"latitude": "50.0812", "longitude": "14.4253", "timestamp": "2024-01-01 10:00:00"}
//! ```
//!
//! Coordinates are passed through as strings; deciding whether the receiver
//! has a fix is left to the controller.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use plcbridge_core::{BridgeError, LocationSource, Result};
use plcbridge_types::Location;

use crate::AdapterError;

/// Location source backed by an HTTP management endpoint.
#[derive(Debug, Clone)]
pub struct HttpLocationSource {
    client: Client,
    endpoint: String,
}

impl HttpLocationSource {
    /// Create a source for `endpoint` with a short request timeout.
    pub fn new(endpoint: impl Into<String>) -> std::result::Result<Self, AdapterError> {
        Self::with_timeout(endpoint, Duration::from_secs(2))
    }

    pub fn with_timeout(
        endpoint: impl Into<String>,
        timeout: Duration,
    ) -> std::result::Result<Self, AdapterError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn fetch_location(&self) -> std::result::Result<Location, AdapterError> {
        let response = self.client.get(&self.endpoint).send().await?;

        if !response.status().is_success() {
            return Err(AdapterError::Http(format!(
                "management endpoint returned status {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AdapterError::Parse(e.to_string()))
    }
}

#[async_trait]
impl LocationSource for HttpLocationSource {
    async fn fetch(&self) -> Result<Location> {
        self.fetch_location()
            .await
            .map_err(|e| BridgeError::Location(e.to_string()))
    }
}
