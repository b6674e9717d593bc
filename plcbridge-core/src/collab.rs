//! Contracts for the external collaborators the controller drives.
//!
//! The core never speaks a wire protocol itself. Sampling, publishing and
//! location lookup are provided by implementations of these traits
//! (see the `plcbridge-adapters` crate). Asynchronous deliveries from a
//! collaborator (status changes, inbound commands) are pushed into bounded
//! channels handed over at subscription time.

use std::fmt::Debug;

use async_trait::async_trait;
use plcbridge_types::{Location, Value};
use tokio::sync::mpsc;

use crate::error::Result;
use crate::watchdog::StatusEvent;

/// Identifies a status-change subscription for later release.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    pub id: u64,
    pub address: String,
}

/// Reads process variables from the automation controller.
#[async_trait]
pub trait Sampler: Send + Sync + Debug {
    async fn connect(&self) -> Result<()>;

    async fn disconnect(&self) -> Result<()>;

    /// Read the current value at `address`.
    async fn read(&self, address: &str) -> Result<Value>;

    /// Deliver status changes of `address` into `sink` until unsubscribed.
    async fn subscribe(
        &self,
        address: &str,
        sink: mpsc::Sender<StatusEvent>,
    ) -> Result<SubscriptionHandle>;

    async fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<()>;
}

/// Publishes records to, and receives commands from, the message bus.
///
/// Topic suffixes are relative to the publisher's base topic.
#[async_trait]
pub trait Publisher: Send + Sync + Debug {
    async fn connect(&self) -> Result<()>;

    async fn disconnect(&self) -> Result<()>;

    async fn publish(&self, topic_suffix: &str, payload: Vec<u8>) -> Result<()>;

    /// Deliver raw command payloads received on `topic_suffix` into `sink`.
    async fn subscribe_commands(&self, topic_suffix: &str, sink: mpsc::Sender<Vec<u8>>) -> Result<()>;
}

/// Looks up the gateway's current position.
#[async_trait]
pub trait LocationSource: Send + Sync + Debug {
    async fn fetch(&self) -> Result<Location>;
}

/// A location source for deployments without a management interface.
///
/// Always fails, so every record carries the configured fallback position.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLocation;

#[async_trait]
impl LocationSource for NoLocation {
    async fn fetch(&self) -> Result<Location> {
        Err(crate::error::BridgeError::Location(
            "no location source configured".to_string(),
        ))
    }
}
