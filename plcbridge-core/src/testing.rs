//! In-memory collaborators for exercising the controller in tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use plcbridge_types::{Location, Value};
use tokio::sync::mpsc;

use crate::collab::{LocationSource, Publisher, Sampler, SubscriptionHandle};
use crate::error::{BridgeError, Result};
use crate::watchdog::StatusEvent;

/// Replays a scripted sequence of values per address.
///
/// Each read consumes one value; the last value repeats once the script runs
/// out. Reading an unscripted address fails.
#[derive(Debug, Default)]
pub struct ScriptedSampler {
    scripts: Mutex<HashMap<String, VecDeque<Value>>>,
    sinks: Mutex<Vec<(SubscriptionHandle, mpsc::Sender<StatusEvent>)>>,
    connected: AtomicBool,
    next_id: AtomicU64,
    fail_connect: bool,
    fail_subscribe: bool,
    read_delay: Option<Duration>,
}

impl ScriptedSampler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, address: &str, values: impl IntoIterator<Item = Value>) -> Self {
        self.scripts
            .lock()
            .insert(address.to_string(), values.into_iter().collect());
        self
    }

    pub fn failing_connect(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    pub fn failing_subscribe(mut self) -> Self {
        self.fail_subscribe = true;
        self
    }

    /// Make every read take at least `delay`.
    pub fn slow_reads(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Addresses with a live subscription.
    pub fn subscribed(&self) -> Vec<String> {
        self.sinks
            .lock()
            .iter()
            .map(|(handle, _)| handle.address.clone())
            .collect()
    }

    /// Deliver a status change to every subscriber of `address`.
    pub async fn emit(&self, address: &str, value: Value) {
        let sinks: Vec<_> = self
            .sinks
            .lock()
            .iter()
            .filter(|(handle, _)| handle.address == address)
            .map(|(_, sink)| sink.clone())
            .collect();
        for sink in sinks {
            let _ = sink.send(StatusEvent::new(address, value.clone())).await;
        }
    }
}

#[async_trait]
impl Sampler for ScriptedSampler {
    async fn connect(&self) -> Result<()> {
        if self.fail_connect {
            return Err(BridgeError::connectivity("scripted gateway", "connection refused"));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn read(&self, address: &str) -> Result<Value> {
        if let Some(delay) = self.read_delay {
            tokio::time::sleep(delay).await;
        }
        let mut scripts = self.scripts.lock();
        let script = scripts.get_mut(address).ok_or_else(|| BridgeError::Read {
            address: address.to_string(),
            reason: "no such node".to_string(),
        })?;
        let value = if script.len() > 1 {
            script.pop_front()
        } else {
            script.front().cloned()
        };
        value.ok_or_else(|| BridgeError::Read {
            address: address.to_string(),
            reason: "script exhausted".to_string(),
        })
    }

    async fn subscribe(
        &self,
        address: &str,
        sink: mpsc::Sender<StatusEvent>,
    ) -> Result<SubscriptionHandle> {
        if self.fail_subscribe {
            return Err(BridgeError::Subscription {
                address: address.to_string(),
                reason: "subscription rejected".to_string(),
            });
        }
        let handle = SubscriptionHandle {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            address: address.to_string(),
        };
        self.sinks.lock().push((handle.clone(), sink));
        Ok(handle)
    }

    async fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<()> {
        self.sinks.lock().retain(|(h, _)| *h != handle);
        Ok(())
    }
}

/// Records everything published and exposes the command sink.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<(String, Vec<u8>)>>,
    commands: Mutex<Option<mpsc::Sender<Vec<u8>>>>,
    connected: AtomicBool,
    fail_connect: bool,
}

impl RecordingPublisher {
    pub fn failing_connect(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    pub fn published(&self) -> Vec<(String, Vec<u8>)> {
        self.published.lock().clone()
    }

    pub fn clear(&self) {
        self.published.lock().clear();
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Push a raw command payload as if it arrived from the bus.
    pub async fn inject_command(&self, payload: &[u8]) {
        let sink = self.commands.lock().clone();
        if let Some(sink) = sink {
            let _ = sink.send(payload.to_vec()).await;
        }
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn connect(&self) -> Result<()> {
        if self.fail_connect {
            return Err(BridgeError::connectivity("recording bus", "connection refused"));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        *self.commands.lock() = None;
        Ok(())
    }

    async fn publish(&self, topic_suffix: &str, payload: Vec<u8>) -> Result<()> {
        self.published
            .lock()
            .push((topic_suffix.to_string(), payload));
        Ok(())
    }

    async fn subscribe_commands(&self, _topic_suffix: &str, sink: mpsc::Sender<Vec<u8>>) -> Result<()> {
        *self.commands.lock() = Some(sink);
        Ok(())
    }
}

/// Always reports the same location.
#[derive(Debug, Clone)]
pub struct FixedLocation(Location);

impl FixedLocation {
    pub fn new(location: Location) -> Self {
        Self(location)
    }
}

#[async_trait]
impl LocationSource for FixedLocation {
    async fn fetch(&self) -> Result<Location> {
        Ok(self.0.clone())
    }
}
