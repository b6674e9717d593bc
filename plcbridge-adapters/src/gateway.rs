//! Process-data gateway sampler over HTTP.
//!
//! The gateway exposes controller nodes as JSON resources:
//!
//! - `GET {endpoint}/api/status` answers 2xx while the gateway is up
//! - `GET {endpoint}/api/nodes/{address}` returns `{"value": ...}`
//!
//! The gateway has no push channel, so status-change subscriptions are
//! emulated by polling the node every subscription period and forwarding a
//! notification whenever the value differs from the previous one. The first
//! successful poll always notifies.
//!
//! ## Example
//!
//! ```rust,no_run
//! use plcbridge_adapters::gateway::HttpSampler;
//! use plcbridge_core::Sampler;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let sampler = HttpSampler::builder()
//!         .endpoint("http://localhost:4840")
//!         .subscription_period(Duration::from_millis(500))
//!         .build()?;
//!
//!     sampler.connect().await?;
//!     let value = sampler.read("ns=2;i=3").await?;
//!     println!("state = {}", value);
//!
//!     Ok(())
//! }
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use plcbridge_core::{Result, Sampler, StatusEvent, SubscriptionHandle};
use plcbridge_types::Value;

use crate::AdapterError;

const TARGET: &str = "process-data gateway";

/// Sampler reading controller nodes through an HTTP gateway.
#[derive(Debug)]
pub struct HttpSampler {
    client: Client,
    endpoint: String,
    subscription_period: Duration,
    connected: AtomicBool,
    next_id: AtomicU64,
    subscriptions: Mutex<HashMap<u64, JoinHandle<()>>>,
}

impl HttpSampler {
    /// Create a new builder for configuring the sampler.
    pub fn builder() -> HttpSamplerBuilder {
        HttpSamplerBuilder::default()
    }

    fn node_url(&self, address: &str) -> String {
        format!("{}/api/nodes/{}", self.endpoint, encode_address(address))
    }

    fn ensure_connected(&self) -> std::result::Result<(), AdapterError> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(AdapterError::NotConnected)
        }
    }

    fn abort_subscriptions(&self) {
        for (_, task) in self.subscriptions.lock().drain() {
            task.abort();
        }
    }
}

async fn fetch_value(client: &Client, url: &str) -> std::result::Result<Value, AdapterError> {
    let response = client.get(url).send().await?;

    if response.status() == reqwest::StatusCode::NOT_FOUND {
        return Err(AdapterError::Http("node not found".to_string()));
    }

    if !response.status().is_success() {
        return Err(AdapterError::Http(format!(
            "gateway returned status {}",
            response.status()
        )));
    }

    let node: NodeValue = response
        .json()
        .await
        .map_err(|e| AdapterError::Parse(e.to_string()))?;

    Ok(node.value)
}

#[async_trait]
impl Sampler for HttpSampler {
    async fn connect(&self) -> Result<()> {
        let url = format!("{}/api/status", self.endpoint);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AdapterError::from(e).into_connectivity(TARGET))?;

        if !response.status().is_success() {
            return Err(AdapterError::Http(format!(
                "gateway returned status {}",
                response.status()
            ))
            .into_connectivity(TARGET));
        }

        self.connected.store(true, Ordering::SeqCst);
        info!(endpoint = %self.endpoint, "gateway reachable");
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.abort_subscriptions();
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn read(&self, address: &str) -> Result<Value> {
        self.ensure_connected().map_err(|e| e.into_read(address))?;
        fetch_value(&self.client, &self.node_url(address))
            .await
            .map_err(|e| e.into_read(address))
    }

    async fn subscribe(
        &self,
        address: &str,
        sink: mpsc::Sender<StatusEvent>,
    ) -> Result<SubscriptionHandle> {
        self.ensure_connected()
            .map_err(|e| e.into_subscription(address))?;

        let url = self.node_url(address);
        // The node must exist before we start watching it.
        fetch_value(&self.client, &url)
            .await
            .map_err(|e| e.into_subscription(address))?;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let client = self.client.clone();
        let period = self.subscription_period;
        let node = address.to_string();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            let mut last: Option<Value> = None;

            loop {
                ticker.tick().await;
                match fetch_value(&client, &url).await {
                    Ok(value) => {
                        if last.as_ref() == Some(&value) {
                            continue;
                        }
                        last = Some(value.clone());
                        if sink.send(StatusEvent::new(node.as_str(), value)).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => debug!(%node, error = %e, "status poll failed"),
                }
            }
        });

        self.subscriptions.lock().insert(id, task);
        Ok(SubscriptionHandle {
            id,
            address: address.to_string(),
        })
    }

    async fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<()> {
        if let Some(task) = self.subscriptions.lock().remove(&handle.id) {
            task.abort();
        }
        Ok(())
    }
}

impl Drop for HttpSampler {
    fn drop(&mut self) {
        self.abort_subscriptions();
    }
}

/// Builder for HttpSampler.
#[derive(Debug, Default)]
pub struct HttpSamplerBuilder {
    endpoint: Option<String>,
    timeout: Option<Duration>,
    subscription_period: Option<Duration>,
}

impl HttpSamplerBuilder {
    /// Set the gateway endpoint (e.g., "http://localhost:4840").
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the request timeout (default: 10 seconds).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set how often subscribed nodes are polled (default: 500 ms).
    pub fn subscription_period(mut self, period: Duration) -> Self {
        self.subscription_period = Some(period);
        self
    }

    /// Build the sampler.
    pub fn build(self) -> std::result::Result<HttpSampler, AdapterError> {
        let timeout = self.timeout.unwrap_or(Duration::from_secs(10));
        let client = Client::builder().timeout(timeout).build()?;

        Ok(HttpSampler {
            client,
            endpoint: self
                .endpoint
                .unwrap_or_else(|| "http://localhost:4840".to_string())
                .trim_end_matches('/')
                .to_string(),
            subscription_period: self
                .subscription_period
                .unwrap_or(Duration::from_millis(500)),
            connected: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
            subscriptions: Mutex::new(HashMap::new()),
        })
    }
}

// Percent-encode the characters of a node address that are not path-safe
fn encode_address(address: &str) -> String {
    let mut encoded = String::with_capacity(address.len());
    for c in address.chars() {
        match c {
            '/' => encoded.push_str("%2F"),
            '?' => encoded.push_str("%3F"),
            '#' => encoded.push_str("%23"),
            '%' => encoded.push_str("%25"),
            ' ' => encoded.push_str("%20"),
            c => encoded.push(c),
        }
    }
    encoded
}

/// Node value from the gateway API.
#[derive(Debug, Deserialize)]
struct NodeValue {
    value: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use plcbridge_core::BridgeError;

    #[test]
    fn test_builder_defaults() {
        let sampler = HttpSampler::builder().build().unwrap();
        assert_eq!(sampler.endpoint, "http://localhost:4840");
        assert_eq!(sampler.subscription_period, Duration::from_millis(500));
    }

    #[test]
    fn test_builder_custom() {
        let sampler = HttpSampler::builder()
            .endpoint("http://gateway.local:8080/")
            .subscription_period(Duration::from_millis(250))
            .build()
            .unwrap();

        assert_eq!(sampler.endpoint, "http://gateway.local:8080");
        assert_eq!(sampler.subscription_period, Duration::from_millis(250));
        assert_eq!(
            sampler.node_url("ns=2;s=Line 1/State"),
            "http://gateway.local:8080/api/nodes/ns=2;s=Line%201%2FState"
        );
    }

    #[test]
    fn test_encode_address() {
        assert_eq!(encode_address("ns=2;i=3"), "ns=2;i=3");
        assert_eq!(encode_address("a/b?c#d%e"), "a%2Fb%3Fc%23d%25e");
    }

    #[test]
    fn test_node_value_parsing() {
        let node: NodeValue = serde_json::from_str(r#"{"value": 12.5}"#).unwrap();
        assert_eq!(node.value, Value::Float(12.5));

        let node: NodeValue = serde_json::from_str(r#"{"value": true}"#).unwrap();
        assert_eq!(node.value, Value::Bool(true));

        let node: NodeValue = serde_json::from_str(r#"{"value": "idle"}"#).unwrap();
        assert_eq!(node.value, Value::Text("idle".into()));
    }

    #[tokio::test]
    async fn test_read_requires_connect() {
        let sampler = HttpSampler::builder().build().unwrap();
        let err = sampler.read("ns=2;i=3").await.unwrap_err();
        assert!(matches!(err, BridgeError::Read { .. }));

        let (tx, _rx) = mpsc::channel(1);
        let err = sampler.subscribe("ns=2;i=3", tx).await.unwrap_err();
        assert!(matches!(err, BridgeError::Subscription { .. }));
    }

    #[tokio::test]
    async fn test_unsubscribe_unknown_handle_is_noop() {
        let sampler = HttpSampler::builder().build().unwrap();
        let handle = SubscriptionHandle {
            id: 99,
            address: "ns=2;i=3".to_string(),
        };
        sampler.unsubscribe(handle).await.unwrap();
    }
}
