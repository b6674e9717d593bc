//! NATS publisher for sample records and inbound commands.
//!
//! Every subject is the configured base topic followed by a suffix chosen by
//! the controller: the variable key for records, `command` for inbound
//! commands and `<key>/storedData` for command replies.
//!
//! ## Example
//!
//! ```rust,no_run
//! use plcbridge_adapters::nats::NatsPublisher;
//! use plcbridge_core::Publisher;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let publisher = NatsPublisher::builder()
//!         .url("nats://localhost:4222")
//!         .base_topic("plant/line1/")
//!         .client_name("plcbridge")
//!         .build();
//!
//!     publisher.connect().await?;
//!     publisher.publish("temp", br#"{"value": 21.5}"#.to_vec()).await?;
//!     publisher.disconnect().await?;
//!
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use futures_util::StreamExt;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use plcbridge_core::{Publisher, Result};

use crate::AdapterError;

const TARGET: &str = "message bus";

/// Publisher backed by a NATS connection.
pub struct NatsPublisher {
    url: String,
    base_topic: String,
    client_name: Option<String>,
    credentials: Option<String>,
    client: Mutex<Option<async_nats::Client>>,
    listeners: Mutex<Vec<JoinHandle<()>>>,
}

impl NatsPublisher {
    /// Create a new builder for configuring the publisher.
    pub fn builder() -> NatsPublisherBuilder {
        NatsPublisherBuilder::default()
    }

    /// Full subject for a topic suffix.
    pub fn subject(&self, topic_suffix: &str) -> String {
        format!("{}{}", self.base_topic, topic_suffix)
    }

    fn client(&self) -> std::result::Result<async_nats::Client, AdapterError> {
        self.client.lock().clone().ok_or(AdapterError::NotConnected)
    }

    async fn open(&self) -> std::result::Result<async_nats::Client, AdapterError> {
        let mut options = async_nats::ConnectOptions::new();
        if let Some(name) = &self.client_name {
            options = options.name(name);
        }
        if let Some(creds) = &self.credentials {
            options = options
                .credentials_file(creds)
                .await
                .map_err(|e| AdapterError::Auth(e.to_string()))?;
        }

        options
            .connect(&self.url)
            .await
            .map_err(|e| AdapterError::Connection(e.to_string()))
    }
}

#[async_trait]
impl Publisher for NatsPublisher {
    async fn connect(&self) -> Result<()> {
        let client = self.open().await.map_err(|e| e.into_connectivity(TARGET))?;
        *self.client.lock() = Some(client);
        info!(url = %self.url, base_topic = %self.base_topic, "connected to NATS");
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        for listener in self.listeners.lock().drain(..) {
            listener.abort();
        }

        let client = self.client.lock().take();
        if let Some(client) = client {
            client
                .flush()
                .await
                .map_err(|e| AdapterError::Connection(e.to_string()).into_connectivity(TARGET))?;
        }
        Ok(())
    }

    async fn publish(&self, topic_suffix: &str, payload: Vec<u8>) -> Result<()> {
        let subject = self.subject(topic_suffix);
        let client = self.client().map_err(|e| e.into_publish(&subject))?;

        client
            .publish(subject.clone(), payload.into())
            .await
            .map_err(|e| AdapterError::Connection(e.to_string()).into_publish(&subject))?;

        debug!(%subject, "published");
        Ok(())
    }

    async fn subscribe_commands(&self, topic_suffix: &str, sink: mpsc::Sender<Vec<u8>>) -> Result<()> {
        let subject = self.subject(topic_suffix);
        let client = self.client().map_err(|e| e.into_subscription(&subject))?;

        let mut subscriber = client
            .subscribe(subject.clone())
            .await
            .map_err(|e| AdapterError::Connection(e.to_string()).into_subscription(&subject))?;

        let listener = tokio::spawn(async move {
            while let Some(message) = subscriber.next().await {
                if sink.send(message.payload.to_vec()).await.is_err() {
                    break;
                }
            }
        });
        self.listeners.lock().push(listener);

        info!(%subject, "subscribed to commands");
        Ok(())
    }
}

impl std::fmt::Debug for NatsPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NatsPublisher")
            .field("url", &self.url)
            .field("base_topic", &self.base_topic)
            .field("connected", &self.client.lock().is_some())
            .finish()
    }
}

/// Builder for NatsPublisher.
#[derive(Debug, Default)]
pub struct NatsPublisherBuilder {
    url: Option<String>,
    base_topic: Option<String>,
    client_name: Option<String>,
    credentials: Option<String>,
}

impl NatsPublisherBuilder {
    /// Set the NATS server URL (default: "nats://localhost:4222").
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Set the prefix of every subject. It is used verbatim.
    pub fn base_topic(mut self, topic: impl Into<String>) -> Self {
        self.base_topic = Some(topic.into());
        self
    }

    /// Set the connection name reported to the server.
    pub fn client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = Some(name.into());
        self
    }

    /// Set the path to a credentials file for authentication.
    pub fn credentials_file(mut self, path: impl Into<String>) -> Self {
        self.credentials = Some(path.into());
        self
    }

    /// Build the publisher. No connection is made until `connect`.
    pub fn build(self) -> NatsPublisher {
        NatsPublisher {
            url: self
                .url
                .unwrap_or_else(|| "nats://localhost:4222".to_string()),
            base_topic: self.base_topic.unwrap_or_default(),
            client_name: self.client_name,
            credentials: self.credentials,
            client: Mutex::new(None),
            listeners: Mutex::new(Vec::new()),
        }
    }
}
