//! # plcbridge-adapters
//!
//! Concrete collaborators for the plcbridge controller.
//!
//! ## Supported Systems
//!
//! - **NATS** (`nats` feature) - Publishes sample records and command replies,
//!   and receives commands
//! - **HTTP process-data gateway** (`http` feature) - Reads controller nodes and
//!   watches status nodes for changes
//! - **HTTP management endpoint** (`http` feature) - Reports the gateway's GPS
//!   position
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use plcbridge_adapters::{gateway::HttpSampler, nats::NatsPublisher};
//! use plcbridge_core::{Publisher, Sampler};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let sampler = HttpSampler::builder()
//!         .endpoint("http://localhost:4840")
//!         .build()?;
//!     let publisher = NatsPublisher::builder()
//!         .url("nats://localhost:4222")
//!         .base_topic("plant/line1/")
//!         .build();
//!
//!     sampler.connect().await?;
//!     publisher.connect().await?;
//!
//!     let value = sampler.read("ns=2;i=2").await?;
//!     publisher.publish("temp", value.to_string().into_bytes()).await?;
//!     Ok(())
//! }
//! ```

pub mod error;

#[cfg(feature = "http")]
pub mod gateway;

#[cfg(feature = "http")]
pub mod location;

#[cfg(feature = "nats")]
pub mod nats;

pub use error::AdapterError;
