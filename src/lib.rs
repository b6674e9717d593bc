//! # plcbridge
//!
//! Bridges process variables from an automation controller to a message bus.
//!
//! The bridge polls a set of configured variables through a process-data
//! gateway, tracks running minimum/maximum registers, keeps a bounded history
//! per variable and publishes one record per variable and cycle. It polls
//! faster while the monitored process runs, and listens for remote commands
//! that change the interval, clear registers or request stored data.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   read / watch   ┌───────────────────────────────┐   publish   ┌────────────┐
//! │ HTTP gateway │◀────────────────▶│        PollController         │────────────▶│    NATS    │
//! └──────────────┘                  │  registers · history · timing │◀────────────│  commands  │
//! ┌──────────────┐      fetch       │  watchdog  · command handler  │             └────────────┘
//! │ GPS endpoint │◀────────────────▶│                               │
//! └──────────────┘                  └───────────────────────────────┘
//! ```
//!
//! - **[`settings`]**: Configuration file and environment loading
//! - **[`logging`]**: Log output setup
//! - **[`app`]**: Wiring the controller to its collaborators
//!
//! ## Usage
//!
//! ### As a CLI tool
//!
//! ```bash
//! # Run with the default configuration path
//! plcbridge
//!
//! # Run with a local configuration and debug logging
//! plcbridge --config package_config.toml --debug
//! ```
//!
//! ### As a library
//!
//! ```no_run
//! use std::path::Path;
//! use plcbridge::{app, settings::AppConfig};
//!
//! # tokio_test::block_on(async {
//! let config = AppConfig::load(Path::new("package_config.toml")).unwrap();
//! app::run(config).await.unwrap();
//! # });
//! ```

pub mod app;
pub mod logging;
pub mod settings;

// Re-export main types for convenience
pub use settings::AppConfig;
