//! # plcbridge-core
//!
//! The adaptive polling and register-aggregation engine of plcbridge.
//!
//! The engine samples process variables through a [`Sampler`], runs each
//! reading through the [`RegisterAggregator`], optionally records it in the
//! [`HistoryStore`], and hands the batch to a [`Publisher`]. Status-change
//! notifications feed the [`Watchdog`], which switches the shared
//! [`PollTiming`] between the normal and fast cadence. Remote commands are
//! decoded and applied by the [`CommandHandler`].
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use plcbridge_core::{BridgeConfig, NoLocation, PollController, RegisterPolicy, Variable};
//!
//! let config = BridgeConfig::new(vec![
//!     Variable::new("state", "ns=2;i=3").status(),
//!     Variable::new("pressure", "ns=2;i=7").register(RegisterPolicy::BOTH),
//! ]);
//!
//! let controller = Arc::new(PollController::new(
//!     config,
//!     sampler,
//!     publisher,
//!     Arc::new(NoLocation),
//! )?);
//! controller.start().await?;
//! ```
//!
//! ## Concurrency
//!
//! - The poll interval lives behind one lock; the most recent writer wins.
//! - Registers and history entries are locked per variable key.
//! - Status notifications and commands arrive over bounded channels and are
//!   applied by one consumer task each.

mod collab;
mod command;
mod controller;
mod error;
mod history;
mod location;
mod register;
mod settings;
mod timing;
mod watchdog;

#[cfg(test)]
mod testing;

pub use collab::{LocationSource, NoLocation, Publisher, Sampler, SubscriptionHandle};
pub use command::{decode as decode_command, CommandHandler, COMMAND_TOPIC};
pub use controller::{LifecycleState, PollController};
pub use error::{BridgeError, Result};
pub use history::HistoryStore;
pub use location::resolve_position;
pub use register::{RegisterAggregator, RegisterSnapshot, RegisterState};
pub use settings::{
    BridgeConfig, BridgeSettings, HistoryConfig, RegisterPolicy, Variable, VariableSettings,
    DEFAULT_FALLBACK,
};
pub use timing::{Cadence, PollTiming};
pub use watchdog::{StatusEvent, Watchdog};

// Re-export types for convenience
pub use plcbridge_types::{Command, Location, Position, Register, Role, Sample, SampleRecord, Value};
