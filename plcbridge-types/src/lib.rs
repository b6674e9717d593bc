//! # plcbridge-types
//!
//! Core types shared by the plcbridge crates. This crate defines the shape of
//! everything that crosses a boundary: process values read from a controller,
//! the per-variable sample records published to the message bus, location
//! telemetry and the remote commands the bridge understands.
//!
//! ## Features
//!
//! - `std` (default): Standard library support (wall-clock helpers)
//! - `serde`: JSON serialization via serde, matching the published wire format
//!
//! ## Example
//!
//! ```rust
//! use plcbridge_types::{Register, Role, SampleRecord, Value};
//!
//! let mut record = SampleRecord::new(Value::Int(42), Role::Normal);
//! record.register_min = Register::Set(Value::Int(7));
//!
//! assert!(record.register_max.is_not_applicable());
//! assert_eq!(record.register_min.as_set(), Some(&Value::Int(7)));
//! ```
//!
//! ## The "n/a" sentinel
//!
//! Register fields that were never tracked are reported as the string
//! [`NOT_APPLICABLE`] rather than `0` or `null`, so consumers can tell
//! "not tracked" apart from "tracked and equal to zero".

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod command;
mod location;
mod record;
mod value;

pub use command::*;
pub use location::*;
pub use record::*;
pub use value::*;

/// Wire representation of an unset register field.
pub const NOT_APPLICABLE: &str = "n/a";

/// Get current timestamp in milliseconds since Unix epoch.
#[cfg(feature = "std")]
pub fn current_timestamp_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
