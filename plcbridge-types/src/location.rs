//! Location telemetry reported by the management interface.

use alloc::string::String;

/// Coordinates exactly as reported by the location collaborator.
///
/// The strings are kept raw: whether the receiver has a fix is decided by
/// looking at individual digits, not at the parsed number.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Location {
    pub latitude: String,
    pub longitude: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub timestamp: String,
}

impl Location {
    pub fn new(
        latitude: impl Into<String>,
        longitude: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            latitude: latitude.into(),
            longitude: longitude.into(),
            timestamp: timestamp.into(),
        }
    }
}

/// A resolved coordinate pair attached to every published record.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Position {
    pub lat: f64,
    pub long: f64,
}

impl Position {
    pub const fn new(lat: f64, long: f64) -> Self {
        Self { lat, long }
    }
}
