//! Sample records - the per-variable, per-cycle output of the bridge.

use alloc::string::String;

use crate::{Position, Value};

/// What a variable represents to the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Role {
    /// An ordinary process variable.
    #[default]
    Normal,
    /// A variable whose value signals whether the monitored process runs.
    Status,
}

/// A register field that is either tracked or explicitly not applicable.
///
/// Serializes as the tracked value, or as the string `"n/a"` when unset.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Register<T> {
    #[default]
    NotApplicable,
    Set(T),
}

impl<T> Register<T> {
    /// Returns true if the field was never tracked.
    pub fn is_not_applicable(&self) -> bool {
        matches!(self, Register::NotApplicable)
    }

    /// Borrow the tracked value, if any.
    pub fn as_set(&self) -> Option<&T> {
        match self {
            Register::NotApplicable => None,
            Register::Set(v) => Some(v),
        }
    }
}

impl<T> From<Option<T>> for Register<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Register::NotApplicable, Register::Set)
    }
}

#[cfg(feature = "serde")]
impl<T: serde::Serialize> serde::Serialize for Register<T> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Register::NotApplicable => serializer.serialize_str(crate::NOT_APPLICABLE),
            Register::Set(v) => v.serialize(serializer),
        }
    }
}

#[cfg(feature = "serde")]
impl<'de, T: serde::Deserialize<'de>> serde::Deserialize<'de> for Register<T> {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(serde::Deserialize)]
        #[serde(untagged)]
        enum Repr<T> {
            Sentinel(Sentinel),
            Set(T),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Sentinel(_) => Register::NotApplicable,
            Repr::Set(v) => Register::Set(v),
        })
    }
}

/// Matches only the `"n/a"` string.
#[cfg(feature = "serde")]
struct Sentinel;

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Sentinel {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SentinelVisitor;

        impl serde::de::Visitor<'_> for SentinelVisitor {
            type Value = Sentinel;

            fn expecting(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "the string \"{}\"", crate::NOT_APPLICABLE)
            }

            fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<Sentinel, E> {
                if v == crate::NOT_APPLICABLE {
                    Ok(Sentinel)
                } else {
                    Err(E::invalid_value(serde::de::Unexpected::Str(v), &self))
                }
            }
        }

        deserializer.deserialize_str(SentinelVisitor)
    }
}

/// The record published for one variable in one poll cycle.
///
/// Produced fresh each cycle and never mutated once handed to the publisher.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SampleRecord {
    /// The raw reading.
    pub value: Value,

    pub role: Role,

    /// Running minimum since the register was last cleared.
    pub register_min: Register<Value>,

    /// Running maximum since the register was last cleared.
    pub register_max: Register<Value>,

    /// Unix milliseconds at which the current tracking epoch began.
    pub register_timestamp: Register<u64>,

    /// Unix milliseconds at which the record was assembled.
    pub timestamp: u64,

    pub gps_lat: f64,

    pub gps_long: f64,
}

impl SampleRecord {
    /// Create a record for a reading with all register fields unset.
    ///
    /// Timestamp and position are filled in when the batch is enriched.
    pub fn new(value: Value, role: Role) -> Self {
        Self {
            value,
            role,
            register_min: Register::NotApplicable,
            register_max: Register::NotApplicable,
            register_timestamp: Register::NotApplicable,
            timestamp: 0,
            gps_lat: 0.0,
            gps_long: 0.0,
        }
    }

    /// Stamp the record with its publish time and position.
    pub fn enrich(&mut self, timestamp: u64, position: Position) {
        self.timestamp = timestamp;
        self.gps_lat = position.lat;
        self.gps_long = position.long;
    }
}

/// A record together with the variable key it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub key: String,
    pub record: SampleRecord,
}

impl Sample {
    pub fn new(key: impl Into<String>, record: SampleRecord) -> Self {
        Self {
            key: key.into(),
            record,
        }
    }
}
