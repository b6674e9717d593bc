//! Bridge settings as read from configuration, and their validated form.

use std::path::PathBuf;
use std::time::Duration;

use indexmap::IndexMap;
use plcbridge_types::Position;
use serde::Deserialize;
use tracing::{error, warn};

use crate::error::{BridgeError, Result};

const DEFAULT_POLLING_SECS: u64 = 5;
const DEFAULT_POLLING_CHANGE_SECS: u64 = 1;
const DEFAULT_HISTORY_LENGTH: usize = 10;

/// Fallback position used when the receiver reports no fix.
pub const DEFAULT_FALLBACK: Position = Position::new(50.0754072, 14.4165971);

/// The `bridge` section of the configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeSettings {
    /// Normal poll interval in seconds.
    #[serde(default = "default_polling")]
    pub polling: u64,

    /// Fast poll interval in seconds, used while the process runs.
    #[serde(default = "default_polling_change")]
    pub polling_change: u64,

    /// Records retained per variable in the history store.
    #[serde(default = "default_history_length")]
    pub history_length: usize,

    /// Whether records are persisted to the history store.
    #[serde(default)]
    pub persistency: bool,

    #[serde(default = "default_history_dir")]
    pub history_dir: PathBuf,

    #[serde(default = "default_fallback_latitude")]
    pub fallback_latitude: f64,

    #[serde(default = "default_fallback_longitude")]
    pub fallback_longitude: f64,

    /// Index of the digit that reads `0` when the receiver has no fix.
    #[serde(default = "default_fix_digit_offset")]
    pub gps_fix_digit_offset: usize,

    /// Subscribe to every status variable instead of only the first one.
    #[serde(default)]
    pub subscribe_all_status: bool,

    /// Variables in declaration order.
    #[serde(default)]
    pub variables: IndexMap<String, VariableSettings>,
}

/// Per-variable settings.
#[derive(Debug, Clone, Deserialize)]
pub struct VariableSettings {
    /// Controller address (node id) of the variable.
    pub address: String,

    /// Marks the variable as a status source.
    #[serde(default)]
    pub state: bool,

    /// Register options, e.g. `"min,max"`.
    #[serde(default)]
    pub register: Option<String>,
}

fn default_polling() -> u64 {
    DEFAULT_POLLING_SECS
}

fn default_polling_change() -> u64 {
    DEFAULT_POLLING_CHANGE_SECS
}

fn default_history_length() -> usize {
    DEFAULT_HISTORY_LENGTH
}

fn default_history_dir() -> PathBuf {
    PathBuf::from("/data/history")
}

fn default_fallback_latitude() -> f64 {
    DEFAULT_FALLBACK.lat
}

fn default_fallback_longitude() -> f64 {
    DEFAULT_FALLBACK.long
}

fn default_fix_digit_offset() -> usize {
    4
}

/// Which running extremes to track for a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegisterPolicy {
    pub min: bool,
    pub max: bool,
}

impl RegisterPolicy {
    pub const NONE: Self = Self {
        min: false,
        max: false,
    };

    pub const BOTH: Self = Self {
        min: true,
        max: true,
    };

    pub fn is_enabled(&self) -> bool {
        self.min || self.max
    }

    /// Parse a comma-separated option list.
    ///
    /// Returns the policy and any options that were not understood.
    pub fn parse(options: &str) -> (Self, Vec<String>) {
        let mut policy = Self::NONE;
        let mut invalid = Vec::new();

        for option in options.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            match option {
                "min" => policy.min = true,
                "max" => policy.max = true,
                other => invalid.push(other.to_string()),
            }
        }

        (policy, invalid)
    }
}

/// A configured variable after validation.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub key: String,
    pub address: String,
    pub status: bool,
    pub register: RegisterPolicy,
}

impl Variable {
    pub fn new(key: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            address: address.into(),
            status: false,
            register: RegisterPolicy::NONE,
        }
    }

    pub fn status(mut self) -> Self {
        self.status = true;
        self
    }

    pub fn register(mut self, policy: RegisterPolicy) -> Self {
        self.register = policy;
        self
    }
}

/// Validated settings the controller runs with.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub normal_interval: Duration,
    pub fast_interval: Duration,
    /// `None` when persistence is disabled.
    pub history: Option<HistoryConfig>,
    pub fallback: Position,
    pub fix_digit_offset: usize,
    pub subscribe_all_status: bool,
    pub variables: Vec<Variable>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryConfig {
    pub dir: PathBuf,
    pub length: usize,
}

impl BridgeConfig {
    /// Config with the default cadence and no persistence.
    pub fn new(variables: Vec<Variable>) -> Self {
        Self {
            normal_interval: Duration::from_secs(DEFAULT_POLLING_SECS),
            fast_interval: Duration::from_secs(DEFAULT_POLLING_CHANGE_SECS),
            history: None,
            fallback: DEFAULT_FALLBACK,
            fix_digit_offset: default_fix_digit_offset(),
            subscribe_all_status: false,
            variables,
        }
    }

    /// Addresses that get a status-change subscription at start.
    pub fn subscription_addresses(&self) -> Vec<&str> {
        let mut status = self.variables.iter().filter(|v| v.status);
        if self.subscribe_all_status {
            status.map(|v| v.address.as_str()).collect()
        } else {
            status.next().map(|v| v.address.as_str()).into_iter().collect()
        }
    }
}

impl BridgeSettings {
    /// Validate the settings, substituting defaults where that is safe.
    ///
    /// Zero intervals and a zero history length fall back to defaults with a
    /// warning. An empty variable set or an empty address is fatal.
    pub fn validate(self) -> Result<BridgeConfig> {
        if self.variables.is_empty() {
            return Err(BridgeError::Configuration(
                "no variables configured".to_string(),
            ));
        }

        let polling = if self.polling == 0 {
            warn!(default = DEFAULT_POLLING_SECS, "polling interval is zero, using default");
            DEFAULT_POLLING_SECS
        } else {
            self.polling
        };

        let polling_change = if self.polling_change == 0 {
            warn!(
                default = DEFAULT_POLLING_CHANGE_SECS,
                "polling_change interval is zero, using default"
            );
            DEFAULT_POLLING_CHANGE_SECS
        } else {
            self.polling_change
        };

        let history_length = if self.history_length == 0 {
            warn!(default = DEFAULT_HISTORY_LENGTH, "history_length is zero, using default");
            DEFAULT_HISTORY_LENGTH
        } else {
            self.history_length
        };

        let mut variables = Vec::with_capacity(self.variables.len());
        for (key, settings) in self.variables {
            if settings.address.trim().is_empty() {
                return Err(BridgeError::Configuration(format!(
                    "variable {} has an empty address",
                    key
                )));
            }

            let register = match settings.register.as_deref() {
                Some(options) => {
                    let (policy, invalid) = RegisterPolicy::parse(options);
                    for option in invalid {
                        error!(variable = %key, %option, "invalid option for register parameter");
                    }
                    policy
                }
                None => RegisterPolicy::NONE,
            };

            variables.push(Variable {
                key,
                address: settings.address,
                status: settings.state,
                register,
            });
        }

        Ok(BridgeConfig {
            normal_interval: Duration::from_secs(polling),
            fast_interval: Duration::from_secs(polling_change),
            history: self.persistency.then(|| HistoryConfig {
                dir: self.history_dir,
                length: history_length,
            }),
            fallback: Position::new(self.fallback_latitude, self.fallback_longitude),
            fix_digit_offset: self.gps_fix_digit_offset,
            subscribe_all_status: self.subscribe_all_status,
            variables,
        })
    }
}
