//! Application configuration.
//!
//! Settings are read from a single file (TOML in the shipped sample, any
//! format the `config` crate recognises by extension) and then overlaid with
//! environment variables such as `PLCBRIDGE__BROKER__URL`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use tracing::warn;

use plcbridge_core::{BridgeConfig, BridgeError, BridgeSettings};

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "/data/package_config.toml";

/// Prefix of environment variable overrides.
pub const ENV_PREFIX: &str = "PLCBRIDGE";

/// The whole configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralSettings,
    pub broker: BrokerSettings,
    pub gateway: GatewaySettings,
    /// Absent when the deployment has no management endpoint.
    #[serde(default)]
    pub location: Option<LocationSettings>,
    pub bridge: BridgeSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeneralSettings {
    /// Log at debug level instead of warn.
    #[serde(default)]
    pub debug: bool,

    /// Append log output to this file instead of stderr.
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrokerSettings {
    pub url: String,

    /// Base topic; every published subject starts with it.
    #[serde(default)]
    pub topic_name: String,

    #[serde(default)]
    pub client_name: Option<String>,

    #[serde(default)]
    pub credentials_file: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewaySettings {
    pub endpoint: String,

    /// How often subscribed status nodes are checked for changes.
    #[serde(default = "default_subscription_period_ms")]
    pub subscription_period_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocationSettings {
    pub endpoint: String,
}

fn default_subscription_period_ms() -> u64 {
    500
}

impl AppConfig {
    /// Load configuration from `path`, overlaid with the environment.
    pub fn load(path: &Path) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .with_context(|| format!("failed to read configuration from {}", path.display()))?;

        config
            .try_deserialize()
            .with_context(|| format!("invalid configuration in {}", path.display()))
    }

    /// Check the broker settings and validate the bridge section.
    ///
    /// A base topic without a trailing `/` gets one appended.
    pub fn validate(&mut self) -> Result<BridgeConfig, BridgeError> {
        if self.broker.url.trim().is_empty() {
            return Err(BridgeError::Configuration("broker url is empty".to_string()));
        }

        if self.gateway.endpoint.trim().is_empty() {
            return Err(BridgeError::Configuration(
                "gateway endpoint is empty".to_string(),
            ));
        }

        if !self.broker.topic_name.ends_with('/') {
            warn!(
                topic_name = %self.broker.topic_name,
                "topic_name must end with '/', appending it"
            );
            self.broker.topic_name.push('/');
        }

        if self.gateway.subscription_period_ms == 0 {
            warn!("subscription_period_ms is zero, using default");
            self.gateway.subscription_period_ms = default_subscription_period_ms();
        }

        self.bridge.clone().validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = r#"
[general]
debug = true

[broker]
url = "nats://broker:4222"
topic_name = "plant/line1"
client_name = "bridge-1"

[gateway]
endpoint = "http://gateway:4840"

[location]
endpoint = "http://gateway:8080/gps"

[bridge]
polling = 10
polling_change = 2
persistency = true
history_length = 20
history_dir = "/tmp/history"

[bridge.variables.temp]
address = "ns=2;i=2"

[bridge.variables.state]
address = "ns=2;i=3"
state = true

[bridge.variables.pressure]
address = "ns=2;i=7"
register = "min,max"
"#;

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_sample() {
        let file = write_config(SAMPLE);
        let config = AppConfig::load(file.path()).unwrap();

        assert!(config.general.debug);
        assert!(config.general.log_file.is_none());
        assert_eq!(config.broker.client_name.as_deref(), Some("bridge-1"));
        assert_eq!(config.gateway.subscription_period_ms, 500);
        assert_eq!(
            config.location.as_ref().map(|l| l.endpoint.as_str()),
            Some("http://gateway:8080/gps")
        );
        assert_eq!(config.bridge.polling, 10);
        assert_eq!(config.bridge.variables.len(), 3);
        assert!(config.bridge.variables["state"].state);
    }

    #[test]
    fn test_validate_appends_topic_separator() {
        let file = write_config(SAMPLE);
        let mut config = AppConfig::load(file.path()).unwrap();

        let bridge = config.validate().unwrap();

        assert_eq!(config.broker.topic_name, "plant/line1/");
        assert_eq!(bridge.normal_interval.as_secs(), 10);
        assert_eq!(bridge.fast_interval.as_secs(), 2);
        assert_eq!(bridge.history.as_ref().map(|h| h.length), Some(20));
        assert_eq!(bridge.subscription_addresses(), vec!["ns=2;i=3"]);
    }

    #[test]
    fn test_empty_broker_url_is_fatal() {
        let file = write_config(&SAMPLE.replace("nats://broker:4222", ""));
        let mut config = AppConfig::load(file.path()).unwrap();

        let err = config.validate().unwrap_err();
        assert!(matches!(err, BridgeError::Configuration(_)));
    }

    #[test]
    fn test_variables_keep_file_order() {
        let contents = SAMPLE.replace(
            "[bridge.variables.temp]",
            "[bridge.variables.zeta_state]\naddress = \"ns=2;i=9\"\nstate = true\n\n[bridge.variables.temp]",
        );
        let file = write_config(&contents);
        let mut config = AppConfig::load(file.path()).unwrap();

        let keys: Vec<&str> = config.bridge.variables.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["zeta_state", "temp", "state", "pressure"]);

        let bridge = config.validate().unwrap();
        assert_eq!(bridge.subscription_addresses(), vec!["ns=2;i=9"]);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(AppConfig::load(Path::new("/nonexistent/plcbridge.toml")).is_err());
    }
}
