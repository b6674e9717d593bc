//! Decoding and applying remote commands.

use std::sync::Arc;
use std::time::Duration;

use plcbridge_types::{stored_data_topic, Command, SampleRecord, CLEAR_KEY, FETCH_KEY, POLL_KEY};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::collab::Publisher;
use crate::error::{BridgeError, Result};
use crate::history::{on_blocking_pool, HistoryStore};
use crate::register::RegisterAggregator;
use crate::timing::PollTiming;

/// Suffix of the topic commands are received on.
pub const COMMAND_TOPIC: &str = "command";

/// Decode a command payload.
///
/// The payload is a JSON object; each key becomes one command, in key order.
/// Unknown keys decode to [`Command::Unrecognized`]. A known key with an
/// unusable value is logged and skipped while the other keys still apply.
/// A payload that is not an object, or whose keys are all unusable, is a
/// malformed command.
pub fn decode(payload: &[u8]) -> Result<Vec<Command>> {
    let value: serde_json::Value = serde_json::from_slice(payload)
        .map_err(|e| BridgeError::MalformedCommand(e.to_string()))?;

    let object = value.as_object().ok_or_else(|| {
        BridgeError::MalformedCommand(format!("expected a JSON object, got {}", value))
    })?;

    let mut commands = Vec::with_capacity(object.len());
    let mut first_error = None;
    for (key, value) in object {
        match decode_entry(key, value) {
            Ok(command) => commands.push(command),
            Err(e) => {
                warn!(%key, error = %e, "skipping malformed command entry");
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) if commands.is_empty() => Err(e),
        _ => Ok(commands),
    }
}

fn decode_entry(key: &str, value: &serde_json::Value) -> Result<Command> {
    match key {
        POLL_KEY => {
            let secs = match value {
                serde_json::Value::Number(n) => n.as_u64(),
                serde_json::Value::String(s) => s.trim().parse().ok(),
                _ => None,
            };
            match secs {
                Some(secs) if secs > 0 => Ok(Command::SetPollInterval(secs)),
                _ => Err(BridgeError::MalformedCommand(format!(
                    "{} expects a positive number of seconds, got {}",
                    POLL_KEY, value
                ))),
            }
        }
        CLEAR_KEY | FETCH_KEY => {
            let variable = value
                .as_str()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .ok_or_else(|| {
                    BridgeError::MalformedCommand(format!(
                        "{} expects a variable name, got {}",
                        key, value
                    ))
                })?
                .to_string();

            Ok(if key == CLEAR_KEY {
                Command::ClearRegister(variable)
            } else {
                Command::FetchStored(variable)
            })
        }
        other => Ok(Command::Unrecognized(other.to_string())),
    }
}

/// Applies remote commands to the controller's shared state.
#[derive(Debug)]
pub struct CommandHandler {
    timing: Arc<PollTiming>,
    registers: Arc<RegisterAggregator>,
    history: Option<Arc<HistoryStore>>,
    publisher: Arc<dyn Publisher>,
}

impl CommandHandler {
    pub fn new(
        timing: Arc<PollTiming>,
        registers: Arc<RegisterAggregator>,
        history: Option<Arc<HistoryStore>>,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        Self {
            timing,
            registers,
            history,
            publisher,
        }
    }

    /// Decode and apply a raw payload. Failures are logged, never returned.
    pub async fn handle(&self, payload: &[u8]) {
        let commands = match decode(payload) {
            Ok(commands) => commands,
            Err(e) => {
                warn!(error = %e, "ignoring command payload");
                return;
            }
        };

        for command in commands {
            if let Err(e) = self.apply(command).await {
                warn!(error = %e, "command failed");
            }
        }
    }

    /// Apply a single decoded command.
    pub async fn apply(&self, command: Command) -> Result<()> {
        match command {
            Command::SetPollInterval(secs) => {
                info!(%command, "received command from the server");
                self.timing.set_interval(Duration::from_secs(secs));
            }
            Command::ClearRegister(ref key) => {
                info!(%command, "received command from the server");
                if !self.registers.clear(key) {
                    debug!(%key, "clear requested for a register that was never tracked");
                }
            }
            Command::FetchStored(ref key) => {
                info!(%command, "received command from the server");
                let records = self.fetch_stored(key).await?;
                let topic = stored_data_topic(key);
                let payload = serde_json::to_vec(&records)?;
                self.publisher.publish(&topic, payload).await?;
                info!(%topic, found = records.is_some(), "command reply sent");
            }
            Command::Unrecognized(ref key) => {
                warn!(%key, "unrecognized command");
            }
        }
        Ok(())
    }

    async fn fetch_stored(&self, key: &str) -> Result<Option<Vec<SampleRecord>>> {
        let Some(history) = self.history.clone() else {
            warn!(%key, "stored data requested but persistence is disabled");
            return Ok(None);
        };
        let key = key.to_string();
        on_blocking_pool(move || history.get(&key)).await
    }

    /// Consume command payloads until every sender is gone.
    pub async fn run(self: Arc<Self>, mut payloads: mpsc::Receiver<Vec<u8>>) {
        while let Some(payload) = payloads.recv().await {
            self.handle(&payload).await;
        }
        debug!("command channel closed");
    }
}
