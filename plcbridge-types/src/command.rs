//! Remote commands accepted on the command channel.

use alloc::string::String;
use core::fmt;

/// Wire key of the poll-interval override command.
pub const POLL_KEY: &str = "poll";
/// Wire key of the register clear command.
pub const CLEAR_KEY: &str = "clear";
/// Wire key of the stored-data fetch command.
pub const FETCH_KEY: &str = "getData";

/// A decoded remote command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Override the current poll interval, in whole seconds.
    SetPollInterval(u64),
    /// Reset the min/max register of a variable.
    ClearRegister(String),
    /// Publish the stored history of a variable back to the requester.
    FetchStored(String),
    /// A key the bridge does not know. Carries the key for logging.
    Unrecognized(String),
}

impl Command {
    /// The wire key this command was decoded from.
    pub fn key(&self) -> &str {
        match self {
            Command::SetPollInterval(_) => POLL_KEY,
            Command::ClearRegister(_) => CLEAR_KEY,
            Command::FetchStored(_) => FETCH_KEY,
            Command::Unrecognized(key) => key,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::SetPollInterval(secs) => write!(f, "{}:{}", POLL_KEY, secs),
            Command::ClearRegister(key) => write!(f, "{}:{}", CLEAR_KEY, key),
            Command::FetchStored(key) => write!(f, "{}:{}", FETCH_KEY, key),
            Command::Unrecognized(key) => write!(f, "{} (unrecognized)", key),
        }
    }
}

/// Reply topic suffix for a stored-data fetch of `key`.
pub fn stored_data_topic(key: &str) -> String {
    let mut topic = String::from(key);
    topic.push_str("/storedData");
    topic
}
