//! Bounded, persisted per-variable history of sample records.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use plcbridge_types::SampleRecord;

use crate::error::{BridgeError, Result};
use crate::settings::HistoryConfig;

/// A FIFO of the last `capacity` records per variable, one JSON file per key.
///
/// Every append is flushed to disk before it returns and every read goes to
/// disk, so a completed append is visible to any later reader, including one
/// in a restarted process. Operations on the same key serialize; different
/// keys never contend.
#[derive(Debug)]
pub struct HistoryStore {
    dir: PathBuf,
    capacity: usize,
    locks: RwLock<BTreeMap<String, Arc<Mutex<()>>>>,
}

impl HistoryStore {
    /// Open (and create if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>, capacity: usize) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            capacity: capacity.max(1),
            locks: RwLock::new(BTreeMap::new()),
        })
    }

    pub fn from_config(config: &HistoryConfig) -> Result<Self> {
        Self::open(&config.dir, config.length)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock_for(&self, key: &str) -> Arc<Mutex<()>> {
        {
            let locks = self.locks.read();
            if let Some(lock) = locks.get(key) {
                return lock.clone();
            }
        }

        let mut locks = self.locks.write();
        locks.entry(key.to_string()).or_default().clone()
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(file_name(key))
    }

    /// Append a record, evicting the oldest once `capacity` is reached.
    ///
    /// Returns the number of records stored for the key afterwards.
    pub fn append(&self, key: &str, record: &SampleRecord) -> Result<usize> {
        let lock = self.lock_for(key);
        let _guard = lock.lock();

        let path = self.path_for(key);
        let mut records = read_records(&path)?.unwrap_or_default();
        records.push(record.clone());
        if records.len() > self.capacity {
            let excess = records.len() - self.capacity;
            records.drain(..excess);
        }

        self.write_records(&path, &records)?;
        Ok(records.len())
    }

    /// Stored records for `key`, oldest first. `None` if nothing was stored.
    ///
    /// Only keys that have been appended to get a lock entry; reading a key
    /// that was never written leaves the lock map untouched.
    pub fn get(&self, key: &str) -> Result<Option<Vec<SampleRecord>>> {
        let lock = self.locks.read().get(key).cloned();
        let _guard = lock.as_ref().map(|lock| lock.lock());
        read_records(&self.path_for(key))
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.locks.read().len()
    }

    fn write_records(&self, path: &Path, records: &[SampleRecord]) -> Result<()> {
        let tmp = path.with_extension("json.tmp");
        {
            let mut file = File::create(&tmp)?;
            file.write_all(&serde_json::to_vec(records)?)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, path)?;

        #[cfg(unix)]
        File::open(&self.dir)?.sync_all()?;

        Ok(())
    }
}

/// Run a store operation on the blocking thread pool.
pub(crate) async fn on_blocking_pool<T, F>(op: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .map_err(|e| BridgeError::Storage(std::io::Error::other(e)))?
}

fn read_records(path: &Path) -> Result<Option<Vec<SampleRecord>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// File name for a variable key. Bytes outside `[A-Za-z0-9_-]` become `%XX`.
fn file_name(key: &str) -> String {
    let mut name = String::with_capacity(key.len() + 5);
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-' {
            name.push(byte as char);
        } else {
            name.push_str(&format!("%{:02X}", byte));
        }
    }
    name.push_str(".json");
    name
}
