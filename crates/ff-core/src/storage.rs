//! Storage port: the single persistent key-value scope the counter reads and
//! writes. Values are always stored in their literal textual form.

use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The backend could not be reached or refused access.
    Unavailable(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Unavailable(msg) => write!(f, "storage unavailable: {msg}"),
        }
    }
}

impl std::error::Error for StorageError {}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Synchronous, unbuffered key-value access for one client scope.
///
/// Reads and writes are independent operations; nothing here groups them
/// into a transaction, so a sequence of calls can be partially applied when
/// the backend fails midway.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for &mut S {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }
}

/// In-memory store, primarily for tests and replay.
///
/// Can be told to fail every call, or to start failing writes after a fixed
/// number of successful ones.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
    unavailable: bool,
    writes_left: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every read and write fails.
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    /// Allow `n` more successful writes, then fail every write after that.
    pub fn fail_writes_after(&mut self, n: usize) {
        self.writes_left = Some(n);
    }

    /// Restore normal operation.
    pub fn heal(&mut self) {
        self.unavailable = false;
        self.writes_left = None;
    }

    /// Remove everything, as a host clearing site data would.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        if self.unavailable {
            return Err(StorageError::Unavailable(format!("read of '{key}' refused")));
        }
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        if self.unavailable {
            return Err(StorageError::Unavailable(format!("write of '{key}' refused")));
        }
        if let Some(left) = self.writes_left.as_mut() {
            if *left == 0 {
                return Err(StorageError::Unavailable(format!("write of '{key}' refused")));
            }
            *left -= 1;
        }
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
