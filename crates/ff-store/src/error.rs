use std::fmt;

use ff_core::{ExportError, StorageError};

#[derive(Debug)]
pub enum StoreError {
    Sqlite(rusqlite::Error),
    Io(std::io::Error),
    /// The key-value port reported the backend unreachable.
    Unavailable(String),
    InvalidData(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Sqlite(e) => write!(f, "SQLite error: {e}"),
            StoreError::Io(e) => write!(f, "I/O error: {e}"),
            StoreError::Unavailable(msg) => write!(f, "storage unavailable: {msg}"),
            StoreError::InvalidData(msg) => write!(f, "invalid data: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Sqlite(e)
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e)
    }
}

impl From<StorageError> for StoreError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Unavailable(msg) => StoreError::Unavailable(msg),
        }
    }
}

impl From<ExportError> for StoreError {
    fn from(e: ExportError) -> Self {
        match e {
            ExportError::Storage(inner) => inner.into(),
            ExportError::InvalidRecord(_) => StoreError::InvalidData(e.to_string()),
        }
    }
}

/// The counter only understands "unavailable"; every store failure is that.
impl From<StoreError> for StorageError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Unavailable(msg) => StorageError::Unavailable(msg),
            other => StorageError::Unavailable(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_keeps_its_meaning() {
        let err: StoreError = StorageError::Unavailable("disk gone".to_string()).into();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert_eq!(err.to_string(), "storage unavailable: disk gone");

        let err: StoreError = ExportError::Storage(StorageError::Unavailable("x".into())).into();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }

    #[test]
    fn test_invalid_record_is_invalid_data() {
        let err: StoreError = ExportError::InvalidRecord("bad".to_string()).into();
        assert!(matches!(err, StoreError::InvalidData(_)));
    }

    #[test]
    fn test_roundtrip_through_port_error_does_not_nest() {
        let port: StorageError = StoreError::Unavailable("locked".to_string()).into();
        assert_eq!(port, StorageError::Unavailable("locked".to_string()));
    }
}
