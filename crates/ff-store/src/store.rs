use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::{Connection, OptionalExtension, params};

use ff_core::{KeyValueStore, StorageError};

use crate::error::Result;
use crate::schema;

/// SQLite-backed key-value scope.
pub struct Store {
    conn: Connection,
    path: Option<PathBuf>,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        schema::initialize(&conn)?;
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self { conn, path: None })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    // --- Key-value ---

    pub fn get_value(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    pub fn set_value(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    /// Write several pairs in one transaction.
    pub fn set_many(&self, pairs: &[(&str, &str)]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare("INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)")?;
            for (key, value) in pairs {
                stmt.execute(params![key, value])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Every stored pair, in key order.
    pub fn entries(&self) -> Result<Vec<(String, String)>> {
        let mut stmt = self.conn.prepare("SELECT key, value FROM kv ORDER BY key")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<_, _>>()?;
        Ok(rows)
    }

    // --- Maintenance ---

    /// On-disk size of the database file and its WAL, in bytes. Zero for
    /// in-memory stores.
    pub fn db_size(&self) -> u64 {
        let Some(path) = &self.path else {
            return 0;
        };
        let mut wal = path.clone().into_os_string();
        wal.push("-wal");
        [path.clone(), PathBuf::from(wal)]
            .iter()
            .filter_map(|p| fs::metadata(p).ok())
            .map(|m| m.len())
            .sum()
    }

    /// Fold the WAL back into the main database file and truncate it.
    pub fn checkpoint_truncate(&self) -> Result<()> {
        self.conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
        Ok(())
    }
}

impl KeyValueStore for Store {
    fn get(&self, key: &str) -> std::result::Result<Option<String>, StorageError> {
        Ok(self.get_value(key)?)
    }

    fn set(&mut self, key: &str, value: &str) -> std::result::Result<(), StorageError> {
        Ok(self.set_value(key, value)?)
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        if self.path.is_some()
            && let Err(e) = self.checkpoint_truncate()
        {
            tracing::warn!("WAL checkpoint on close failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ff_core::{Timestamp, VisitCounter, keys};
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    fn rng() -> SmallRng {
        SmallRng::seed_from_u64(42)
    }

    fn t0() -> Timestamp {
        Timestamp::parse_iso8601("2024-01-01T09:00:00Z").unwrap()
    }

    #[test]
    fn test_get_set() {
        let store = Store::open_in_memory().unwrap();

        assert!(store.get_value("foo").unwrap().is_none());

        store.set_value("foo", "bar").unwrap();
        assert_eq!(store.get_value("foo").unwrap(), Some("bar".to_string()));

        store.set_value("foo", "baz").unwrap();
        assert_eq!(store.get_value("foo").unwrap(), Some("baz".to_string()));
    }

    #[test]
    fn test_set_many_and_entries() {
        let store = Store::open_in_memory().unwrap();
        store
            .set_many(&[("b", "2"), ("a", "1"), ("c", "3")])
            .unwrap();

        let entries = store.entries().unwrap();
        let keys: Vec<&str> = entries.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["a", "b", "c"]);
    }

    #[test]
    fn test_counter_over_sqlite() {
        let mut counter = VisitCounter::new(Store::open_in_memory().unwrap());
        let mut rng = rng();

        let first = counter.record_visit(t0(), &mut rng).unwrap();
        let second = counter.record_visit(t0().plus_minutes(10), &mut rng).unwrap();
        let third = counter.record_visit(t0().plus_minutes(40), &mut rng).unwrap();

        assert_eq!(first.visitor_id, third.visitor_id);
        assert_eq!((second.is_new_session, second.session_count), (false, 1));
        assert_eq!((third.is_new_session, third.session_count), (true, 2));

        let store = counter.store();
        assert_eq!(store.get_value(keys::VISIT_COUNT).unwrap().as_deref(), Some("2"));
        assert_eq!(
            store.get_value(keys::DAILY_VISITS).unwrap().as_deref(),
            Some(r#"{"2024-01-01":3}"#)
        );
    }

    #[test]
    fn test_values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scope.db");
        let visitor_id = {
            let mut counter = VisitCounter::new(Store::open(&path).unwrap());
            counter.record_visit(t0(), &mut rng()).unwrap().visitor_id
        };

        let mut counter = VisitCounter::new(Store::open(&path).unwrap());
        let snap = counter
            .record_visit(t0().plus_minutes(5), &mut rng())
            .unwrap();
        assert_eq!(snap.visitor_id, visitor_id);
        assert!(!snap.is_new_session);
    }

    #[test]
    fn test_db_size() {
        assert_eq!(Store::open_in_memory().unwrap().db_size(), 0);

        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(&dir.path().join("size.db")).unwrap();
        store.set_value("k", "v").unwrap();
        assert!(store.db_size() > 0);
        assert_eq!(store.path(), Some(dir.path().join("size.db").as_path()));
    }

    #[test]
    fn test_closed_connection_maps_to_unavailable() {
        let store = Store::open_in_memory().unwrap();
        store.conn().execute_batch("DROP TABLE kv;").unwrap();

        let err = KeyValueStore::get(&store, "visitor_id").unwrap_err();
        assert!(matches!(err, StorageError::Unavailable(_)));

        let mut counter = VisitCounter::new(store);
        assert!(counter.record_visit(t0(), &mut rng()).is_err());
    }
}
