use std::fs;
use std::path::Path;

use ff_core::{CounterConfig, MemoryStore, VisitRecord, export_json, import_json};

use crate::error::{Result, StoreError};
use crate::store::Store;

impl Store {
    /// Import a visit record file into this store.
    pub fn import_json_file(&self, path: &Path, config: &CounterConfig) -> Result<VisitRecord> {
        let json = fs::read_to_string(path).map_err(|e| {
            StoreError::InvalidData(format!("failed to read {}: {e}", path.display()))
        })?;
        self.import_json_str(&json, config)
    }

    /// Import a visit record from a JSON string. The record is validated and
    /// staged in memory first, then written in a single transaction.
    pub fn import_json_str(&self, json: &str, config: &CounterConfig) -> Result<VisitRecord> {
        let mut staged = MemoryStore::new();
        let record = import_json(&mut staged, json, config)?;
        let pairs: Vec<(&str, &str)> = staged.entries().collect();
        self.set_many(&pairs)?;
        tracing::info!(keys = pairs.len(), "imported visit record");
        Ok(record)
    }

    /// Export the stored visit record to a JSON file.
    pub fn export_json_file(&self, path: &Path) -> Result<()> {
        let json = self.export_json_string()?;
        fs::write(path, json).map_err(|e| {
            StoreError::InvalidData(format!("failed to write {}: {e}", path.display()))
        })
    }

    /// Export the stored visit record as a JSON string.
    pub fn export_json_string(&self) -> Result<String> {
        Ok(export_json(self)?)
    }
}
