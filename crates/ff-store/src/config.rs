use std::fs;
use std::path::Path;

use ff_core::CounterConfig;

use crate::error::{Result, StoreError};

pub const CONFIG_FILE: &str = "footfall.toml";

/// Load `<base_dir>/footfall.toml`, or defaults when the file is absent.
///
/// ```toml
/// session_timeout_minutes = 30
/// daily_capacity = 60
/// monthly_capacity = 12
/// ```
pub fn load_config(base_dir: &Path) -> Result<CounterConfig> {
    let path = base_dir.join(CONFIG_FILE);
    if !path.exists() {
        return Ok(CounterConfig::default());
    }

    let text = fs::read_to_string(&path)?;
    let config: CounterConfig = toml::from_str(&text)
        .map_err(|e| StoreError::InvalidData(format!("{}: {e}", path.display())))?;
    config
        .validate()
        .map_err(|msg| StoreError::InvalidData(format!("{}: {msg}", path.display())))?;

    tracing::debug!(?config, "loaded {}", path.display());
    Ok(config)
}
