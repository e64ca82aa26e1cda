//! Durable SQLite storage for the footfall visit counter: one database per
//! storage scope, TOML configuration, and JSON record import/export.

pub mod config;
pub mod error;
pub mod json_bridge;
pub mod schema;
pub mod scope;
pub mod store;

pub use config::{CONFIG_FILE, load_config};
pub use error::{Result, StoreError};
pub use scope::{DEFAULT_SCOPE, ScopeStore, default_base_dir};
pub use store::Store;
