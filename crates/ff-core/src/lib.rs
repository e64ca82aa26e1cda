//! Footfall visit counting engine.
//!
//! Assigns a durable identifier to a returning client, counts sessions
//! separated by more than a fixed inactivity gap, and keeps bounded rolling
//! histograms of visits per day and per month.
//!
//! Zero I/O: every read and write goes through the [`KeyValueStore`] port and
//! every operation takes the current time as a parameter.

pub mod config;
pub mod constants;
pub mod counter;
pub mod export;
pub mod histogram;
pub mod identity;
pub mod storage;
pub mod time;

pub use config::CounterConfig;
pub use constants::{
    DAILY_CAPACITY, MONTHLY_CAPACITY, SESSION_TIMEOUT_MS, VISITOR_ID_PREFIX, keys,
};
pub use counter::{AnalyticsSummary, VisitCounter, VisitSnapshot, is_session_boundary};
pub use export::{ExportError, RECORD_VERSION, VisitRecord, export_json, import_json};
pub use histogram::RollingHistogram;
pub use identity::{Identity, IdentityStore, generate_visitor_id};
pub use storage::{KeyValueStore, MemoryStore, StorageError};
pub use time::{
    Timestamp, date_key, month_key, parse_date_key, parse_month_key, previous_date_key,
    previous_month_key,
};
