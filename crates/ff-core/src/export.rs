//! JSON document for the persisted visit record.
//!
//! The document uses camelCase field names and stores the two histograms as
//! nested objects instead of the JSON-in-a-string form they have in storage.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::CounterConfig;
use crate::constants::keys;
use crate::histogram::RollingHistogram;
use crate::storage::{KeyValueStore, StorageError};
use crate::time::{Timestamp, parse_date_key, parse_month_key};

pub const RECORD_VERSION: &str = "1";

#[derive(Debug)]
pub enum ExportError {
    Storage(StorageError),
    InvalidRecord(String),
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportError::Storage(e) => write!(f, "{e}"),
            ExportError::InvalidRecord(msg) => write!(f, "invalid visit record: {msg}"),
        }
    }
}

impl std::error::Error for ExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExportError::Storage(e) => Some(e),
            ExportError::InvalidRecord(_) => None,
        }
    }
}

impl From<StorageError> for ExportError {
    fn from(e: StorageError) -> Self {
        ExportError::Storage(e)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitRecord {
    pub version: String,
    #[serde(default)]
    pub visitor_id: Option<String>,
    #[serde(default)]
    pub first_visit: Option<String>,
    #[serde(default)]
    pub last_visit: Option<String>,
    #[serde(default)]
    pub visit_count: Option<u64>,
    #[serde(default)]
    pub daily_visits: BTreeMap<String, u64>,
    #[serde(default)]
    pub monthly_visits: BTreeMap<String, u64>,
}

impl VisitRecord {
    /// Gather the six persisted keys. Malformed counts and histograms read as
    /// absent/empty, the same way the counter reads them.
    pub fn read_from<S: KeyValueStore>(store: &S) -> Result<Self, StorageError> {
        let visit_count = store
            .get(keys::VISIT_COUNT)?
            .and_then(|raw| raw.trim().parse::<u64>().ok());
        let daily = store.get(keys::DAILY_VISITS)?;
        let monthly = store.get(keys::MONTHLY_VISITS)?;

        Ok(Self {
            version: RECORD_VERSION.to_string(),
            visitor_id: store.get(keys::VISITOR_ID)?.filter(|id| !id.is_empty()),
            first_visit: store.get(keys::FIRST_VISIT)?,
            last_visit: store.get(keys::LAST_VISIT)?,
            visit_count,
            // Capacity is irrelevant for reading; nothing is pruned here.
            daily_visits: RollingHistogram::from_stored(daily.as_deref(), usize::MAX)
                .counts()
                .clone(),
            monthly_visits: RollingHistogram::from_stored(monthly.as_deref(), usize::MAX)
                .counts()
                .clone(),
        })
    }

    fn validate(&self) -> Result<(), ExportError> {
        if self.version != RECORD_VERSION {
            return Err(ExportError::InvalidRecord(format!(
                "unsupported version '{}'",
                self.version
            )));
        }
        if matches!(self.visitor_id.as_deref(), Some("")) {
            return Err(ExportError::InvalidRecord("empty visitorId".to_string()));
        }
        for (field, value) in [
            ("firstVisit", &self.first_visit),
            ("lastVisit", &self.last_visit),
        ] {
            if let Some(ts) = value
                && Timestamp::parse_iso8601(ts).is_none()
            {
                return Err(ExportError::InvalidRecord(format!(
                    "{field} is not an ISO-8601 timestamp: '{ts}'"
                )));
            }
        }
        // Junk keys would sort after every real period and never be evicted.
        if let Some(key) = self
            .daily_visits
            .keys()
            .find(|k| parse_date_key(k).is_none())
        {
            return Err(ExportError::InvalidRecord(format!(
                "dailyVisits key is not a YYYY-MM-DD date: '{key}'"
            )));
        }
        if let Some(key) = self
            .monthly_visits
            .keys()
            .find(|k| parse_month_key(k).is_none())
        {
            return Err(ExportError::InvalidRecord(format!(
                "monthlyVisits key is not a YYYY-MM month: '{key}'"
            )));
        }
        Ok(())
    }
}

/// Serialize the stored record as pretty JSON.
pub fn export_json<S: KeyValueStore>(store: &S) -> Result<String, ExportError> {
    let record = VisitRecord::read_from(store)?;
    serde_json::to_string_pretty(&record)
        .map_err(|e| ExportError::InvalidRecord(format!("serialization failed: {e}")))
}

/// Validate `json` and write it into `store`, pruning histograms to the
/// configured capacities. Histograms are always replaced; scalar fields
/// missing from the document leave the stored value untouched. Nothing is
/// written if validation fails.
pub fn import_json<S: KeyValueStore>(
    store: &mut S,
    json: &str,
    config: &CounterConfig,
) -> Result<VisitRecord, ExportError> {
    let mut record: VisitRecord = serde_json::from_str(json)
        .map_err(|e| ExportError::InvalidRecord(format!("invalid JSON: {e}")))?;
    record.validate()?;

    let mut daily = RollingHistogram::from_counts(record.daily_visits, config.daily_capacity);
    let mut monthly =
        RollingHistogram::from_counts(record.monthly_visits, config.monthly_capacity);
    let dropped = daily.prune().len() + monthly.prune().len();
    if dropped > 0 {
        tracing::warn!(dropped, "import exceeded histogram capacity; oldest periods dropped");
    }
    record.daily_visits = daily.counts().clone();
    record.monthly_visits = monthly.counts().clone();

    store.set(keys::DAILY_VISITS, &daily.to_json())?;
    store.set(keys::MONTHLY_VISITS, &monthly.to_json())?;
    if let Some(count) = record.visit_count {
        store.set(keys::VISIT_COUNT, &count.max(1).to_string())?;
    }
    if let Some(last) = &record.last_visit {
        store.set(keys::LAST_VISIT, last)?;
    }
    if let Some(first) = &record.first_visit {
        store.set(keys::FIRST_VISIT, first)?;
    }
    if let Some(id) = &record.visitor_id {
        store.set(keys::VISITOR_ID, id)?;
    }

    Ok(record)
}
