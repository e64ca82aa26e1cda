//! Session counting and rolling visit histograms.
//!
//! One [`VisitCounter::record_visit`] per page load. Every call adds one visit
//! to today's and this month's bucket; only calls that open a new session bump
//! the session count.

use rand::Rng;
use serde::Serialize;

use crate::config::CounterConfig;
use crate::constants::keys;
use crate::histogram::RollingHistogram;
use crate::identity::IdentityStore;
use crate::storage::{KeyValueStore, Result};
use crate::time::{Timestamp, date_key, month_key, previous_date_key, previous_month_key};

/// What the host page gets back from one recorded visit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VisitSnapshot {
    pub visitor_id: String,
    pub is_new_session: bool,
    pub session_count: u64,
}

/// Read-only view over the histograms around a given instant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AnalyticsSummary {
    pub today: String,
    pub yesterday: String,
    pub this_month: String,
    pub last_month: String,
    pub today_visits: u64,
    pub yesterday_visits: u64,
    pub month_visits: u64,
    pub last_month_visits: u64,
    pub total_sessions: u64,
    pub first_seen: Option<String>,
    pub last_seen: Option<String>,
}

/// Decide whether a visit at `now` opens a new session.
///
/// Absent (or empty) `previous` is a new session. A gap strictly greater than
/// `timeout_ms` is a new session; a gap equal to it is not. Negative gaps from
/// a clock that went backwards are short gaps. An unparsable `previous` gives
/// no usable gap and is treated like a short one.
pub fn is_session_boundary(previous: Option<&str>, now: Timestamp, timeout_ms: i64) -> bool {
    let Some(raw) = previous.filter(|s| !s.is_empty()) else {
        return true;
    };
    match Timestamp::parse_iso8601(raw) {
        Some(prev) => now.millis_since(prev) > timeout_ms,
        None => {
            tracing::warn!(last_visit = raw, "unparsable last_visit; not starting a session");
            false
        }
    }
}

pub struct VisitCounter<S> {
    identity: IdentityStore<S>,
    config: CounterConfig,
}

impl<S: KeyValueStore> VisitCounter<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, CounterConfig::default())
    }

    pub fn with_config(store: S, config: CounterConfig) -> Self {
        Self {
            identity: IdentityStore::new(store),
            config,
        }
    }

    pub fn config(&self) -> &CounterConfig {
        &self.config
    }

    pub fn identity(&self) -> &IdentityStore<S> {
        &self.identity
    }

    pub fn store(&self) -> &S {
        self.identity.store()
    }

    pub fn store_mut(&mut self) -> &mut S {
        self.identity.store_mut()
    }

    pub fn into_inner(self) -> S {
        self.identity.into_inner()
    }

    /// Record one page load at `now`.
    ///
    /// Storage failures abort the call. Writes already made before the failure
    /// stay applied: identity, last-seen, session count and the two histograms
    /// are written one after another, not as a unit.
    pub fn record_visit(&mut self, now: Timestamp, rng: &mut impl Rng) -> Result<VisitSnapshot> {
        let identity = self.identity.ensure_identity(now, rng)?;
        let previous = self.identity.record_last_seen(now)?;

        let is_new_session = identity.is_first_ever
            || is_session_boundary(
                previous.as_deref(),
                now,
                self.config.session_timeout_ms(),
            );

        let stored = self.stored_session_count()?;
        let session_count = if identity.is_first_ever {
            1
        } else if is_new_session {
            stored.unwrap_or(0).saturating_add(1)
        } else {
            stored.unwrap_or(0).max(1)
        };
        if stored != Some(session_count) {
            self.store_mut()
                .set(keys::VISIT_COUNT, &session_count.to_string())?;
        }

        let today = date_key(now);
        let mut daily = self.load_histogram(keys::DAILY_VISITS, self.config.daily_capacity)?;
        daily.increment(&today);
        self.store_mut().set(keys::DAILY_VISITS, &daily.to_json())?;

        let this_month = month_key(now);
        let mut monthly =
            self.load_histogram(keys::MONTHLY_VISITS, self.config.monthly_capacity)?;
        monthly.increment(&this_month);
        self.store_mut().set(keys::MONTHLY_VISITS, &monthly.to_json())?;

        tracing::debug!(
            visitor_id = %identity.visitor_id,
            is_new_session,
            session_count,
            day = %today,
            month = %this_month,
            "recorded visit"
        );

        Ok(VisitSnapshot {
            visitor_id: identity.visitor_id,
            is_new_session,
            session_count,
        })
    }

    /// Counts for today, yesterday, this month and last month relative to
    /// `now`. Reads only.
    pub fn summary(&self, now: Timestamp) -> Result<AnalyticsSummary> {
        let daily = self.daily_histogram()?;
        let monthly = self.monthly_histogram()?;

        let today = date_key(now);
        let yesterday = previous_date_key(now);
        let this_month = month_key(now);
        let last_month = previous_month_key(now);

        Ok(AnalyticsSummary {
            today_visits: daily.get(&today),
            yesterday_visits: daily.get(&yesterday),
            month_visits: monthly.get(&this_month),
            last_month_visits: monthly.get(&last_month),
            total_sessions: self.stored_session_count()?.unwrap_or(0),
            first_seen: self.identity.first_seen()?,
            last_seen: self.identity.last_seen()?,
            today,
            yesterday,
            this_month,
            last_month,
        })
    }

    /// True when nothing has been seen yet, or the first visit fell on the same
    /// calendar day as `now`. This is a different notion of "new" from
    /// [`VisitSnapshot::is_new_session`].
    pub fn is_new_visitor_today(&self, now: Timestamp) -> Result<bool> {
        let Some(first_seen) = self.identity.first_seen()? else {
            return Ok(true);
        };
        match Timestamp::parse_iso8601(&first_seen) {
            Some(first) => Ok(date_key(first) == date_key(now)),
            None => {
                tracing::warn!(first_visit = %first_seen, "unparsable first_visit");
                Ok(false)
            }
        }
    }

    pub fn daily_histogram(&self) -> Result<RollingHistogram> {
        self.load_histogram(keys::DAILY_VISITS, self.config.daily_capacity)
    }

    pub fn monthly_histogram(&self) -> Result<RollingHistogram> {
        self.load_histogram(keys::MONTHLY_VISITS, self.config.monthly_capacity)
    }

    fn load_histogram(&self, key: &str, capacity: usize) -> Result<RollingHistogram> {
        let stored = self.store().get(key)?;
        Ok(RollingHistogram::from_stored(stored.as_deref(), capacity))
    }

    /// Stored session count; `None` when absent or not a decimal integer.
    fn stored_session_count(&self) -> Result<Option<u64>> {
        let Some(raw) = self.store().get(keys::VISIT_COUNT)? else {
            return Ok(None);
        };
        match raw.trim().parse::<u64>() {
            Ok(n) => Ok(Some(n)),
            Err(_) => {
                tracing::warn!(visit_count = %raw, "unparsable visit_count; treating as 0");
                Ok(None)
            }
        }
    }
}
