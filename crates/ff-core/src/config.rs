use serde::{Deserialize, Serialize};

use crate::constants::{DAILY_CAPACITY, MONTHLY_CAPACITY, SESSION_TIMEOUT_MS};

/// Tunables for [`VisitCounter`](crate::VisitCounter). Defaults are the
/// 30-minute session gap and the 60-day / 12-month retention windows.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CounterConfig {
    pub session_timeout_minutes: u64,
    pub daily_capacity: usize,
    pub monthly_capacity: usize,
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            session_timeout_minutes: (SESSION_TIMEOUT_MS / 60_000) as u64,
            daily_capacity: DAILY_CAPACITY,
            monthly_capacity: MONTHLY_CAPACITY,
        }
    }
}

impl CounterConfig {
    pub fn session_timeout_ms(&self) -> i64 {
        i64::try_from(self.session_timeout_minutes)
            .unwrap_or(i64::MAX)
            .saturating_mul(60_000)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.daily_capacity == 0 {
            return Err("daily_capacity must be at least 1".to_string());
        }
        if self.monthly_capacity == 0 {
            return Err("monthly_capacity must be at least 1".to_string());
        }
        Ok(())
    }
}
