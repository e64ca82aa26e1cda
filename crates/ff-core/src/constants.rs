/// Inactivity gap after which the next visit opens a new session (30 minutes).
pub const SESSION_TIMEOUT_MS: i64 = 30 * 60 * 1000;

/// Daily histogram keeps at most this many date keys.
pub const DAILY_CAPACITY: usize = 60;

/// Monthly histogram keeps at most this many month keys.
pub const MONTHLY_CAPACITY: usize = 12;

/// Prefix of every generated visitor identifier.
pub const VISITOR_ID_PREFIX: &str = "VIS";

/// Length of the random base36 suffix of a visitor identifier.
pub const VISITOR_ID_SUFFIX_LEN: usize = 12;

/// Persisted keys. These are the literal names in the shared key-value scope.
pub mod keys {
    pub const VISITOR_ID: &str = "visitor_id";
    pub const FIRST_VISIT: &str = "first_visit";
    pub const LAST_VISIT: &str = "last_visit";
    pub const VISIT_COUNT: &str = "visit_count";
    pub const DAILY_VISITS: &str = "daily_visits";
    pub const MONTHLY_VISITS: &str = "monthly_visits";

    /// Every key owned by the counter, in export order.
    pub const ALL: [&str; 6] = [
        VISITOR_ID,
        FIRST_VISIT,
        LAST_VISIT,
        VISIT_COUNT,
        DAILY_VISITS,
        MONTHLY_VISITS,
    ];
}
