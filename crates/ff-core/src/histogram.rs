use std::collections::BTreeMap;

/// A bounded mapping from calendar-period key to visit count.
///
/// Keys are fixed-width (`YYYY-MM-DD` or `YYYY-MM`), so lexicographic order is
/// chronological order. Once the key count exceeds `capacity`, the smallest
/// keys are evicted first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RollingHistogram {
    counts: BTreeMap<String, u64>,
    capacity: usize,
}

impl RollingHistogram {
    pub fn new(capacity: usize) -> Self {
        Self {
            counts: BTreeMap::new(),
            capacity,
        }
    }

    /// Wrap existing counts without pruning.
    pub fn from_counts(counts: BTreeMap<String, u64>, capacity: usize) -> Self {
        Self { counts, capacity }
    }

    /// Parse a stored JSON object of `key -> non-negative integer`.
    /// No pruning happens here; the next [`increment`](Self::increment) does it.
    pub fn from_json(text: &str, capacity: usize) -> serde_json::Result<Self> {
        let counts: BTreeMap<String, u64> = serde_json::from_str(text)?;
        Ok(Self { counts, capacity })
    }

    /// Lenient loader for persisted state: absent or unparsable text yields an
    /// empty histogram. Lost counts are not recovered.
    pub fn from_stored(stored: Option<&str>, capacity: usize) -> Self {
        match stored {
            None => Self::new(capacity),
            Some(text) => Self::from_json(text, capacity).unwrap_or_else(|e| {
                tracing::warn!("discarding malformed histogram ({e}); starting empty");
                Self::new(capacity)
            }),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.counts).unwrap_or_else(|_| "{}".to_string())
    }

    /// Add one visit to `key`, then prune to capacity.
    ///
    /// The key just touched is never the one evicted unless it is older than
    /// `capacity` other keys already present.
    pub fn increment(&mut self, key: &str) -> u64 {
        let count = self.counts.entry(key.to_string()).or_insert(0);
        *count = count.saturating_add(1);
        let count = *count;
        self.prune();
        count
    }

    /// Drop the smallest keys until at most `capacity` remain.
    /// Returns the evicted keys in ascending order.
    pub fn prune(&mut self) -> Vec<String> {
        let mut evicted = Vec::new();
        while self.counts.len() > self.capacity {
            match self.counts.pop_first() {
                Some((key, _)) => evicted.push(key),
                None => break,
            }
        }
        evicted
    }

    pub fn get(&self, key: &str) -> u64 {
        self.counts.get(key).copied().unwrap_or(0)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.counts.values().fold(0, |acc, n| acc.saturating_add(*n))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counts.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.counts.keys().map(String::as_str)
    }

    pub fn counts(&self) -> &BTreeMap<String, u64> {
        &self.counts
    }
}
