use std::env;

use chrono::Duration;
use prep_core::model::POINTS_PER_CORRECT;

/// Age and size bounds for a `TtlCache`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub ttl: Duration,
    pub capacity: usize,
}

impl CachePolicy {
    /// Practice page: questions and counts, 5 minutes, 50 entries.
    #[must_use]
    pub fn practice_page() -> Self {
        Self {
            ttl: Duration::minutes(5),
            capacity: 50,
        }
    }

    /// Topic listing, 2 minutes, 50 entries.
    #[must_use]
    pub fn topic_listing() -> Self {
        Self {
            ttl: Duration::minutes(2),
            capacity: 50,
        }
    }
}

/// Knobs for progress sync and question delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Maximum number of deltas kept in the queue when re-enqueuing after a failed save.
    pub retry_cap: usize,
    pub points_per_correct: i64,
    pub page_size: u32,
    pub practice_cache: CachePolicy,
    pub topic_cache: CachePolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            retry_cap: 10,
            points_per_correct: POINTS_PER_CORRECT,
            page_size: 10,
            practice_cache: CachePolicy::practice_page(),
            topic_cache: CachePolicy::topic_listing(),
        }
    }
}

impl SyncConfig {
    /// Defaults overridden by `PREP_RETRY_CAP` and `PREP_PAGE_SIZE` when set and valid.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(cap) = parse_env::<usize>("PREP_RETRY_CAP") {
            config.retry_cap = cap;
        }
        if let Some(size) = parse_env::<u32>("PREP_PAGE_SIZE").filter(|s| *s > 0) {
            config.page_size = size;
        }
        config
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("Invalid {key} value {raw:?}, using default");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_practice_page() {
        let config = SyncConfig::default();
        assert_eq!(config.retry_cap, 10);
        assert_eq!(config.points_per_correct, 100);
        assert_eq!(config.practice_cache.ttl, Duration::minutes(5));
        assert_eq!(config.practice_cache.capacity, 50);
        assert_eq!(config.topic_cache.ttl, Duration::minutes(2));
    }
}
