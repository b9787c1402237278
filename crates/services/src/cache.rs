//! In-memory TTL cache used to skip redundant fetches within a session.
//!
//! Not a durability layer: everything is lost when the owner is dropped.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use prep_core::model::Difficulty;
use prep_core::time::Clock;

use crate::config::CachePolicy;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    data: V,
    stored_at: DateTime<Utc>,
}

/// String-keyed cache with a maximum entry age and a bounded size.
///
/// Expired entries read as absent and are evicted on access. When the cache
/// grows past capacity the entries with the oldest timestamps go first.
#[derive(Debug)]
pub struct TtlCache<V> {
    entries: HashMap<String, CacheEntry<V>>,
    ttl: Duration,
    capacity: usize,
    clock: Clock,
}

impl<V: Clone> TtlCache<V> {
    #[must_use]
    pub fn new(policy: CachePolicy, clock: Clock) -> Self {
        Self {
            entries: HashMap::new(),
            ttl: policy.ttl,
            capacity: policy.capacity,
            clock,
        }
    }

    /// Returns a copy of the cached value, or `None` if missing or expired.
    pub fn get(&mut self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let expired = match self.entries.get(key) {
            Some(entry) => self.is_expired(entry, now),
            None => return None,
        };
        if expired {
            self.entries.remove(key);
            return None;
        }
        self.entries.get(key).map(|entry| entry.data.clone())
    }

    /// Store `data` stamped with the current time, then prune.
    pub fn set(&mut self, key: impl Into<String>, data: V) {
        let stored_at = self.clock.now();
        self.entries.insert(key.into(), CacheEntry { data, stored_at });
        self.prune(stored_at);
    }

    pub fn remove(&mut self, key: &str) -> Option<V> {
        self.entries.remove(key).map(|entry| entry.data)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clock_mut(&mut self) -> &mut Clock {
        &mut self.clock
    }

    fn is_expired(&self, entry: &CacheEntry<V>, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(entry.stored_at) > self.ttl
    }

    fn prune(&mut self, now: DateTime<Utc>) {
        let ttl = self.ttl;
        self.entries
            .retain(|_, entry| now.signed_duration_since(entry.stored_at) <= ttl);

        while self.entries.len() > self.capacity {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.stored_at)
                .map(|(key, _)| key.clone());
            match oldest {
                Some(key) => {
                    self.entries.remove(&key);
                }
                None => break,
            }
        }
    }
}

/// Builders for the composite keys the caches are addressed by.
pub struct CacheKey;

impl CacheKey {
    /// `category:topic:difficulty:page`, with `all` for an unfiltered difficulty.
    #[must_use]
    pub fn question_page(
        category: &str,
        topic: &str,
        difficulty: Option<Difficulty>,
        page: u32,
    ) -> String {
        format!(
            "{category}:{topic}:{}:{page}",
            difficulty.map_or("all", Difficulty::as_str)
        )
    }

    #[must_use]
    pub fn difficulty_counts(category: &str, topic: &str) -> String {
        format!("{category}:{topic}:counts")
    }

    #[must_use]
    pub fn topic_listing(category: &str, subject: Option<&str>, chapter: Option<&str>) -> String {
        format!(
            "topics:{category}:{}:{}",
            subject.unwrap_or(""),
            chapter.unwrap_or("")
        )
    }
}
