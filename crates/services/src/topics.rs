//! Topic listing over HTTP, with a short-lived cache and cancellation of
//! superseded fetches.

use std::env;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

use prep_core::time::Clock;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::cache::{CacheKey, TtlCache};
use crate::config::CachePolicy;
use crate::error::TopicError;

#[derive(Clone, Debug)]
pub struct TopicClientConfig {
    pub base_url: String,
}

impl TopicClientConfig {
    /// Reads `PREP_API_BASE`; `None` when unset or blank.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let base_url = env::var("PREP_API_BASE").ok()?;
        if base_url.trim().is_empty() {
            return None;
        }
        Some(Self { base_url })
    }
}

/// `{success, data, error}` wrapper used by the listing endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(default)]
    pub error: Option<String>,
}

impl<T> Envelope<T> {
    /// # Errors
    ///
    /// Returns `TopicError::Api` when `success` is false, or
    /// `TopicError::EmptyResponse` when data is missing.
    pub fn into_result(self) -> Result<T, TopicError> {
        if !self.success {
            return Err(TopicError::Api(
                self.error.unwrap_or_else(|| "unknown error".into()),
            ));
        }
        self.data.ok_or(TopicError::EmptyResponse)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub question_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct TopicQuery {
    pub category: String,
    pub subject: Option<String>,
    pub chapter: Option<String>,
}

impl TopicQuery {
    #[must_use]
    pub fn new(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    #[must_use]
    pub fn chapter(mut self, chapter: impl Into<String>) -> Self {
        self.chapter = Some(chapter.into());
        self
    }

    fn params(&self) -> Vec<(&'static str, &str)> {
        let mut params = vec![("category", self.category.as_str())];
        if let Some(subject) = &self.subject {
            params.push(("subject", subject));
        }
        if let Some(chapter) = &self.chapter {
            params.push(("chapter", chapter));
        }
        params
    }

    fn cache_key(&self) -> String {
        CacheKey::topic_listing(
            &self.category,
            self.subject.as_deref(),
            self.chapter.as_deref(),
        )
    }
}

#[derive(Debug)]
pub struct TopicClient {
    client: Client,
    config: TopicClientConfig,
    cache: Mutex<TtlCache<Vec<Topic>>>,
}

impl TopicClient {
    #[must_use]
    pub fn new(config: TopicClientConfig, policy: CachePolicy, clock: Clock) -> Self {
        Self {
            client: Client::new(),
            config,
            cache: Mutex::new(TtlCache::new(policy, clock)),
        }
    }

    fn cache(&self) -> MutexGuard<'_, TtlCache<Vec<Topic>>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// List topics for a query, served from cache when fresh.
    ///
    /// # Errors
    ///
    /// Returns `TopicError` when the request fails, the status is not a
    /// success, or the envelope reports an error.
    pub async fn list(&self, query: &TopicQuery) -> Result<Vec<Topic>, TopicError> {
        let key = query.cache_key();
        if let Some(hit) = self.cache().get(&key) {
            return Ok(hit);
        }

        let url = format!("{}/api/topics", self.config.base_url.trim_end_matches('/'));
        let response = self.client.get(url).query(&query.params()).send().await?;
        if !response.status().is_success() {
            return Err(TopicError::HttpStatus(response.status()));
        }
        let envelope: Envelope<Vec<Topic>> = response.json().await?;
        let topics = envelope.into_result()?;
        debug!(%key, count = topics.len(), "fetched topics");

        self.cache().set(key, topics.clone());
        Ok(topics)
    }
}

/// Tracks the most recent fetch and aborts it when a fetch for different
/// parameters begins.
#[derive(Debug)]
pub struct LatestFetch<K> {
    current: Option<(K, tokio::task::AbortHandle)>,
}

impl<K> Default for LatestFetch<K> {
    fn default() -> Self {
        Self { current: None }
    }
}

impl<K: PartialEq> LatestFetch<K> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `fut` for `key` on the current runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn spawn<F>(&mut self, key: K, fut: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        if let Some((previous, handle)) = self.current.take() {
            if previous != key && !handle.is_finished() {
                debug!("aborting superseded fetch");
                handle.abort();
            }
        }
        let join = tokio::spawn(fut);
        self.current = Some((key, join.abort_handle()));
        join
    }
}
