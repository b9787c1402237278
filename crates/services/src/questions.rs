use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use prep_core::model::{Difficulty, DifficultyCounts, QuestionPage};
use prep_core::time::Clock;
use storage::repository::QuestionRepository;
use tracing::debug;

use crate::cache::{CacheKey, TtlCache};
use crate::config::SyncConfig;
use crate::error::QuestionServiceError;

fn lock<V>(cache: &Mutex<TtlCache<V>>) -> MutexGuard<'_, TtlCache<V>> {
    cache.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Paginated question delivery through the practice-page cache.
pub struct QuestionService {
    repo: Arc<dyn QuestionRepository>,
    page_size: u32,
    pages: Mutex<TtlCache<QuestionPage>>,
    counts: Mutex<TtlCache<DifficultyCounts>>,
}

impl QuestionService {
    #[must_use]
    pub fn new(repo: Arc<dyn QuestionRepository>, config: &SyncConfig, clock: Clock) -> Self {
        Self {
            repo,
            page_size: config.page_size.max(1),
            pages: Mutex::new(TtlCache::new(config.practice_cache, clock)),
            counts: Mutex::new(TtlCache::new(config.practice_cache, clock)),
        }
    }

    #[must_use]
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Question counts per difficulty, cached.
    ///
    /// # Errors
    ///
    /// Returns `QuestionServiceError::Storage` if the count query fails.
    pub async fn counts(
        &self,
        category: &str,
        topic: &str,
    ) -> Result<DifficultyCounts, QuestionServiceError> {
        let key = CacheKey::difficulty_counts(category, topic);
        if let Some(hit) = lock(&self.counts).get(&key) {
            return Ok(hit);
        }
        let counts = self.repo.count_by_difficulty(category, topic).await?;
        lock(&self.counts).set(key, counts);
        Ok(counts)
    }

    /// Fetch a 1-based page of questions, ordered by their order field.
    ///
    /// # Errors
    ///
    /// Returns `QuestionServiceError::InvalidPage` for page 0, or storage errors.
    pub async fn page(
        &self,
        category: &str,
        topic: &str,
        difficulty: Option<Difficulty>,
        page: u32,
    ) -> Result<QuestionPage, QuestionServiceError> {
        if page == 0 {
            return Err(QuestionServiceError::InvalidPage);
        }
        let key = CacheKey::question_page(category, topic, difficulty, page);
        if let Some(hit) = lock(&self.pages).get(&key) {
            debug!(%key, "question page cache hit");
            return Ok(hit);
        }

        let counts = self.counts(category, topic).await?;
        let total = difficulty.map_or_else(|| counts.total(), |d| counts.get(d));
        let total_pages = u32::try_from(total.div_ceil(u64::from(self.page_size)))
            .unwrap_or(u32::MAX);

        let questions = if page > total_pages {
            Vec::new()
        } else {
            let offset = u64::from(page - 1) * u64::from(self.page_size);
            self.repo
                .question_page(category, topic, difficulty, offset, self.page_size)
                .await?
        };

        let result = QuestionPage {
            questions,
            page,
            total_pages,
            total,
        };
        lock(&self.pages).set(key, result.clone());
        Ok(result)
    }

    /// Drop every cached page and count.
    pub fn clear_cache(&self) {
        lock(&self.pages).clear();
        lock(&self.counts).clear();
    }
}
