use std::sync::Arc;

use prep_core::model::{ProgressDelta, ProgressKey, ProgressSnapshot, Question};
use storage::repository::ProgressRepository;
use tracing::{debug, warn};

use crate::config::SyncConfig;
use crate::flush::{BeaconTransport, FlushOutcome, Identity, UnloadFlusher};
use crate::pending::PendingQueue;
use crate::sync::{LocalProgress, Notice, SaveCoordinator, SaveOutcome};

/// Result of answering one question.
#[derive(Debug)]
pub struct AnswerOutcome {
    pub correct: bool,
    pub points_awarded: i64,
    /// The question was already completed; nothing was recorded.
    pub already_answered: bool,
    /// Local progress after the answer (and after reconciliation, if a save ran).
    pub progress: ProgressSnapshot,
    pub save: Option<SaveOutcome>,
    pub notice: Option<Notice>,
}

/// One practice page's progress state for a (user, topic, area).
///
/// Owns its queue, local snapshot, coordinator and flusher; dropping the
/// session without `close` still attempts a beacon flush.
pub struct PracticeSession {
    identity: Option<Identity>,
    config: SyncConfig,
    queue: Arc<PendingQueue>,
    local: Arc<LocalProgress>,
    coordinator: Option<Arc<SaveCoordinator>>,
    flusher: UnloadFlusher,
    closed: bool,
}

impl PracticeSession {
    /// Open a session, fetching remote progress once.
    ///
    /// A missing row or a failed fetch starts from empty progress.
    pub async fn open(
        identity: Option<Identity>,
        topic: &str,
        area: &str,
        repo: Arc<dyn ProgressRepository>,
        beacon: Arc<dyn BeaconTransport>,
        config: SyncConfig,
    ) -> Self {
        let queue = Arc::new(PendingQueue::new(config.retry_cap));

        let initial = match &identity {
            Some(id) => {
                let key = ProgressKey::new(id.user_id.clone(), topic, area);
                match repo.fetch_progress(&key).await {
                    Ok(found) => found.unwrap_or_default(),
                    Err(e) => {
                        warn!(%key, error = %e, "could not load progress, starting empty");
                        ProgressSnapshot::empty()
                    }
                }
            }
            None => ProgressSnapshot::empty(),
        };
        let local = Arc::new(LocalProgress::new(initial));

        let coordinator = identity.as_ref().map(|id| {
            Arc::new(SaveCoordinator::new(
                ProgressKey::new(id.user_id.clone(), topic, area),
                repo,
                Arc::clone(&queue),
                Arc::clone(&local),
            ))
        });

        let flusher = UnloadFlusher::new(
            identity.clone(),
            topic,
            area,
            Arc::clone(&queue),
            coordinator.clone(),
            beacon,
        );

        Self {
            identity,
            config,
            queue,
            local,
            coordinator,
            flusher,
            closed: false,
        }
    }

    #[must_use]
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    #[must_use]
    pub fn progress(&self) -> ProgressSnapshot {
        self.local.snapshot()
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Record an answer: optimistic local update, enqueue, then save.
    ///
    /// Without a signed-in user the answer is kept locally only.
    pub async fn answer(&mut self, question: &Question, choice: usize) -> AnswerOutcome {
        let correct = question.is_correct(choice);

        if self.local.snapshot().has_completed(question.id()) {
            debug!(question = %question.id(), "question already answered");
            return AnswerOutcome {
                correct,
                points_awarded: 0,
                already_answered: true,
                progress: self.local.snapshot(),
                save: None,
                notice: None,
            };
        }

        let delta =
            ProgressDelta::for_answer(question.id(), correct, self.config.points_per_correct);
        let points_awarded = delta.points;
        let optimistic = self.local.apply(&delta);

        let Some(coordinator) = &self.coordinator else {
            return AnswerOutcome {
                correct,
                points_awarded,
                already_answered: false,
                progress: optimistic,
                save: None,
                notice: Some(Notice::SignInRequired),
            };
        };

        self.queue.enqueue(delta);
        let save = coordinator.save_pending().await;
        let notice = save.notice();

        AnswerOutcome {
            correct,
            points_awarded,
            already_answered: false,
            progress: self.local.snapshot(),
            save: Some(save),
            notice,
        }
    }

    /// Retry any queued deltas through the regular save path.
    pub async fn retry_pending(&self) -> SaveOutcome {
        match &self.coordinator {
            Some(coordinator) => coordinator.save_pending().await,
            None => SaveOutcome::Idle,
        }
    }

    /// Page-hide hook: hand unsaved progress to the beacon if it accepts.
    pub fn on_page_hide(&self) -> Option<FlushOutcome> {
        self.flusher.flush_beacon()
    }

    /// Tear the session down, flushing whatever is still queued.
    pub async fn close(mut self) -> FlushOutcome {
        self.closed = true;
        self.flusher.flush().await
    }
}

impl Drop for PracticeSession {
    fn drop(&mut self) {
        if self.closed || self.queue.is_empty() {
            return;
        }
        if self.flusher.flush_beacon().is_none() {
            warn!(
                pending = self.queue.len(),
                "session dropped with unsaved progress and no beacon"
            );
        }
    }
}
