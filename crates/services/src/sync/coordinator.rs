use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use prep_core::model::{ProgressDelta, ProgressKey, ProgressSnapshot};
use prep_core::reducer;
use storage::repository::{ProgressRepository, StorageError};
use tracing::{debug, info, warn};

use super::Notice;
use super::local::LocalProgress;
use super::stamp::SaveStamp;
use crate::error::SyncError;
use crate::pending::PendingQueue;

//
// ─── PERSISTENCE ───────────────────────────────────────────────────────────────
//

/// Which write succeeded in the fallback chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistPath {
    Upsert,
    Insert,
    Update,
}

/// Write `snapshot` for `key`: upsert on the unique key, then plain insert,
/// then targeted update.
///
/// # Errors
///
/// Returns the error of the final update attempt when all three writes fail.
pub async fn persist_with_fallback(
    repo: &dyn ProgressRepository,
    key: &ProgressKey,
    snapshot: &ProgressSnapshot,
) -> Result<PersistPath, StorageError> {
    match repo.upsert_progress(key, snapshot).await {
        Ok(()) => return Ok(PersistPath::Upsert),
        Err(e) => warn!(%key, error = %e, "progress upsert failed, trying insert"),
    }
    match repo.insert_progress(key, snapshot).await {
        Ok(()) => return Ok(PersistPath::Insert),
        Err(e) => warn!(%key, error = %e, "progress insert failed, trying update"),
    }
    repo.update_progress(key, snapshot)
        .await
        .map(|()| PersistPath::Update)
}

//
// ─── OUTCOME ───────────────────────────────────────────────────────────────────
//

#[derive(Debug)]
pub enum SaveOutcome {
    /// Nothing was queued.
    Idle,
    /// Another save cycle is in flight; queued deltas wait for the next one.
    Skipped,
    Saved {
        stamp: SaveStamp,
        snapshot: ProgressSnapshot,
        path: PersistPath,
        /// False when a newer cycle was issued before this one finished.
        applied: bool,
    },
    Failed {
        error: SyncError,
        requeued: usize,
        dropped: usize,
    },
}

impl SaveOutcome {
    /// Notification to surface for this outcome, if any.
    #[must_use]
    pub fn notice(&self) -> Option<Notice> {
        match self {
            SaveOutcome::Saved { applied: true, .. } => Some(Notice::Saved),
            SaveOutcome::Failed { .. } => Some(Notice::Retrying {
                message: "Couldn't save your progress, retrying shortly".into(),
            }),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_saved(&self) -> bool {
        matches!(self, SaveOutcome::Saved { .. })
    }
}

//
// ─── COORDINATOR ───────────────────────────────────────────────────────────────
//

/// Clears the in-flight flag on every exit path, including cancellation.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Persists queued deltas for one progress key, one cycle at a time.
pub struct SaveCoordinator {
    key: ProgressKey,
    repo: Arc<dyn ProgressRepository>,
    queue: Arc<PendingQueue>,
    local: Arc<LocalProgress>,
    in_flight: AtomicBool,
}

impl SaveCoordinator {
    #[must_use]
    pub fn new(
        key: ProgressKey,
        repo: Arc<dyn ProgressRepository>,
        queue: Arc<PendingQueue>,
        local: Arc<LocalProgress>,
    ) -> Self {
        Self {
            key,
            repo,
            queue,
            local,
            in_flight: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn key(&self) -> &ProgressKey {
        &self.key
    }

    #[must_use]
    pub fn is_saving(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Run a save cycle if deltas are queued and no cycle is in flight.
    pub async fn save_pending(&self) -> SaveOutcome {
        if self.queue.is_empty() {
            return SaveOutcome::Idle;
        }
        let Some(_guard) = InFlight::acquire(&self.in_flight) else {
            debug!(key = %self.key, "save already in flight, deferring");
            return SaveOutcome::Skipped;
        };
        self.run_cycle().await
    }

    /// Run a save cycle without consulting the in-flight flag.
    ///
    /// Used on teardown, where skipping would lose the queued deltas. The
    /// resulting write can race an in-flight cycle on the same remote row.
    pub async fn save_pending_forced(&self) -> SaveOutcome {
        if self.queue.is_empty() {
            return SaveOutcome::Idle;
        }
        self.run_cycle().await
    }

    async fn run_cycle(&self) -> SaveOutcome {
        let stamp = self.local.begin_save();
        let deltas = self.queue.drain();
        if deltas.is_empty() {
            return SaveOutcome::Idle;
        }
        debug!(key = %self.key, %stamp, deltas = deltas.len(), "save cycle started");

        match self.persist(&deltas).await {
            Ok((snapshot, path)) => {
                let pending = self.queue.snapshot();
                let applied = self.local.reconcile(stamp, snapshot.clone(), &pending);
                if applied {
                    info!(key = %self.key, %stamp, points = snapshot.points, "progress saved");
                } else {
                    debug!(key = %self.key, %stamp, "newer save issued, result not applied");
                }
                SaveOutcome::Saved {
                    stamp,
                    snapshot,
                    path,
                    applied,
                }
            }
            Err(error) => {
                let total = deltas.len();
                let dropped = self.queue.requeue(deltas);
                warn!(key = %self.key, %stamp, error = %error, requeued = total - dropped, "progress save failed");
                SaveOutcome::Failed {
                    error,
                    requeued: total - dropped,
                    dropped,
                }
            }
        }
    }

    async fn persist(
        &self,
        deltas: &[ProgressDelta],
    ) -> Result<(ProgressSnapshot, PersistPath), SyncError> {
        let remote = self
            .repo
            .fetch_progress(&self.key)
            .await?
            .unwrap_or_default();
        let merged = reducer::merge(&remote, deltas);
        let path = persist_with_fallback(self.repo.as_ref(), &self.key, &merged).await?;
        Ok((merged, path))
    }
}
