#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use prep_core::model::{
    Difficulty, DifficultyCounts, ProgressKey, ProgressSnapshot, Question, QuestionId, UserId,
};
use services::{BeaconTransport, Identity, UnloadPayload};
use storage::repository::{
    InMemoryRepository, ProgressRepository, QuestionRepository, StorageError,
};
use tokio::sync::{Notify, oneshot};

pub fn identity() -> Identity {
    Identity {
        user_id: UserId::new("user_2x"),
        email: Some("aspirant@example.com".into()),
    }
}

pub fn key() -> ProgressKey {
    ProgressKey::new(identity().user_id, "polity", "ssc")
}

pub fn question(id: u64, answer_index: usize) -> Question {
    Question::new(
        QuestionId::new(id),
        "ssc",
        "polity",
        Difficulty::Easy,
        i64::try_from(id).unwrap(),
        format!("Question {id}"),
        vec!["A".into(), "B".into(), "C".into(), "D".into()],
        answer_index,
        None,
    )
    .unwrap()
}

pub fn ids(snapshot_ids: &std::collections::BTreeSet<QuestionId>) -> Vec<u64> {
    snapshot_ids.iter().map(QuestionId::value).collect()
}

/// Progress repository whose operations can be switched to fail.
#[derive(Default)]
pub struct FlakyRepo {
    pub inner: InMemoryRepository,
    pub fail_fetch: AtomicBool,
    pub fail_upsert: AtomicBool,
    pub fail_insert: AtomicBool,
    pub fail_update: AtomicBool,
    pub writes: AtomicUsize,
}

impl FlakyRepo {
    pub fn failing_writes() -> Self {
        let repo = Self::default();
        repo.set_writes_failing(true);
        repo
    }

    pub fn set_writes_failing(&self, failing: bool) {
        self.fail_upsert.store(failing, Ordering::SeqCst);
        self.fail_insert.store(failing, Ordering::SeqCst);
        self.fail_update.store(failing, Ordering::SeqCst);
    }
}

fn offline() -> StorageError {
    StorageError::Connection("offline".into())
}

#[async_trait]
impl ProgressRepository for FlakyRepo {
    async fn fetch_progress(
        &self,
        key: &ProgressKey,
    ) -> Result<Option<ProgressSnapshot>, StorageError> {
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(offline());
        }
        self.inner.fetch_progress(key).await
    }

    async fn upsert_progress(
        &self,
        key: &ProgressKey,
        snapshot: &ProgressSnapshot,
    ) -> Result<(), StorageError> {
        if self.fail_upsert.load(Ordering::SeqCst) {
            return Err(offline());
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.upsert_progress(key, snapshot).await
    }

    async fn insert_progress(
        &self,
        key: &ProgressKey,
        snapshot: &ProgressSnapshot,
    ) -> Result<(), StorageError> {
        if self.fail_insert.load(Ordering::SeqCst) {
            return Err(offline());
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.insert_progress(key, snapshot).await
    }

    async fn update_progress(
        &self,
        key: &ProgressKey,
        snapshot: &ProgressSnapshot,
    ) -> Result<(), StorageError> {
        if self.fail_update.load(Ordering::SeqCst) {
            return Err(offline());
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.update_progress(key, snapshot).await
    }
}

/// Progress repository whose first fetch returns only after the gate opens.
pub struct GatedRepo {
    pub inner: InMemoryRepository,
    gate: Mutex<Option<oneshot::Receiver<()>>>,
    pub entered: Notify,
}

impl GatedRepo {
    pub fn new(inner: InMemoryRepository) -> (Arc<Self>, oneshot::Sender<()>) {
        let (tx, rx) = oneshot::channel();
        let repo = Arc::new(Self {
            inner,
            gate: Mutex::new(Some(rx)),
            entered: Notify::new(),
        });
        (repo, tx)
    }
}

#[async_trait]
impl ProgressRepository for GatedRepo {
    async fn fetch_progress(
        &self,
        key: &ProgressKey,
    ) -> Result<Option<ProgressSnapshot>, StorageError> {
        let found = self.inner.fetch_progress(key).await?;
        let gate = self.gate.lock().unwrap().take();
        if let Some(rx) = gate {
            self.entered.notify_one();
            let _ = rx.await;
        }
        Ok(found)
    }

    async fn upsert_progress(
        &self,
        key: &ProgressKey,
        snapshot: &ProgressSnapshot,
    ) -> Result<(), StorageError> {
        self.inner.upsert_progress(key, snapshot).await
    }

    async fn insert_progress(
        &self,
        key: &ProgressKey,
        snapshot: &ProgressSnapshot,
    ) -> Result<(), StorageError> {
        self.inner.insert_progress(key, snapshot).await
    }

    async fn update_progress(
        &self,
        key: &ProgressKey,
        snapshot: &ProgressSnapshot,
    ) -> Result<(), StorageError> {
        self.inner.update_progress(key, snapshot).await
    }
}

/// Beacon that records every payload it is handed.
pub struct RecordingBeacon {
    pub accept: bool,
    pub sent: Mutex<Vec<UnloadPayload>>,
}

impl RecordingBeacon {
    pub fn accepting() -> Arc<Self> {
        Arc::new(Self {
            accept: true,
            sent: Mutex::new(Vec::new()),
        })
    }

    pub fn sent(&self) -> Vec<UnloadPayload> {
        self.sent.lock().unwrap().clone()
    }
}

impl BeaconTransport for RecordingBeacon {
    fn send(&self, payload: &UnloadPayload) -> bool {
        if self.accept {
            self.sent.lock().unwrap().push(payload.clone());
        }
        self.accept
    }
}

/// Question repository that counts how often it is queried.
#[derive(Default)]
pub struct CountingQuestions {
    pub inner: InMemoryRepository,
    pub count_calls: AtomicUsize,
    pub page_calls: AtomicUsize,
}

#[async_trait]
impl QuestionRepository for CountingQuestions {
    async fn count_by_difficulty(
        &self,
        category: &str,
        topic: &str,
    ) -> Result<DifficultyCounts, StorageError> {
        self.count_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.count_by_difficulty(category, topic).await
    }

    async fn question_page(
        &self,
        category: &str,
        topic: &str,
        difficulty: Option<Difficulty>,
        offset: u64,
        limit: u32,
    ) -> Result<Vec<Question>, StorageError> {
        self.page_calls.fetch_add(1, Ordering::SeqCst);
        self.inner
            .question_page(category, topic, difficulty, offset, limit)
            .await
    }

    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError> {
        self.inner.upsert_question(question).await
    }
}
