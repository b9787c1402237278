//! Best-effort delivery of unsaved progress when a session is torn down.

use std::sync::Arc;

use prep_core::model::{ProgressDelta, ProgressKey, ProgressSnapshot, UserId};
use prep_core::reducer;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use storage::repository::ProgressRepository;
use tracing::{debug, info, warn};

use crate::error::SyncError;
use crate::pending::PendingQueue;
use crate::sync::{SaveCoordinator, SaveOutcome, persist_with_fallback};

/// Signed-in user as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    pub email: Option<String>,
}

/// Body of an unload delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnloadPayload {
    pub updates: Vec<ProgressDelta>,
    pub user_id: UserId,
    pub topic: String,
    pub area: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl UnloadPayload {
    #[must_use]
    pub fn key(&self) -> ProgressKey {
        ProgressKey::new(self.user_id.clone(), self.topic.clone(), self.area.clone())
    }
}

//
// ─── TRANSPORT ─────────────────────────────────────────────────────────────────
//

/// Fire-and-forget delivery that survives the sender going away.
///
/// `send` returns whether the payload was accepted for delivery, never whether
/// it arrived.
pub trait BeaconTransport: Send + Sync {
    fn send(&self, payload: &UnloadPayload) -> bool;
}

/// Transport that never accepts; flushes always take the fallback path.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBeacon;

impl BeaconTransport for NoBeacon {
    fn send(&self, _payload: &UnloadPayload) -> bool {
        false
    }
}

/// Posts the payload as JSON from a detached task on the current runtime.
#[derive(Clone)]
pub struct HttpBeacon {
    client: Client,
    endpoint: String,
}

impl HttpBeacon {
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
        }
    }

    /// Reads `PREP_BEACON_URL`; `None` when unset or blank.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let endpoint = std::env::var("PREP_BEACON_URL").ok()?;
        if endpoint.trim().is_empty() {
            return None;
        }
        Some(Self::new(endpoint))
    }
}

impl BeaconTransport for HttpBeacon {
    fn send(&self, payload: &UnloadPayload) -> bool {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return false;
        };
        let body = match serde_json::to_vec(payload) {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "could not encode unload payload");
                return false;
            }
        };
        let request = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body);
        handle.spawn(async move {
            match request.send().await {
                Ok(resp) => debug!(status = %resp.status(), "unload beacon delivered"),
                Err(e) => debug!(error = %e, "unload beacon failed"),
            }
        });
        true
    }
}

//
// ─── FLUSHER ───────────────────────────────────────────────────────────────────
//

#[derive(Debug)]
pub enum FlushOutcome {
    NoUser,
    NothingPending,
    /// Handed to the beacon transport; delivery is unconfirmed.
    Beacon { updates: usize },
    /// The beacon refused; the regular save path ran instead.
    Fallback(SaveOutcome),
}

/// Flushes the pending queue on teardown.
pub struct UnloadFlusher {
    identity: Option<Identity>,
    topic: String,
    area: String,
    queue: Arc<PendingQueue>,
    coordinator: Option<Arc<SaveCoordinator>>,
    beacon: Arc<dyn BeaconTransport>,
}

impl UnloadFlusher {
    #[must_use]
    pub fn new(
        identity: Option<Identity>,
        topic: impl Into<String>,
        area: impl Into<String>,
        queue: Arc<PendingQueue>,
        coordinator: Option<Arc<SaveCoordinator>>,
        beacon: Arc<dyn BeaconTransport>,
    ) -> Self {
        Self {
            identity,
            topic: topic.into(),
            area: area.into(),
            queue,
            coordinator,
            beacon,
        }
    }

    fn payload(&self, identity: &Identity, updates: Vec<ProgressDelta>) -> UnloadPayload {
        UnloadPayload {
            updates,
            user_id: identity.user_id.clone(),
            topic: self.topic.clone(),
            area: self.area.clone(),
            email: identity.email.clone(),
        }
    }

    /// Try the beacon only. Usable where awaiting is impossible, such as `Drop`.
    ///
    /// Returns `None` when the beacon refused and the queue was left untouched.
    pub fn flush_beacon(&self) -> Option<FlushOutcome> {
        let Some(identity) = &self.identity else {
            return Some(FlushOutcome::NoUser);
        };
        let updates = self.queue.snapshot();
        if updates.is_empty() {
            return Some(FlushOutcome::NothingPending);
        }
        let count = updates.len();
        if self.beacon.send(&self.payload(identity, updates)) {
            // Delivered at most once; the regular path must not resend.
            let _ = self.queue.drain();
            info!(updates = count, "unsaved progress handed to beacon");
            return Some(FlushOutcome::Beacon { updates: count });
        }
        None
    }

    /// Beacon first, then the regular save path as a best-effort fallback.
    pub async fn flush(&self) -> FlushOutcome {
        if let Some(outcome) = self.flush_beacon() {
            return outcome;
        }
        match &self.coordinator {
            Some(coordinator) => {
                debug!("beacon unavailable, flushing through save coordinator");
                FlushOutcome::Fallback(coordinator.save_pending_forced().await)
            }
            None => FlushOutcome::NoUser,
        }
    }
}

/// Receiving side of an unload delivery: merge the payload's deltas into the
/// stored snapshot for its key.
///
/// # Errors
///
/// Returns `SyncError::MissingUser` for a blank user id, or storage errors
/// from the fetch or the fallback write chain.
pub async fn apply_unload_payload(
    repo: &dyn ProgressRepository,
    payload: &UnloadPayload,
) -> Result<ProgressSnapshot, SyncError> {
    if payload.user_id.as_str().trim().is_empty() {
        return Err(SyncError::MissingUser);
    }
    let key = payload.key();
    let current = repo.fetch_progress(&key).await?.unwrap_or_default();
    if payload.updates.is_empty() {
        return Ok(current);
    }
    let merged = reducer::merge(&current, &payload.updates);
    persist_with_fallback(repo, &key, &merged).await?;
    info!(%key, updates = payload.updates.len(), "applied unload payload");
    Ok(merged)
}
