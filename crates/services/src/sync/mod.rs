//! Local-first progress sync: optimistic local state, a save coordinator that
//! persists queued deltas, and the stamps that order their results.

mod coordinator;
mod local;
mod stamp;

pub use coordinator::{PersistPath, SaveCoordinator, SaveOutcome, persist_with_fallback};
pub use local::LocalProgress;
pub use stamp::SaveStamp;

/// User-facing, non-blocking notification produced by a sync step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Saved,
    Retrying { message: String },
    SignInRequired,
}
