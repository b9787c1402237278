#![forbid(unsafe_code)]

pub mod cache;
pub mod config;
pub mod error;
pub mod flush;
pub mod pending;
pub mod practice;
pub mod questions;
pub mod sync;
pub mod topics;

pub use prep_core::Clock;

pub use cache::{CacheKey, TtlCache};
pub use config::{CachePolicy, SyncConfig};
pub use error::{QuestionServiceError, SyncError, TopicError};
pub use flush::{
    BeaconTransport, FlushOutcome, HttpBeacon, Identity, NoBeacon, UnloadFlusher, UnloadPayload,
    apply_unload_payload,
};
pub use pending::PendingQueue;
pub use practice::{AnswerOutcome, PracticeSession};
pub use questions::QuestionService;
pub use sync::{LocalProgress, Notice, PersistPath, SaveCoordinator, SaveOutcome, SaveStamp};
pub use topics::{Envelope, LatestFetch, Topic, TopicClient, TopicClientConfig, TopicQuery};
