//! Entity state store and transition log
//!
//! Both contracts are served by one backend so that a report's transitions
//! and its state overwrite can be applied as a single unit of work via
//! [`TrackingStore::commit`]:
//! - `memory` - process-local store behind one `RwLock`
//! - `journal` - memory store made durable with a JSONL commit journal

pub mod journal;
pub mod memory;

pub use journal::JournalStore;
pub use memory::MemoryStore;

use crate::domain::{EntityState, RecordId, TransitionDraft, TransitionRecord, VehicleId};
use smallvec::SmallVec;

/// Transitions derived from one report (at most EXIT + ENTER)
pub type Drafts = SmallVec<[TransitionDraft; 2]>;

/// Records written for one report
pub type Transitions = SmallVec<[TransitionRecord; 2]>;

/// Errors from the storage layer
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("journal I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("journal serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("journal corrupt at line {line}: {reason}")]
    Corrupt { line: usize, reason: String },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// One current-state record per vehicle, last write wins
pub trait EntityStateStore: Send + Sync {
    /// Unknown vehicles yield `Ok(None)`
    fn get(&self, vehicle_id: &VehicleId) -> Result<Option<EntityState>, StoreError>;

    fn put(&self, state: EntityState) -> Result<(), StoreError>;
}

/// Append-only per-vehicle history of zone transitions
pub trait TransitionLog: Send + Sync {
    fn append(&self, draft: TransitionDraft) -> Result<RecordId, StoreError>;

    /// Newest first: timestamp descending, later insertion first on ties
    fn list_by_entity(&self, vehicle_id: &VehicleId) -> Result<Vec<TransitionRecord>, StoreError>;
}

/// Point-in-time sizes, for metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCounts {
    pub vehicles: usize,
    pub transitions: usize,
}

/// Backend serving both contracts with an atomic combined write
pub trait TrackingStore: EntityStateStore + TransitionLog {
    /// Append `drafts` in order and overwrite the vehicle's state.
    ///
    /// Either everything becomes visible to readers or nothing does.
    fn commit(&self, state: EntityState, drafts: Drafts) -> Result<Transitions, StoreError>;

    fn counts(&self) -> StoreCounts;
}
