//! In-memory tracking store
//!
//! All data sits behind one `parking_lot::RwLock`; a commit takes the write
//! lock once, so queries see either the whole unit of work or none of it.

use super::{
    Drafts, EntityStateStore, StoreCounts, StoreError, TrackingStore, TransitionLog, Transitions,
};
use crate::domain::{EntityState, RecordId, TransitionDraft, TransitionRecord, VehicleId};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use smallvec::smallvec;

#[derive(Default)]
struct Inner {
    states: FxHashMap<VehicleId, EntityState>,
    /// Append-only, in insertion order
    records: Vec<TransitionRecord>,
    /// Indices into `records` per vehicle
    by_vehicle: FxHashMap<VehicleId, Vec<usize>>,
    /// Highest id handed out so far
    last_id: u64,
}

impl Inner {
    fn push_record(&mut self, record: TransitionRecord) {
        self.last_id = self.last_id.max(record.id.0);
        let idx = self.records.len();
        self.by_vehicle.entry(record.vehicle_id.clone()).or_default().push(idx);
        self.records.push(record);
    }

    fn assign_ids(&self, drafts: Drafts) -> Transitions {
        drafts
            .into_iter()
            .zip(self.last_id + 1..)
            .map(|(draft, id)| TransitionRecord::from_draft(RecordId(id), draft))
            .collect()
    }
}

/// Process-local store for entity states and transitions
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a unit of work, running `persist` under the write lock first.
    ///
    /// If `persist` fails nothing is applied. Used by the journal store to
    /// make the durable write and the in-memory apply a single step.
    pub(crate) fn write_through<F>(
        &self,
        state: Option<EntityState>,
        drafts: Drafts,
        persist: F,
    ) -> Result<Transitions, StoreError>
    where
        F: FnOnce(Option<&EntityState>, &[TransitionRecord]) -> Result<(), StoreError>,
    {
        let mut inner = self.inner.write();
        let records = inner.assign_ids(drafts);

        persist(state.as_ref(), &records)?;

        for record in &records {
            inner.push_record(record.clone());
        }
        if let Some(state) = state {
            inner.states.insert(state.vehicle_id.clone(), state);
        }
        Ok(records)
    }

    /// Load previously persisted data without re-persisting it
    pub(crate) fn restore(&self, state: Option<EntityState>, records: Vec<TransitionRecord>) {
        let mut inner = self.inner.write();
        for record in records {
            inner.push_record(record);
        }
        if let Some(state) = state {
            inner.states.insert(state.vehicle_id.clone(), state);
        }
    }
}

impl EntityStateStore for MemoryStore {
    fn get(&self, vehicle_id: &VehicleId) -> Result<Option<EntityState>, StoreError> {
        Ok(self.inner.read().states.get(vehicle_id).cloned())
    }

    fn put(&self, state: EntityState) -> Result<(), StoreError> {
        self.write_through(Some(state), Drafts::new(), |_, _| Ok(())).map(|_| ())
    }
}

impl TransitionLog for MemoryStore {
    fn append(&self, draft: TransitionDraft) -> Result<RecordId, StoreError> {
        let records = self.write_through(None, smallvec![draft], |_, _| Ok(()))?;
        records
            .first()
            .map(|r| r.id)
            .ok_or_else(|| StoreError::Unavailable("append produced no record".to_string()))
    }

    fn list_by_entity(&self, vehicle_id: &VehicleId) -> Result<Vec<TransitionRecord>, StoreError> {
        let inner = self.inner.read();
        let mut records: Vec<TransitionRecord> = inner
            .by_vehicle
            .get(vehicle_id)
            .map(|indices| indices.iter().map(|&i| inner.records[i].clone()).collect())
            .unwrap_or_default();
        drop(inner);

        // Ids grow with insertion order, so id descending breaks timestamp ties
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| b.id.cmp(&a.id)));
        Ok(records)
    }
}

impl TrackingStore for MemoryStore {
    fn commit(&self, state: EntityState, drafts: Drafts) -> Result<Transitions, StoreError> {
        self.write_through(Some(state), drafts, |_, _| Ok(()))
    }

    fn counts(&self) -> StoreCounts {
        let inner = self.inner.read();
        StoreCounts { vehicles: inner.states.len(), transitions: inner.records.len() }
    }
}
