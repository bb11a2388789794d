//! Per-vehicle mutual exclusion
//!
//! Reports for the same vehicle must not interleave their read-modify-write
//! of state and log. Each vehicle id maps to its own mutex; different
//! vehicles never contend beyond the short map lookup. Slots are dropped
//! once the last holder releases them, so the map only holds vehicles that
//! are currently being processed.

use crate::domain::VehicleId;
use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::{Mutex, RawMutex};
use rustc_hash::FxHashMap;
use std::sync::Arc;

type Slot = Arc<Mutex<()>>;

#[derive(Default)]
pub struct EntityLocks {
    slots: Mutex<FxHashMap<VehicleId, Slot>>,
}

/// Held for the duration of one vehicle's unit of work
pub struct EntityGuard<'a> {
    locks: &'a EntityLocks,
    vehicle_id: VehicleId,
    slot: Slot,
    guard: Option<ArcMutexGuard<RawMutex, ()>>,
}

impl EntityLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until no other report for `vehicle_id` is in flight
    pub fn lock(&self, vehicle_id: &VehicleId) -> EntityGuard<'_> {
        let slot = self.slots.lock().entry(vehicle_id.clone()).or_default().clone();
        let guard = slot.lock_arc();
        EntityGuard { locks: self, vehicle_id: vehicle_id.clone(), slot, guard: Some(guard) }
    }

    /// Number of vehicles currently holding or waiting on a lock
    pub fn active(&self) -> usize {
        self.slots.lock().len()
    }
}

impl Drop for EntityGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();

        // Map entry + our handle; anyone else waiting holds a third reference
        let mut slots = self.locks.slots.lock();
        if let Some(existing) = slots.get(&self.vehicle_id) {
            if Arc::ptr_eq(existing, &self.slot) && Arc::strong_count(&self.slot) == 2 {
                slots.remove(&self.vehicle_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_slot_released_after_guard_drop() {
        let locks = EntityLocks::new();
        {
            let _guard = locks.lock(&VehicleId::new("v1"));
            assert_eq!(locks.active(), 1);
        }
        assert_eq!(locks.active(), 0);
    }

    #[test]
    fn test_different_vehicles_do_not_block() {
        let locks = EntityLocks::new();
        let _a = locks.lock(&VehicleId::new("v1"));
        let _b = locks.lock(&VehicleId::new("v2"));
        assert_eq!(locks.active(), 2);
    }

    #[test]
    fn test_same_vehicle_is_serialized() {
        let locks = EntityLocks::new();
        let inside = AtomicUsize::new(0);
        let max_inside = AtomicUsize::new(0);
        let id = VehicleId::new("v1");

        thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..20 {
                        let _guard = locks.lock(&id);
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        max_inside.fetch_max(now, Ordering::SeqCst);
                        thread::sleep(Duration::from_micros(50));
                        inside.fetch_sub(1, Ordering::SeqCst);
                    }
                });
            }
        });

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        assert_eq!(locks.active(), 0);
    }
}
