//! Zone registry - containment queries over the configured zone set
//!
//! Zones are kept sorted by zone id (byte-wise ascending). When rectangles
//! overlap, `resolve` returns the first containing zone in that order, so the
//! winner for a given point never depends on load order.
//!
//! The set sits behind a read-mostly lock and is swapped whole on reload;
//! lookups clone an `Arc` and never block each other.

use crate::domain::zone::{validate_all, ZoneError};
use crate::domain::{Zone, ZoneId};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tracing::info;

struct ZoneSet {
    /// Sorted by id ascending
    zones: Vec<Zone>,
    index: FxHashMap<ZoneId, usize>,
}

impl ZoneSet {
    fn build(mut zones: Vec<Zone>) -> Result<Self, ZoneError> {
        validate_all(&zones)?;
        zones.sort_by(|a, b| a.id.cmp(&b.id));

        let index = zones.iter().enumerate().map(|(idx, zone)| (zone.id.clone(), idx)).collect();
        Ok(Self { zones, index })
    }
}

/// Process-wide set of zones, built once at startup
pub struct ZoneRegistry {
    set: RwLock<Arc<ZoneSet>>,
}

impl ZoneRegistry {
    pub fn new(zones: Vec<Zone>) -> Result<Self, ZoneError> {
        let set = ZoneSet::build(zones)?;
        info!(zones = %set.zones.len(), "zone_registry_initialized");
        Ok(Self { set: RwLock::new(Arc::new(set)) })
    }

    #[inline]
    fn snapshot(&self) -> Arc<ZoneSet> {
        self.set.read().clone()
    }

    /// Zone containing the point, lowest zone id first on overlap
    pub fn resolve(&self, lat: f64, lng: f64) -> Option<Zone> {
        self.snapshot().zones.iter().find(|zone| zone.contains(lat, lng)).cloned()
    }

    pub fn get(&self, zone_id: &ZoneId) -> Option<Zone> {
        let set = self.snapshot();
        set.index.get(zone_id).map(|&idx| set.zones[idx].clone())
    }

    /// All zones, sorted by id
    pub fn zones(&self) -> Vec<Zone> {
        self.snapshot().zones.clone()
    }

    pub fn len(&self) -> usize {
        self.snapshot().zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replace the whole zone set; on error the current set stays in place
    pub fn reload(&self, zones: Vec<Zone>) -> Result<usize, ZoneError> {
        let set = ZoneSet::build(zones)?;
        let count = set.zones.len();
        *self.set.write() = Arc::new(set);
        info!(zones = %count, "zone_registry_reloaded");
        Ok(count)
    }
}
