//! Transition engine - zone membership tracking and event orchestration
//!
//! The engine is the central report processor that coordinates:
//! - Report validation (rejects before touching any state)
//! - Zone resolution against the registry
//! - Enter/exit derivation from prior and new zone
//! - One atomic commit of transitions plus state overwrite
//!
//! Reports for the same vehicle are serialized through [`EntityLocks`];
//! different vehicles proceed in parallel.

mod transitions;

use crate::domain::{
    EntityState, LocationReport, StatusKind, TransitionRecord, VehicleId, ZoneId, ZoneStatus,
};
use crate::error::TrackingError;
use crate::infra::metrics::Metrics;
use crate::services::entity_locks::EntityLocks;
use crate::services::zone_registry::ZoneRegistry;
use crate::store::{StoreCounts, TrackingStore, Transitions};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use transitions::{derive_transitions, validate};

/// Name reported for a stored zone id that is no longer registered
pub const UNKNOWN_ZONE_NAME: &str = "Unknown Zone";

/// Result of processing one report
#[derive(Debug, Clone)]
pub struct ReportOutcome {
    pub vehicle_id: VehicleId,
    pub previous_zone_id: Option<ZoneId>,
    pub zone_id: Option<ZoneId>,
    pub timestamp: DateTime<Utc>,
    /// Records written, in log order
    pub transitions: Transitions,
}

/// Processes position reports into zone transitions
pub struct TransitionEngine {
    registry: Arc<ZoneRegistry>,
    store: Arc<dyn TrackingStore>,
    locks: EntityLocks,
    metrics: Arc<Metrics>,
    clock: fn() -> DateTime<Utc>,
}

impl TransitionEngine {
    pub fn new(
        registry: Arc<ZoneRegistry>,
        store: Arc<dyn TrackingStore>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self { registry, store, locks: EntityLocks::new(), metrics, clock: Utc::now }
    }

    /// Replace the source of default timestamps
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    pub fn registry(&self) -> &ZoneRegistry {
        &self.registry
    }

    pub fn store_counts(&self) -> StoreCounts {
        self.store.counts()
    }

    /// Process a single report
    ///
    /// Validation failures leave state and log untouched. On success the
    /// derived transitions and the state overwrite are committed together.
    /// A timestamp older than the vehicle's `last_update` is raised to it.
    pub fn process_report(&self, report: LocationReport) -> Result<ReportOutcome, TrackingError> {
        let process_start = Instant::now();

        let result = self.apply_report(report);

        match &result {
            Ok(outcome) => {
                for record in &outcome.transitions {
                    self.metrics.record_transition(record.kind);
                }
                let latency_us = process_start.elapsed().as_micros() as u64;
                self.metrics.record_report_processed(latency_us);
            }
            Err(e) if e.is_caller_fault() => self.metrics.record_report_rejected(),
            Err(_) => self.metrics.record_report_failed(),
        }
        result
    }

    fn apply_report(&self, report: LocationReport) -> Result<ReportOutcome, TrackingError> {
        let valid = match validate(&report) {
            Ok(valid) => valid,
            Err(e) => {
                warn!(vehicle_id = %report.vehicle_id, error = %e, "report_rejected");
                return Err(e.into());
            }
        };

        let _guard = self.locks.lock(&valid.vehicle_id);

        let prior = self.store.get(&valid.vehicle_id).inspect_err(|e| {
            error!(vehicle_id = %valid.vehicle_id, error = %e, "state_lookup_failed");
        })?;

        // Assigned once, under the lock, so every record of this report shares
        // it. Never earlier than the stored last_update: history is ordered by
        // timestamp and must keep folding to the stored zone.
        let requested = report.timestamp.unwrap_or_else(self.clock);
        let timestamp = match &prior {
            Some(state) if requested < state.last_update => {
                debug!(
                    vehicle_id = %valid.vehicle_id,
                    requested = %requested,
                    last_update = %state.last_update,
                    "stale_timestamp_clamped"
                );
                state.last_update
            }
            _ => requested,
        };
        let previous = prior.and_then(|state| state.current_zone_id);

        let zone_id = self.registry.resolve(valid.latitude, valid.longitude).map(|zone| zone.id);

        let drafts = derive_transitions(&valid, previous.as_ref(), zone_id.as_ref(), timestamp);

        let state = EntityState {
            vehicle_id: valid.vehicle_id.clone(),
            latitude: valid.latitude,
            longitude: valid.longitude,
            current_zone_id: zone_id.clone(),
            last_update: timestamp,
        };

        let transitions = self.store.commit(state, drafts).inspect_err(|e| {
            error!(vehicle_id = %valid.vehicle_id, error = %e, "report_commit_failed");
        })?;

        log_transition(&valid.vehicle_id, previous.as_ref(), zone_id.as_ref());

        Ok(ReportOutcome {
            vehicle_id: valid.vehicle_id,
            previous_zone_id: previous,
            zone_id,
            timestamp,
            transitions,
        })
    }

    /// Current zone view of a vehicle; unknown vehicles are `NOT_FOUND`
    ///
    /// The id is trimmed the same way as on ingest.
    pub fn current_status(&self, vehicle_id: &str) -> Result<ZoneStatus, TrackingError> {
        let vehicle_id = VehicleId::new(vehicle_id.trim());
        let Some(state) = self.store.get(&vehicle_id)? else {
            return Ok(ZoneStatus::not_found(vehicle_id));
        };

        let zone_name = state.current_zone_id.as_ref().map(|zone_id| {
            self.registry
                .get(zone_id)
                .map(|zone| zone.name)
                .unwrap_or_else(|| UNKNOWN_ZONE_NAME.to_string())
        });
        let status =
            if state.current_zone_id.is_some() { StatusKind::InZone } else { StatusKind::NoZone };

        Ok(ZoneStatus {
            vehicle_id: state.vehicle_id,
            current_zone_id: state.current_zone_id,
            current_zone_name: zone_name,
            latitude: Some(state.latitude),
            longitude: Some(state.longitude),
            last_update: Some(state.last_update),
            status,
        })
    }

    /// Transition history, newest first
    pub fn history(&self, vehicle_id: &str) -> Result<Vec<TransitionRecord>, TrackingError> {
        Ok(self.store.list_by_entity(&VehicleId::new(vehicle_id.trim()))?)
    }
}

fn log_transition(vehicle_id: &VehicleId, previous: Option<&ZoneId>, current: Option<&ZoneId>) {
    match (previous, current) {
        (None, Some(zone)) => info!(vehicle_id = %vehicle_id, zone = %zone, "zone_entered"),
        (Some(zone), None) => info!(vehicle_id = %vehicle_id, zone = %zone, "zone_exited"),
        (Some(from), Some(to)) if from != to => {
            info!(vehicle_id = %vehicle_id, from = %from, to = %to, "zone_changed")
        }
        _ => debug!(vehicle_id = %vehicle_id, zone = ?current, "position_refreshed"),
    }
}
