//! Integration tests: a restarted engine sees the same state and history

use chrono::{TimeZone, Utc};
use geofence_tracker::domain::{
    Bounds, LocationReport, RecordId, StatusKind, TransitionKind, Zone, ZoneId,
};
use geofence_tracker::infra::Metrics;
use geofence_tracker::services::{TransitionEngine, ZoneRegistry};
use geofence_tracker::store::JournalStore;
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;

fn engine_at(path: &Path) -> TransitionEngine {
    let registry = ZoneRegistry::new(vec![
        Zone::new("A", "Alpha", Bounds::new(0.0, 10.0, 0.0, 10.0)),
        Zone::new("B", "Bravo", Bounds::new(20.0, 30.0, 20.0, 30.0)),
    ])
    .unwrap();
    let store = JournalStore::open(path).unwrap();
    TransitionEngine::new(Arc::new(registry), Arc::new(store), Arc::new(Metrics::new()))
}

fn report(vehicle: &str, lat: f64, lng: f64, minute: u32) -> LocationReport {
    LocationReport::new(vehicle, lat, lng)
        .with_timestamp(Utc.with_ymd_and_hms(2024, 5, 1, 8, minute, 0).unwrap())
}

#[test]
fn test_restart_restores_status_and_history() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("journal.jsonl");

    {
        let engine = engine_at(&path);
        engine.process_report(report("V1", 5.0, 5.0, 0)).unwrap();
        engine.process_report(report("V1", 25.0, 25.0, 1)).unwrap();
        engine.process_report(report("V2", 50.0, 50.0, 2)).unwrap();
    }

    let engine = engine_at(&path);

    let status = engine.current_status("V1").unwrap();
    assert_eq!(status.status, StatusKind::InZone);
    assert_eq!(status.current_zone_id, Some(ZoneId::new("B")));
    assert_eq!(status.current_zone_name.as_deref(), Some("Bravo"));

    let history = engine.history("V1").unwrap();
    let kinds: Vec<(TransitionKind, &str)> =
        history.iter().map(|r| (r.kind, r.zone_id.as_str())).collect();
    assert_eq!(
        kinds,
        vec![
            (TransitionKind::Enter, "B"),
            (TransitionKind::Exit, "A"),
            (TransitionKind::Enter, "A"),
        ]
    );

    // Never entered a zone, but its position survives
    let status = engine.current_status("V2").unwrap();
    assert_eq!(status.status, StatusKind::NoZone);
    assert_eq!(status.latitude, Some(50.0));
}

#[test]
fn test_record_ids_continue_after_restart() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("journal.jsonl");

    {
        let engine = engine_at(&path);
        engine.process_report(report("V1", 5.0, 5.0, 0)).unwrap();
    }

    let engine = engine_at(&path);
    let outcome = engine.process_report(report("V1", 50.0, 50.0, 1)).unwrap();

    assert_eq!(outcome.transitions.len(), 1);
    assert_eq!(outcome.transitions[0].id, RecordId(2));
    assert_eq!(outcome.transitions[0].kind, TransitionKind::Exit);
    assert_eq!(engine.store_counts().transitions, 2);
}
