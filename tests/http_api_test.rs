//! Integration tests for the REST API, driven in-process through the router

use bytes::Bytes;
use geofence_tracker::domain::{
    Bounds, EntityState, RecordId, TransitionDraft, TransitionRecord, VehicleId, Zone,
};
use geofence_tracker::infra::Metrics;
use geofence_tracker::io::{handle_request, AppState};
use geofence_tracker::services::{TransitionEngine, ZoneRegistry};
use geofence_tracker::store::{
    Drafts, EntityStateStore, MemoryStore, StoreCounts, StoreError, TrackingStore, TransitionLog,
    Transitions,
};
use http_body_util::{BodyExt, Full};
use hyper::{Method, Request, StatusCode};
use serde_json::Value;
use std::sync::Arc;

fn app_with_store(store: Arc<dyn TrackingStore>, max_body_bytes: usize) -> Arc<AppState> {
    let registry = ZoneRegistry::new(vec![
        Zone::new("A", "Alpha", Bounds::new(0.0, 10.0, 0.0, 10.0)),
        Zone::new("B", "Bravo", Bounds::new(20.0, 30.0, 20.0, 30.0)),
    ])
    .unwrap();
    let metrics = Arc::new(Metrics::new());
    let engine = TransitionEngine::new(Arc::new(registry), store, metrics.clone());
    Arc::new(AppState {
        engine: Arc::new(engine),
        metrics,
        site_id: "test".to_string(),
        max_body_bytes,
    })
}

fn app() -> Arc<AppState> {
    app_with_store(Arc::new(MemoryStore::new()), 4096)
}

async fn call(app: &Arc<AppState>, method: Method, uri: &str, body: &str) -> (StatusCode, Bytes) {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap();
    let resp = handle_request(req, app.clone()).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    (status, bytes)
}

async fn call_json(app: &Arc<AppState>, method: Method, uri: &str, body: &str) -> (StatusCode, Value) {
    let (status, bytes) = call(app, method, uri, body).await;
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn post_event(app: &Arc<AppState>, body: &str) -> (StatusCode, Value) {
    call_json(app, Method::POST, "/api/v1/location-events", body).await
}

#[tokio::test]
async fn test_zone_change_scenario() {
    let app = app();

    let (status, body) = post_event(
        &app,
        r#"{"vehicleId":"V1","latitude":5.0,"longitude":5.0,"timestamp":"2024-05-01T08:00:00Z"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["zoneId"], "A");
    assert_eq!(body["data"]["transitions"][0]["transitionType"], "ENTER");

    let (status, body) = post_event(
        &app,
        r#"{"vehicleId":"V1","latitude":25.0,"longitude":25.0,"timestamp":"2024-05-01T08:01:00Z"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["previousZoneId"], "A");
    assert_eq!(body["data"]["transitions"].as_array().unwrap().len(), 2);

    let (status, body) =
        call_json(&app, Method::GET, "/api/v1/vehicles/V1/current-zone", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "IN_ZONE");
    assert_eq!(body["data"]["currentZoneId"], "B");
    assert_eq!(body["data"]["currentZoneName"], "Bravo");

    let (status, body) =
        call_json(&app, Method::GET, "/api/v1/vehicles/V1/transition-history", "").await;
    assert_eq!(status, StatusCode::OK);
    let history = body["data"].as_array().unwrap();
    let kinds: Vec<(&str, &str)> = history
        .iter()
        .map(|r| (r["transitionType"].as_str().unwrap(), r["zoneId"].as_str().unwrap()))
        .collect();
    assert_eq!(kinds, vec![("ENTER", "B"), ("EXIT", "A"), ("ENTER", "A")]);
}

#[tokio::test]
async fn test_aliases_and_epoch_millis_accepted() {
    let app = app();

    let (status, body) =
        post_event(&app, r#"{"entityId":"V9","lat":5.0,"lng":5.0,"timestamp":1714552200000}"#)
            .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["transitions"][0]["timestamp"], "2024-05-01T08:30:00Z");
}

#[tokio::test]
async fn test_unknown_vehicle_is_not_found_status() {
    let app = app();

    let (status, body) =
        call_json(&app, Method::GET, "/api/v1/vehicles/ghost/current-zone", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "NOT_FOUND");

    let (status, body) =
        call_json(&app, Method::GET, "/api/v1/vehicles/ghost/transition-history", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_invalid_reports_are_bad_requests() {
    let app = app();

    let (status, body) = post_event(&app, r#"{"vehicleId":"V1","latitude":95.0,"longitude":0.0}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().unwrap().contains("invalid coordinates"));

    let (status, _) = post_event(&app, r#"{"vehicleId":"V1","longitude":0.0}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post_event(&app, r#"{"vehicleId":"  ","latitude":1.0,"longitude":1.0}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = post_event(&app, "{not json").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().starts_with("Malformed request body"));

    // Nothing was recorded for the rejected vehicle
    let (_, body) = call_json(&app, Method::GET, "/api/v1/vehicles/V1/current-zone", "").await;
    assert_eq!(body["data"]["status"], "NOT_FOUND");
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let app = app_with_store(Arc::new(MemoryStore::new()), 32);
    let body = format!(r#"{{"vehicleId":"{}","latitude":1.0,"longitude":1.0}}"#, "x".repeat(64));

    let (status, body) = post_event(&app, &body).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["success"], false);
}

struct ReadOnlyStore;

impl EntityStateStore for ReadOnlyStore {
    fn get(&self, _vehicle_id: &VehicleId) -> Result<Option<EntityState>, StoreError> {
        Ok(None)
    }

    fn put(&self, _state: EntityState) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("read-only".to_string()))
    }
}

impl TransitionLog for ReadOnlyStore {
    fn append(&self, _draft: TransitionDraft) -> Result<RecordId, StoreError> {
        Err(StoreError::Unavailable("read-only".to_string()))
    }

    fn list_by_entity(&self, _vehicle_id: &VehicleId) -> Result<Vec<TransitionRecord>, StoreError> {
        Ok(Vec::new())
    }
}

impl TrackingStore for ReadOnlyStore {
    fn commit(&self, _state: EntityState, _drafts: Drafts) -> Result<Transitions, StoreError> {
        Err(StoreError::Unavailable("read-only".to_string()))
    }

    fn counts(&self) -> StoreCounts {
        StoreCounts::default()
    }
}

#[tokio::test]
async fn test_storage_failure_is_internal_error() {
    let app = app_with_store(Arc::new(ReadOnlyStore), 4096);

    let (status, body) = post_event(&app, r#"{"vehicleId":"V1","latitude":5.0,"longitude":5.0}"#).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "Internal Server Error");
}

#[tokio::test]
async fn test_zones_health_and_metrics() {
    let app = app();

    let (status, body) = call_json(&app, Method::GET, "/api/v1/zones", "").await;
    assert_eq!(status, StatusCode::OK);
    let zones = body["data"].as_array().unwrap();
    assert_eq!(zones.len(), 2);
    assert_eq!(zones[0]["zoneId"], "A");
    assert_eq!(zones[0]["zoneName"], "Alpha");
    assert_eq!(zones[0]["maxLat"], 10.0);

    let (status, body) = call(&app, Method::GET, "/health", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], b"ok");

    post_event(&app, r#"{"vehicleId":"V1","latitude":5.0,"longitude":5.0}"#).await;
    let (status, body) = call(&app, Method::GET, "/metrics", "").await;
    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("geofence_reports_total{site=\"test\"} 1"));
    assert!(text.contains("geofence_tracked_vehicles{site=\"test\"} 1"));
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let app = app();

    let (status, body) = call_json(&app, Method::GET, "/api/v1/trucks", "").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);

    let (status, _) = call_json(&app, Method::GET, "/api/v1/location-events", "").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_vehicle_id_in_path_is_percent_decoded() {
    let app = app();

    let (status, _) =
        post_event(&app, r#"{"vehicleId":"truck 7/ü","latitude":5.0,"longitude":5.0}"#).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) =
        call_json(&app, Method::GET, "/api/v1/vehicles/truck%207%2F%C3%BC/current-zone", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "IN_ZONE");
    assert_eq!(body["data"]["vehicleId"], "truck 7/ü");

    let (_, body) =
        call_json(&app, Method::GET, "/api/v1/vehicles/truck%207%2F%C3%BC/transition-history", "")
            .await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, body) =
        call_json(&app, Method::GET, "/api/v1/vehicles/%FF/current-zone", "").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}
