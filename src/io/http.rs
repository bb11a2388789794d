//! REST API over the transition engine
//!
//! Routes:
//! - `POST /api/v1/location-events` - ingest one position report
//! - `GET /api/v1/vehicles/{id}/current-zone` - current zone status
//! - `GET /api/v1/vehicles/{id}/transition-history` - transitions, newest first
//! - `GET /api/v1/zones` - registered zones
//! - `GET /health`, `GET /metrics`

use crate::domain::{LocationReport, TransitionRecord, VehicleId, ZoneId};
use crate::error::TrackingError;
use crate::infra::metrics::Metrics;
use crate::io::api::{json_response, text_response, ApiResponse};
use crate::io::prometheus::format_prometheus_metrics;
use crate::services::TransitionEngine;
use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Body;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use percent_encoding::percent_decode_str;
use serde::Serialize;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

const API_PREFIX: &str = "/api/v1";

/// Shared state handed to every request
pub struct AppState {
    pub engine: Arc<TransitionEngine>,
    pub metrics: Arc<Metrics>,
    pub site_id: String,
    pub max_body_bytes: usize,
}

/// Acknowledgement returned for an accepted location event
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EventAccepted<'a> {
    vehicle_id: &'a VehicleId,
    previous_zone_id: Option<&'a ZoneId>,
    zone_id: Option<&'a ZoneId>,
    transitions: &'a [TransitionRecord],
}

enum VehicleQuery {
    CurrentZone,
    History,
}

/// Split `/api/v1/vehicles/{id}/{query}` into its still-encoded id and query kind
fn parse_vehicle_path(path: &str) -> Option<(&str, VehicleQuery)> {
    let rest = path.strip_prefix(API_PREFIX)?.strip_prefix("/vehicles/")?;
    let (vehicle_id, query) = rest.rsplit_once('/')?;
    if vehicle_id.is_empty() || vehicle_id.contains('/') {
        return None;
    }
    match query {
        "current-zone" => Some((vehicle_id, VehicleQuery::CurrentZone)),
        "transition-history" => Some((vehicle_id, VehicleQuery::History)),
        _ => None,
    }
}

/// Route a request to its handler
///
/// Generic over the request body so tests can drive it with in-memory bodies.
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = match (&method, path.as_str()) {
        (&Method::POST, "/api/v1/location-events") => handle_location_event(req, &state).await,
        (&Method::GET, "/api/v1/zones") => handle_zones(&state),
        (&Method::GET, "/health") => {
            text_response(StatusCode::OK, "text/plain; charset=utf-8", "ok".to_string())
        }
        (&Method::GET, "/metrics") => {
            let body = format_prometheus_metrics(
                &state.metrics,
                state.engine.store_counts(),
                &state.site_id,
            );
            text_response(StatusCode::OK, "text/plain; version=0.0.4; charset=utf-8", body)
        }
        (&Method::GET, p) => match parse_vehicle_path(p) {
            Some((raw_id, query)) => match percent_decode_str(raw_id).decode_utf8() {
                Ok(vehicle_id) => match query {
                    VehicleQuery::CurrentZone => handle_current_zone(&vehicle_id, &state),
                    VehicleQuery::History => handle_history(&vehicle_id, &state),
                },
                Err(_) => {
                    warn!(path = %p, "vehicle_id_not_utf8");
                    json_response(
                        StatusCode::BAD_REQUEST,
                        &ApiResponse::error("Vehicle id is not valid UTF-8"),
                    )
                }
            },
            None => not_found(),
        },
        _ => not_found(),
    };

    debug!(method = %method, path = %path, status = response.status().as_u16(), "http_request");
    Ok(response)
}

fn not_found() -> Response<Full<Bytes>> {
    json_response(StatusCode::NOT_FOUND, &ApiResponse::error("Not Found"))
}

async fn handle_location_event<B>(req: Request<B>, state: &AppState) -> Response<Full<Bytes>>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let body = match Limited::new(req.into_body(), state.max_body_bytes).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            warn!(limit = state.max_body_bytes, "location_event_too_large");
            return json_response(
                StatusCode::PAYLOAD_TOO_LARGE,
                &ApiResponse::error("Request body too large"),
            );
        }
        Err(e) => {
            warn!(error = %e, "location_event_body_error");
            return json_response(
                StatusCode::BAD_REQUEST,
                &ApiResponse::error("Could not read request body"),
            );
        }
    };

    let report: LocationReport = match serde_json::from_slice(&body) {
        Ok(report) => report,
        Err(e) => {
            warn!(error = %e, "location_event_malformed");
            return json_response(
                StatusCode::BAD_REQUEST,
                &ApiResponse::error(format!("Malformed request body: {e}")),
            );
        }
    };

    info!(vehicle_id = %report.vehicle_id, "location_event_received");

    // Journal writes block, keep them off the reactor
    let engine = state.engine.clone();
    let result = match tokio::task::spawn_blocking(move || engine.process_report(report)).await {
        Ok(result) => result,
        Err(e) => {
            error!(error = %e, "location_event_task_failed");
            return json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &ApiResponse::error("Internal Server Error"),
            );
        }
    };

    match result {
        Ok(outcome) => {
            let accepted = EventAccepted {
                vehicle_id: &outcome.vehicle_id,
                previous_zone_id: outcome.previous_zone_id.as_ref(),
                zone_id: outcome.zone_id.as_ref(),
                transitions: &outcome.transitions,
            };
            json_response(
                StatusCode::OK,
                &ApiResponse::success("Location event processed successfully", accepted),
            )
        }
        Err(e) => error_response(&e),
    }
}

fn handle_current_zone(vehicle_id: &str, state: &AppState) -> Response<Full<Bytes>> {
    match state.engine.current_status(vehicle_id) {
        Ok(status) => json_response(
            StatusCode::OK,
            &ApiResponse::success("Current zone status retrieved", status),
        ),
        Err(e) => error_response(&e),
    }
}

fn handle_history(vehicle_id: &str, state: &AppState) -> Response<Full<Bytes>> {
    match state.engine.history(vehicle_id) {
        Ok(records) => json_response(
            StatusCode::OK,
            &ApiResponse::success("Transition history retrieved", records),
        ),
        Err(e) => error_response(&e),
    }
}

fn handle_zones(state: &AppState) -> Response<Full<Bytes>> {
    json_response(
        StatusCode::OK,
        &ApiResponse::success("Zones retrieved", state.engine.registry().zones()),
    )
}

/// Caller faults become 400 with the reason; storage faults are 500 without detail
fn error_response(err: &TrackingError) -> Response<Full<Bytes>> {
    if err.is_caller_fault() {
        json_response(StatusCode::BAD_REQUEST, &ApiResponse::error(err.to_string()))
    } else {
        json_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            &ApiResponse::error("Internal Server Error"),
        )
    }
}

/// Start the HTTP server
///
/// Runs until the shutdown channel flips to `true`.
pub async fn start_http_server(
    addr: SocketAddr,
    state: Arc<AppState>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;

    info!(addr = %addr, site = %state.site_id, "http_server_started");

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, _addr)) => {
                        let io = TokioIo::new(stream);
                        let state = state.clone();

                        tokio::spawn(async move {
                            let service = service_fn(move |req| {
                                let state = state.clone();
                                async move { handle_request(req, state).await }
                            });

                            if let Err(e) = http1::Builder::new()
                                .serve_connection(io, service)
                                .await
                            {
                                error!(error = %e, "http_connection_error");
                            }
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "http_accept_error");
                    }
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("http_server_shutdown");
                    return Ok(());
                }
            }
        }
    }
}
