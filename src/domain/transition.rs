//! Entity state, transition records and status views

use crate::domain::types::{VehicleId, ZoneId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Log-assigned, monotonically increasing transition id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Direction of a zone boundary crossing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransitionKind {
    Enter,
    Exit,
}

impl TransitionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionKind::Enter => "ENTER",
            TransitionKind::Exit => "EXIT",
        }
    }
}

/// A transition that has been derived but not yet assigned an id by the log
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionDraft {
    pub vehicle_id: VehicleId,
    pub zone_id: ZoneId,
    pub kind: TransitionKind,
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
}

/// An immutable entry of the transition log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionRecord {
    pub id: RecordId,
    pub vehicle_id: VehicleId,
    pub zone_id: ZoneId,
    #[serde(rename = "transitionType")]
    pub kind: TransitionKind,
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
}

impl TransitionRecord {
    pub fn from_draft(id: RecordId, draft: TransitionDraft) -> Self {
        Self {
            id,
            vehicle_id: draft.vehicle_id,
            zone_id: draft.zone_id,
            kind: draft.kind,
            timestamp: draft.timestamp,
            latitude: draft.latitude,
            longitude: draft.longitude,
        }
    }
}

/// Latest known position and zone membership of one vehicle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityState {
    pub vehicle_id: VehicleId,
    pub latitude: f64,
    pub longitude: f64,
    pub current_zone_id: Option<ZoneId>,
    pub last_update: DateTime<Utc>,
}

/// Zone membership classification for status queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusKind {
    NotFound,
    InZone,
    NoZone,
}

impl StatusKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusKind::NotFound => "NOT_FOUND",
            StatusKind::InZone => "IN_ZONE",
            StatusKind::NoZone => "NO_ZONE",
        }
    }
}

/// Current zone view of a vehicle, as returned by status queries
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneStatus {
    pub vehicle_id: VehicleId,
    pub current_zone_id: Option<ZoneId>,
    pub current_zone_name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub last_update: Option<DateTime<Utc>>,
    pub status: StatusKind,
}

impl ZoneStatus {
    pub fn not_found(vehicle_id: VehicleId) -> Self {
        Self {
            vehicle_id,
            current_zone_id: None,
            current_zone_name: None,
            latitude: None,
            longitude: None,
            last_update: None,
            status: StatusKind::NotFound,
        }
    }
}
