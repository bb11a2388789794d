//! Rectangular zone model

use crate::domain::types::ZoneId;
use rustc_hash::FxHashSet;
use serde::Serialize;

/// Inclusive latitude/longitude rectangle
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    pub fn new(min_lat: f64, max_lat: f64, min_lng: f64, max_lng: f64) -> Self {
        Self { min_lat, max_lat, min_lng, max_lng }
    }

    /// Point-in-rectangle test, edges included
    #[inline]
    pub fn contains(&self, lat: f64, lng: f64) -> bool {
        self.min_lat <= lat && lat <= self.max_lat && self.min_lng <= lng && lng <= self.max_lng
    }

    fn is_well_formed(&self) -> bool {
        [self.min_lat, self.max_lat, self.min_lng, self.max_lng].iter().all(|v| v.is_finite())
            && self.min_lat <= self.max_lat
            && self.min_lng <= self.max_lng
    }
}

/// A named rectangular region
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Zone {
    #[serde(rename = "zoneId")]
    pub id: ZoneId,
    #[serde(rename = "zoneName")]
    pub name: String,
    #[serde(flatten)]
    pub bounds: Bounds,
}

impl Zone {
    pub fn new(id: impl Into<String>, name: impl Into<String>, bounds: Bounds) -> Self {
        Self { id: ZoneId::new(id), name: name.into(), bounds }
    }

    #[inline]
    pub fn contains(&self, lat: f64, lng: f64) -> bool {
        self.bounds.contains(lat, lng)
    }

    /// Check the zone is loadable: non-blank id and a finite, ordered rectangle
    pub fn validate(&self) -> Result<(), ZoneError> {
        if self.id.as_str().trim().is_empty() {
            return Err(ZoneError::BlankId);
        }
        if !self.bounds.is_well_formed() {
            return Err(ZoneError::InvalidBounds { zone_id: self.id.clone(), bounds: self.bounds });
        }
        Ok(())
    }
}

/// Check a whole zone set: every zone loadable and every id unique
pub fn validate_all(zones: &[Zone]) -> Result<(), ZoneError> {
    let mut seen = FxHashSet::default();
    for zone in zones {
        zone.validate()?;
        if !seen.insert(&zone.id) {
            return Err(ZoneError::DuplicateId(zone.id.clone()));
        }
    }
    Ok(())
}

/// Errors raised while loading a zone set
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ZoneError {
    #[error("zone id must not be blank")]
    BlankId,
    #[error("zone {zone_id} has invalid bounds {bounds:?}")]
    InvalidBounds { zone_id: ZoneId, bounds: Bounds },
    #[error("duplicate zone id {0}")]
    DuplicateId(ZoneId),
}
