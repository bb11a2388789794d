//! Error types for report processing and queries
//!
//! [`TrackingError`] separates caller faults (bad input) from system faults
//! (storage unavailable) so the HTTP layer can map them to 4xx and 5xx.

use crate::store::StoreError;

/// A position report that cannot be processed as given
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("vehicleId must not be blank")]
    BlankVehicleId,
    #[error("coordinates cannot be null")]
    MissingCoordinates,
    #[error("invalid coordinates: lat={lat}, lng={lng}")]
    OutOfRange { lat: f64, lng: f64 },
}

/// Errors surfaced by the transition engine
#[derive(Debug, thiserror::Error)]
pub enum TrackingError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),
}

impl TrackingError {
    /// True when the caller can fix the request (4xx), false for system faults (5xx)
    pub fn is_caller_fault(&self) -> bool {
        matches!(self, TrackingError::Validation(_))
    }
}
