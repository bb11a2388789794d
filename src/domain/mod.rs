//! Domain models - core business types
//!
//! This module contains the canonical data types used throughout the system:
//! - `Zone` - a named rectangular region with inclusive lat/lng bounds
//! - `EntityState` - last known position and zone of one vehicle
//! - `TransitionRecord` - an ENTER or EXIT event in the transition log
//! - `LocationReport` - an ingress position report

pub mod report;
pub mod transition;
pub mod types;
pub mod zone;

// Re-export commonly used types at module level
pub use report::LocationReport;
pub use transition::{
    EntityState, RecordId, StatusKind, TransitionDraft, TransitionKind, TransitionRecord,
    ZoneStatus,
};
pub use types::{VehicleId, ZoneId};
pub use zone::{Bounds, Zone};
