//! Services - business logic and state management
//!
//! This module contains the core business logic services:
//! - `engine` - Report processing and transition derivation
//! - `zone_registry` - Zone set and containment queries
//! - `entity_locks` - Per-vehicle serialization of reports

pub mod engine;
pub mod entity_locks;
pub mod zone_registry;

// Re-export commonly used types
pub use engine::{ReportOutcome, TransitionEngine, UNKNOWN_ZONE_NAME};
pub use entity_locks::EntityLocks;
pub use zone_registry::ZoneRegistry;
