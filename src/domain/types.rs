//! Shared identifier types

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;

/// Newtype wrapper for vehicle (entity) IDs to provide type safety
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VehicleId(pub String);

impl VehicleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for VehicleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for VehicleId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Newtype wrapper for zone IDs to provide type safety
///
/// Ordering is byte-wise on the underlying string; the zone registry relies
/// on it for its overlap tie-break.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZoneId(pub String);

impl ZoneId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ZoneId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ZoneId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zone_id_ordering_is_bytewise() {
        let mut ids = vec![ZoneId::new("b"), ZoneId::new("B"), ZoneId::new("a")];
        ids.sort();
        assert_eq!(ids, vec![ZoneId::new("B"), ZoneId::new("a"), ZoneId::new("b")]);
    }

    #[test]
    fn test_ids_serialize_as_plain_strings() {
        let json = serde_json::to_string(&VehicleId::new("v1")).unwrap();
        assert_eq!(json, "\"v1\"");
        let zone: ZoneId = serde_json::from_str("\"CPK\"").unwrap();
        assert_eq!(zone.as_str(), "CPK");
    }
}
