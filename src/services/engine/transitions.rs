//! Report validation and the enter/exit state machine
//!
//! Both are pure: no store access, no clock.

use crate::domain::{LocationReport, TransitionDraft, TransitionKind, VehicleId, ZoneId};
use crate::error::ValidationError;
use crate::store::Drafts;
use chrono::{DateTime, Utc};
use smallvec::smallvec;

/// Checked coordinates of a report
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ValidReport {
    pub vehicle_id: VehicleId,
    pub latitude: f64,
    pub longitude: f64,
}

/// Reject blank ids, missing coordinates and anything outside WGS84 ranges
pub(crate) fn validate(report: &LocationReport) -> Result<ValidReport, ValidationError> {
    let vehicle_id = report.vehicle_id.trim();
    if vehicle_id.is_empty() {
        return Err(ValidationError::BlankVehicleId);
    }

    let (Some(lat), Some(lng)) = (report.latitude, report.longitude) else {
        return Err(ValidationError::MissingCoordinates);
    };

    // NaN fails both range checks
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
        return Err(ValidationError::OutOfRange { lat, lng });
    }

    Ok(ValidReport { vehicle_id: VehicleId::new(vehicle_id), latitude: lat, longitude: lng })
}

/// Transitions implied by moving from `previous` to `current`
///
/// | previous | current | result             |
/// |----------|---------|--------------------|
/// | none     | none    | -                  |
/// | none     | Z       | ENTER(Z)           |
/// | Z        | none    | EXIT(Z)            |
/// | Z        | Z       | -                  |
/// | Z1       | Z2      | EXIT(Z1), ENTER(Z2)|
pub(crate) fn derive_transitions(
    report: &ValidReport,
    previous: Option<&ZoneId>,
    current: Option<&ZoneId>,
    timestamp: DateTime<Utc>,
) -> Drafts {
    let draft = |zone_id: &ZoneId, kind: TransitionKind| TransitionDraft {
        vehicle_id: report.vehicle_id.clone(),
        zone_id: zone_id.clone(),
        kind,
        timestamp,
        latitude: report.latitude,
        longitude: report.longitude,
    };

    match (previous, current) {
        (None, None) => Drafts::new(),
        (None, Some(entered)) => smallvec![draft(entered, TransitionKind::Enter)],
        (Some(exited), None) => smallvec![draft(exited, TransitionKind::Exit)],
        (Some(prev), Some(cur)) if prev == cur => Drafts::new(),
        (Some(prev), Some(cur)) => {
            smallvec![draft(prev, TransitionKind::Exit), draft(cur, TransitionKind::Enter)]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn valid(lat: f64, lng: f64) -> ValidReport {
        ValidReport { vehicle_id: VehicleId::new("v1"), latitude: lat, longitude: lng }
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
    }

    fn kinds(drafts: &Drafts) -> Vec<(TransitionKind, &str)> {
        drafts.iter().map(|d| (d.kind, d.zone_id.as_str())).collect()
    }

    #[test]
    fn test_validate_accepts_extremes() {
        assert!(validate(&LocationReport::new("v1", 90.0, 180.0)).is_ok());
        assert!(validate(&LocationReport::new("v1", -90.0, -180.0)).is_ok());
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let err = validate(&LocationReport::new("v1", 95.0, 0.0)).unwrap_err();
        assert_eq!(err, ValidationError::OutOfRange { lat: 95.0, lng: 0.0 });
        assert!(validate(&LocationReport::new("v1", 0.0, -180.5)).is_err());
        assert!(validate(&LocationReport::new("v1", f64::NAN, 0.0)).is_err());
        assert!(validate(&LocationReport::new("v1", 0.0, f64::INFINITY)).is_err());
    }

    #[test]
    fn test_validate_rejects_missing_fields() {
        let mut report = LocationReport::new("v1", 1.0, 1.0);
        report.longitude = None;
        assert_eq!(validate(&report).unwrap_err(), ValidationError::MissingCoordinates);

        let report = LocationReport::new("   ", 1.0, 1.0);
        assert_eq!(validate(&report).unwrap_err(), ValidationError::BlankVehicleId);
    }

    #[test]
    fn test_validate_trims_vehicle_id() {
        let ok = validate(&LocationReport::new(" v9 ", 1.0, 1.0)).unwrap();
        assert_eq!(ok.vehicle_id, VehicleId::new("v9"));
    }

    #[test]
    fn test_state_machine_table() {
        let a = ZoneId::new("A");
        let b = ZoneId::new("B");
        let report = valid(5.0, 5.0);

        assert!(derive_transitions(&report, None, None, at()).is_empty());
        assert!(derive_transitions(&report, Some(&a), Some(&a), at()).is_empty());
        assert_eq!(
            kinds(&derive_transitions(&report, None, Some(&a), at())),
            vec![(TransitionKind::Enter, "A")]
        );
        assert_eq!(
            kinds(&derive_transitions(&report, Some(&a), None, at())),
            vec![(TransitionKind::Exit, "A")]
        );
        assert_eq!(
            kinds(&derive_transitions(&report, Some(&a), Some(&b), at())),
            vec![(TransitionKind::Exit, "A"), (TransitionKind::Enter, "B")]
        );
    }

    #[test]
    fn test_change_shares_timestamp_and_position() {
        let drafts = derive_transitions(
            &valid(25.0, 26.0),
            Some(&ZoneId::new("A")),
            Some(&ZoneId::new("B")),
            at(),
        );
        assert_eq!(drafts.len(), 2);
        assert!(drafts.iter().all(|d| d.timestamp == at()));
        assert!(drafts.iter().all(|d| d.latitude == 25.0 && d.longitude == 26.0));
    }
}
