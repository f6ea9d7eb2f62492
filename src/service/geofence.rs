use std::future::Future;
use std::time::Duration;

use actix_web::rt::time::timeout;
use serde::{Deserialize, Serialize};

use crate::error::{AttendanceError, AttendanceResult};
use crate::model::qr_code::Coordinates;

/// Mean earth radius (WGS-84), metres.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Great-circle distance between two points, metres.
pub fn haversine_distance(a: Coordinates, b: Coordinates) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_METERS * h.sqrt().min(1.0).asin()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeofenceCheck {
    pub pass: bool,
    /// `None` when either point is missing
    pub distance_meters: Option<f64>,
    /// `false` when the device did not report a location
    pub location_verified: bool,
}

/// No anchor skips geofencing; no reported location passes unverified.
pub fn validate(anchor: Option<Coordinates>, radius_meters: u32, reported: Option<Coordinates>) -> GeofenceCheck {
    match (anchor, reported) {
        (Some(anchor), Some(reported)) => {
            let distance = haversine_distance(anchor, reported);
            GeofenceCheck {
                pass: distance <= f64::from(radius_meters),
                distance_meters: Some(distance),
                location_verified: true,
            }
        }
        (None, reported) => GeofenceCheck {
            pass: true,
            distance_meters: None,
            location_verified: reported.is_some(),
        },
        (Some(_), None) => GeofenceCheck {
            pass: true,
            distance_meters: None,
            location_verified: false,
        },
    }
}

/// What the device's position lookup produced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GeolocationOutcome {
    Located { latitude: f64, longitude: f64 },
    TimedOut,
    Denied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationDenied;

/// Runs a position lookup under `limit`; never waits longer than that.
pub async fn acquire_location<F>(lookup: F, limit: Duration) -> GeolocationOutcome
where
    F: Future<Output = Result<Coordinates, LocationDenied>>,
{
    match timeout(limit, lookup).await {
        Ok(Ok(position)) => GeolocationOutcome::Located {
            latitude: position.latitude,
            longitude: position.longitude,
        },
        Ok(Err(LocationDenied)) => GeolocationOutcome::Denied,
        Err(_) => GeolocationOutcome::TimedOut,
    }
}

/// Turns a reported outcome into an optional position under the clinic policy.
///
/// With `require_location` off, timeouts and denials degrade to "no location".
pub fn resolve_location(outcome: Option<GeolocationOutcome>, require_location: bool) -> AttendanceResult<Option<Coordinates>> {
    match outcome {
        Some(GeolocationOutcome::Located {
            latitude,
            longitude,
        }) => {
            let position = Coordinates::new(latitude, longitude);
            if !position.is_valid() {
                return Err(AttendanceError::validation("Reported location is out of range"));
            }
            Ok(Some(position))
        }
        Some(GeolocationOutcome::TimedOut) if require_location => Err(AttendanceError::Timeout(
            "Timed out while acquiring the device location".to_string(),
        )),
        Some(GeolocationOutcome::Denied) if require_location => Err(AttendanceError::validation(
            "Location permission is required to record attendance",
        )),
        None if require_location => Err(AttendanceError::validation("Location is required")),
        _ => Ok(None),
    }
}
