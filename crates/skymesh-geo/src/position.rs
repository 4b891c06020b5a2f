//! Aircraft state vectors and the separation distance model.

use serde::{Deserialize, Serialize};
use skymesh_identity::AircraftId;

/// Meters per degree of latitude (and of longitude at the equator).
pub const METERS_PER_DEGREE: f64 = 111_000.0;

/// Right-of-way priority of an aircraft.
///
/// Ordered: an emergency outranks everything, so `Priority::Emergency >
/// Priority::High` etc. The temporal resolution strategy delays the
/// lower-priority aircraft.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum Priority {
    /// Routine traffic.
    Low,
    /// Scheduled traffic.
    #[default]
    Medium,
    /// Time-critical traffic.
    High,
    /// Declared emergency - never delayed.
    Emergency,
}

/// One aircraft's last known state vector.
///
/// Mutated only by the owning aircraft or by an accepted conflict
/// resolution; every new observation supersedes the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AircraftPosition {
    /// Reporting aircraft.
    pub aircraft: AircraftId,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Altitude in meters.
    pub altitude: f64,
    /// Heading in degrees, [0, 360).
    pub heading: f64,
    /// Airspeed in m/s.
    pub airspeed: f64,
    /// Vertical speed in m/s, positive up.
    pub vertical_speed: f64,
    /// Right-of-way priority.
    pub priority: Priority,
    /// Observation time, unix milliseconds.
    pub timestamp_ms: u64,
}

impl AircraftPosition {
    /// A stationary position at the given coordinates, for tests and
    /// bootstrap. Heading north, zero speed, medium priority, timestamp 0.
    pub fn at(aircraft: AircraftId, latitude: f64, longitude: f64, altitude: f64) -> Self {
        Self {
            aircraft,
            latitude,
            longitude,
            altitude,
            heading: 0.0,
            airspeed: 0.0,
            vertical_speed: 0.0,
            priority: Priority::default(),
            timestamp_ms: 0,
        }
    }

    /// Composite 3D separation distance to another aircraft, in meters.
    ///
    /// Planar approximation with the longitude scale taken at the mean
    /// latitude of the pair, which keeps the distance exactly symmetric.
    pub fn separation_distance(&self, other: &Self) -> f64 {
        let mean_lat = 0.5 * (self.latitude + other.latitude);
        let dlat = (self.latitude - other.latitude) * METERS_PER_DEGREE;
        let dlon =
            (self.longitude - other.longitude) * METERS_PER_DEGREE * mean_lat.to_radians().cos();
        let dalt = self.altitude - other.altitude;
        (dlat * dlat + dlon * dlon + dalt * dalt).sqrt()
    }

    /// Horizontal (lateral) component of the separation, in meters.
    pub fn lateral_distance(&self, other: &Self) -> f64 {
        let mean_lat = 0.5 * (self.latitude + other.latitude);
        let dlat = (self.latitude - other.latitude) * METERS_PER_DEGREE;
        let dlon =
            (self.longitude - other.longitude) * METERS_PER_DEGREE * mean_lat.to_radians().cos();
        (dlat * dlat + dlon * dlon).sqrt()
    }

    /// Whether this observation is older than `window_ms` at time `now_ms`.
    pub fn is_stale(&self, now_ms: u64, window_ms: u64) -> bool {
        now_ms.saturating_sub(self.timestamp_ms) > window_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_ordering() {
        assert!(Priority::Low < Priority::Medium);
        assert!(Priority::Medium < Priority::High);
        assert!(Priority::High < Priority::Emergency);
    }

    #[test]
    fn one_degree_of_latitude() {
        let a = AircraftPosition::at(AircraftId(1), 0.0, 0.0, 0.0);
        let b = AircraftPosition::at(AircraftId(2), 1.0, 0.0, 0.0);
        assert!((a.separation_distance(&b) - METERS_PER_DEGREE).abs() < 1e-6);
    }

    #[test]
    fn longitude_shrinks_with_latitude() {
        let eq_a = AircraftPosition::at(AircraftId(1), 0.0, 0.0, 0.0);
        let eq_b = AircraftPosition::at(AircraftId(2), 0.0, 1.0, 0.0);
        let hi_a = AircraftPosition::at(AircraftId(1), 60.0, 0.0, 0.0);
        let hi_b = AircraftPosition::at(AircraftId(2), 60.0, 1.0, 0.0);
        let at_equator = eq_a.separation_distance(&eq_b);
        let at_sixty = hi_a.separation_distance(&hi_b);
        // cos(60 deg) = 0.5
        assert!((at_sixty / at_equator - 0.5).abs() < 1e-6);
    }

    #[test]
    fn staleness_window() {
        let mut p = AircraftPosition::at(AircraftId(1), 0.0, 0.0, 0.0);
        p.timestamp_ms = 1_000;
        assert!(!p.is_stale(30_000, 30_000));
        assert!(p.is_stale(31_001, 30_000));
        // Clock skew: an observation from the future is not stale.
        assert!(!p.is_stale(500, 30_000));
    }
}
