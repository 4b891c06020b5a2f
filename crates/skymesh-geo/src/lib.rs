//! Separation geometry for the swarm.
//!
//! Positions are reported in degrees of latitude/longitude plus altitude in
//! meters. Separation between two aircraft is the planar composite
//!
//! ```text
//! sqrt((dlat * 111000)^2 + (dlon * 111000 * cos(lat))^2 + dalt^2)
//! ```
//!
//! which is accurate to well under a percent at the ranges the conflict
//! detector cares about (a few kilometers). The distance is symmetric and
//! zero only when the positions coincide.
//!
//! The [`PositionTable`] holds the last verified observation per aircraft.
//! Entries for other aircraft are weak references: they are superseded by
//! each new observation (last write wins per id) and expire after the
//! staleness window. They confer no control rights.

mod position;
mod table;

pub use position::{AircraftPosition, Priority, METERS_PER_DEGREE};
pub use table::{PositionTable, STALENESS_WINDOW_MS};

#[cfg(test)]
mod tests {
    use super::*;
    use skymesh_identity::AircraftId;

    #[test]
    fn distance_is_symmetric() {
        let a = AircraftPosition::at(AircraftId(1), 45.0, 9.0, 3000.0);
        let b = AircraftPosition::at(AircraftId(2), 45.01, 9.02, 3500.0);
        let ab = a.separation_distance(&b);
        let ba = b.separation_distance(&a);
        assert!((ab - ba).abs() < 1e-9);
        assert!(ab > 0.0);
    }

    #[test]
    fn distance_to_self_is_zero() {
        let a = AircraftPosition::at(AircraftId(1), 45.0, 9.0, 3000.0);
        assert_eq!(a.separation_distance(&a), 0.0);
    }

    #[test]
    fn coincident_positions_differ_only_in_altitude() {
        let a = AircraftPosition::at(AircraftId(1), 45.0, 9.0, 2000.0);
        let b = AircraftPosition::at(AircraftId(2), 45.0, 9.0, 2300.0);
        assert!((a.separation_distance(&b) - 300.0).abs() < 1e-6);
    }
}
