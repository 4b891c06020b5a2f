//! Pairwise conflict scan over the position table.

use skymesh_geo::{AircraftPosition, PositionTable};

use crate::record::ConflictRecord;

/// Default detection threshold, meters.
pub const DETECTION_THRESHOLD_M: f64 = 5_000.0;

/// Lazy scan of all unordered aircraft pairs below a separation threshold.
///
/// The scan is a side-effect-free iterator: it reads a snapshot of the
/// table, yields each unordered pair at most once, never pairs an aircraft
/// with itself, and can simply be re-created to restart. Positions are
/// visited in aircraft-id order, so two nodes with identical tables produce
/// identical scans.
pub struct ConflictScan<'a> {
    positions: Vec<&'a AircraftPosition>,
    threshold_m: f64,
    i: usize,
    j: usize,
}

impl<'a> ConflictScan<'a> {
    /// Scan `table` for pairs closer than `threshold_m`.
    pub fn new(table: &'a PositionTable, threshold_m: f64) -> Self {
        Self {
            positions: table.sorted(),
            threshold_m,
            i: 0,
            j: 1,
        }
    }
}

impl Iterator for ConflictScan<'_> {
    type Item = ConflictRecord;

    fn next(&mut self) -> Option<ConflictRecord> {
        while self.i + 1 < self.positions.len() {
            if self.j >= self.positions.len() {
                self.i += 1;
                self.j = self.i + 1;
                continue;
            }
            let a = self.positions[self.i];
            let b = self.positions[self.j];
            self.j += 1;

            let distance = a.separation_distance(b);
            if distance < self.threshold_m {
                return Some(ConflictRecord::detected(a.aircraft, b.aircraft, distance));
            }
        }
        None
    }
}

/// Convenience wrapper: run a full scan with the given threshold.
pub fn detect_conflicts(table: &PositionTable, threshold_m: f64) -> ConflictScan<'_> {
    ConflictScan::new(table, threshold_m)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use skymesh_identity::AircraftId;

    fn table(entries: &[(u32, f64, f64, f64)]) -> PositionTable {
        let mut t = PositionTable::new();
        for &(id, lat, lon, alt) in entries {
            t.upsert(AircraftPosition::at(AircraftId(id), lat, lon, alt));
        }
        t
    }

    #[test]
    fn coincident_aircraft_conflict_at_near_zero_distance() {
        let t = table(&[(1, 45.0, 9.0, 2000.0), (2, 45.0, 9.0, 2000.0)]);
        let conflicts: Vec<_> = ConflictScan::new(&t, DETECTION_THRESHOLD_M).collect();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].pair, (AircraftId(1), AircraftId(2)));
        assert!(conflicts[0].distance_m < 1e-9);
    }

    #[test]
    fn separated_aircraft_do_not_conflict() {
        // ~111 km apart
        let t = table(&[(1, 45.0, 9.0, 2000.0), (2, 46.0, 9.0, 2000.0)]);
        assert_eq!(ConflictScan::new(&t, DETECTION_THRESHOLD_M).count(), 0);
    }

    #[test]
    fn each_pair_appears_once() {
        // Three coincident aircraft: exactly the three unordered pairs.
        let t = table(&[
            (1, 45.0, 9.0, 2000.0),
            (2, 45.0, 9.0, 2000.0),
            (3, 45.0, 9.0, 2000.0),
        ]);
        let mut pairs: Vec<_> = ConflictScan::new(&t, DETECTION_THRESHOLD_M)
            .map(|c| c.pair)
            .collect();
        pairs.sort();
        assert_eq!(
            pairs,
            vec![
                (AircraftId(1), AircraftId(2)),
                (AircraftId(1), AircraftId(3)),
                (AircraftId(2), AircraftId(3)),
            ]
        );
    }

    #[test]
    fn scan_is_restartable() {
        let t = table(&[(1, 45.0, 9.0, 2000.0), (2, 45.0, 9.0, 2500.0)]);
        let first: Vec<_> = ConflictScan::new(&t, DETECTION_THRESHOLD_M).collect();
        let second: Vec<_> = ConflictScan::new(&t, DETECTION_THRESHOLD_M).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn empty_and_singleton_tables_scan_clean() {
        let empty = PositionTable::new();
        assert_eq!(ConflictScan::new(&empty, DETECTION_THRESHOLD_M).count(), 0);

        let one = table(&[(1, 45.0, 9.0, 2000.0)]);
        assert_eq!(ConflictScan::new(&one, DETECTION_THRESHOLD_M).count(), 0);
    }

    proptest! {
        /// An aircraft is never reported in conflict with itself, and every
        /// reported pair is distinct and ordered.
        #[test]
        fn no_self_pairs(
            lats in proptest::collection::vec(44.9f64..45.1, 2..8),
        ) {
            let mut t = PositionTable::new();
            for (i, lat) in lats.iter().enumerate() {
                t.upsert(AircraftPosition::at(AircraftId(i as u32 + 1), *lat, 9.0, 2000.0));
            }
            for conflict in ConflictScan::new(&t, 1.0e9) {
                prop_assert!(conflict.pair.0 < conflict.pair.1);
            }
        }

        /// Distance symmetry: scanning a two-entry table yields the same
        /// distance regardless of which aircraft has the lower id.
        #[test]
        fn reported_distance_is_symmetric(
            lat in 44.9f64..45.1,
            lon in 8.9f64..9.1,
            alt in 1000.0f64..3000.0,
        ) {
            let t1 = table(&[(1, 45.0, 9.0, 2000.0), (2, lat, lon, alt)]);
            let t2 = table(&[(2, 45.0, 9.0, 2000.0), (1, lat, lon, alt)]);
            let d1: Vec<_> = ConflictScan::new(&t1, 1.0e9).map(|c| c.distance_m).collect();
            let d2: Vec<_> = ConflictScan::new(&t2, 1.0e9).map(|c| c.distance_m).collect();
            prop_assert_eq!(d1.len(), 1);
            prop_assert!((d1[0] - d2[0]).abs() < 1e-9);
        }
    }
}
