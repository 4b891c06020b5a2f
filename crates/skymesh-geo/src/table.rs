//! Live position table: last verified observation per aircraft.

use std::collections::HashMap;

use skymesh_identity::AircraftId;

use crate::position::AircraftPosition;

/// Time after which a peer's last known position is discarded.
pub const STALENESS_WINDOW_MS: u64 = 30_000;

/// Last-write-wins table of aircraft positions.
///
/// One entry per aircraft id; a newer observation supersedes the stored one
/// outright (observations are never merged). Entries expire after the
/// staleness window.
#[derive(Debug, Default)]
pub struct PositionTable {
    positions: HashMap<AircraftId, AircraftPosition>,
}

impl PositionTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or supersede the entry for `pos.aircraft`.
    ///
    /// Returns `false` if the stored observation is newer than the incoming
    /// one (the incoming observation is discarded).
    pub fn upsert(&mut self, pos: AircraftPosition) -> bool {
        match self.positions.get_mut(&pos.aircraft) {
            Some(existing) if existing.timestamp_ms > pos.timestamp_ms => false,
            Some(existing) => {
                *existing = pos;
                true
            }
            None => {
                self.positions.insert(pos.aircraft, pos);
                true
            }
        }
    }

    /// Look up an aircraft's last observation.
    pub fn get(&self, id: AircraftId) -> Option<&AircraftPosition> {
        self.positions.get(&id)
    }

    /// Remove an aircraft's entry.
    pub fn remove(&mut self, id: AircraftId) -> Option<AircraftPosition> {
        self.positions.remove(&id)
    }

    /// Number of tracked aircraft.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Iterate over all tracked positions.
    pub fn iter(&self) -> impl Iterator<Item = &AircraftPosition> {
        self.positions.values()
    }

    /// Positions sorted by aircraft id, for deterministic pairwise scans.
    pub fn sorted(&self) -> Vec<&AircraftPosition> {
        let mut v: Vec<_> = self.positions.values().collect();
        v.sort_by_key(|p| p.aircraft);
        v
    }

    /// Aircraft within `radius_m` of `origin`, excluding the origin aircraft
    /// itself.
    pub fn nearby(&self, origin: &AircraftPosition, radius_m: f64) -> Vec<&AircraftPosition> {
        self.positions
            .values()
            .filter(|p| p.aircraft != origin.aircraft)
            .filter(|p| origin.separation_distance(p) <= radius_m)
            .collect()
    }

    /// Drop every entry older than `window_ms` at time `now_ms`, returning
    /// the expired ids.
    pub fn expire_stale(&mut self, now_ms: u64, window_ms: u64) -> Vec<AircraftId> {
        let expired: Vec<AircraftId> = self
            .positions
            .values()
            .filter(|p| p.is_stale(now_ms, window_ms))
            .map(|p| p.aircraft)
            .collect();
        for id in &expired {
            self.positions.remove(id);
        }
        expired
    }
}
