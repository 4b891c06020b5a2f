//! Resolution strategies and the pending-conflict set.

use tracing::{debug, trace};

use skymesh_geo::{AircraftPosition, PositionTable};
use skymesh_identity::AircraftId;

use crate::record::{ConflictRecord, ResolutionKind, ResolutionPlan, ResolutionState};
use crate::{Error, Result};

/// Separation minima and safety margin.
#[derive(Debug, Clone, Copy)]
pub struct SeparationConfig {
    /// Minimum vertical separation, meters.
    pub vertical_minima_m: f64,
    /// Minimum horizontal separation, meters.
    pub horizontal_minima_m: f64,
    /// Minimum temporal separation, seconds.
    pub temporal_minima_s: f64,
    /// Margin multiplier applied to the minima.
    pub safety_factor: f64,
    /// Altitude band available for vertical maneuvers, meters.
    pub altitude_band_m: (f64, f64),
    /// Maximum divergent turn per aircraft, degrees.
    pub max_turn_deg: f64,
}

impl Default for SeparationConfig {
    fn default() -> Self {
        Self {
            vertical_minima_m: 300.0,
            horizontal_minima_m: 1_000.0,
            temporal_minima_s: 60.0,
            safety_factor: 1.5,
            altitude_band_m: (0.0, 10_000.0),
            max_turn_deg: 45.0,
        }
    }
}

impl SeparationConfig {
    /// The smaller of the vertical and horizontal minima.
    pub fn min_separation_m(&self) -> f64 {
        self.vertical_minima_m.min(self.horizontal_minima_m)
    }

    /// Floor a resolution's live distance must clear at acceptance time.
    pub fn acceptance_floor_m(&self) -> f64 {
        self.min_separation_m() / self.safety_factor
    }
}

/// Owns pending conflict records and drives them to resolution.
///
/// Records enter via [`note_conflict`](Self::note_conflict), receive a plan
/// via [`propose_resolution`](Self::propose_resolution), pass the live
/// safety re-validation in [`accept`](Self::accept) and leave through
/// [`archive`](Self::archive) once the acceptance transaction is in the
/// ledger.
#[derive(Debug)]
pub struct ConflictResolver {
    config: SeparationConfig,
    pending: Vec<ConflictRecord>,
    next_id: u64,
    archived: u64,
}

impl ConflictResolver {
    /// Resolver with the given separation configuration.
    pub fn new(config: SeparationConfig) -> Self {
        Self {
            config,
            pending: Vec::new(),
            next_id: 1,
            archived: 0,
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &SeparationConfig {
        &self.config
    }

    /// Track a detected conflict. Deduplicates on the unordered pair:
    /// re-detection of a pair already pending refreshes its measured
    /// distance but keeps the existing record and id. Returns the
    /// record's resolution id.
    pub fn note_conflict(&mut self, mut record: ConflictRecord) -> u64 {
        if let Some(existing) = self.pending.iter_mut().find(|c| c.pair == record.pair) {
            if existing.state == ResolutionState::Pending {
                existing.distance_m = record.distance_m;
                existing.time_to_conflict_s = record.time_to_conflict_s;
            }
            return existing.resolution_id;
        }
        // Every tracked record starts its lifecycle here, whatever the
        // caller put in those fields.
        record.state = ResolutionState::Pending;
        record.plan = None;
        record.resolution_id = self.next_id;
        self.next_id += 1;
        debug!(
            id = record.resolution_id,
            a = %record.pair.0,
            b = %record.pair.1,
            distance_m = record.distance_m,
            "conflict tracked"
        );
        self.pending.push(record);
        self.next_id - 1
    }

    /// Try the strategy ladder for a pending conflict: vertical first, then
    /// horizontal, then temporal. The first strategy that produces a plan
    /// wins. Returns `Ok(true)` if a plan was attached, `Ok(false)` if no
    /// strategy applied (the conflict stays pending and is retried next
    /// tick with fresh inputs).
    pub fn propose_resolution(&mut self, id: u64, table: &PositionTable) -> Result<bool> {
        let idx = self.index_of(id)?;
        let (a_id, b_id) = self.pending[idx].pair;
        let a = *table.get(a_id).ok_or(Error::UnknownAircraft(a_id))?;
        let b = *table.get(b_id).ok_or(Error::UnknownAircraft(b_id))?;

        let plan = self
            .propose_vertical(&a, &b)
            .or_else(|| self.propose_horizontal(&a, &b))
            .or_else(|| self.propose_temporal(&a, &b, self.pending[idx].time_to_conflict_s));

        match plan {
            Some(plan) => {
                trace!(id, kind = ?plan.kind, "resolution proposed");
                self.pending[idx].plan = Some(plan);
                Ok(true)
            }
            None => {
                trace!(id, "no strategy applied; conflict stays pending");
                Ok(false)
            }
        }
    }

    /// Re-validate a proposed resolution against the live safety margin and
    /// accept it.
    ///
    /// The distance is re-measured from the current position table; the
    /// resolution is accepted only if it still clears
    /// `min_separation / safety_factor`. A failed re-validation is not an
    /// error: the record stays pending for the next tick. Returns the
    /// accepted record for application.
    pub fn accept(&mut self, id: u64, table: &PositionTable) -> Result<Option<&ConflictRecord>> {
        let idx = self.index_of(id)?;
        let record = &self.pending[idx];
        if record.state != ResolutionState::Pending || record.plan.is_none() {
            return Ok(None);
        }

        let (a_id, b_id) = record.pair;
        let a = table.get(a_id).ok_or(Error::UnknownAircraft(a_id))?;
        let b = table.get(b_id).ok_or(Error::UnknownAircraft(b_id))?;
        let live_distance = a.separation_distance(b);

        let record = &mut self.pending[idx];
        record.distance_m = live_distance;
        if live_distance <= self.config.acceptance_floor_m() {
            trace!(
                id,
                live_distance,
                floor = self.config.acceptance_floor_m(),
                "re-validation failed; retrying next tick"
            );
            return Ok(None);
        }

        record.state = ResolutionState::Accepted;
        debug!(id, live_distance, "resolution accepted");
        Ok(Some(&self.pending[idx]))
    }

    /// Remove an accepted record from the pending set once its acceptance
    /// transaction is recorded, returning it in the archived state.
    pub fn archive(&mut self, id: u64) -> Result<ConflictRecord> {
        let idx = self.index_of(id)?;
        if self.pending[idx].state != ResolutionState::Accepted {
            return Err(Error::UnknownResolution(id));
        }
        let mut record = self.pending.remove(idx);
        record.state = ResolutionState::Archived;
        self.archived += 1;
        Ok(record)
    }

    /// Drop pending records that reference aircraft no longer in the
    /// table (expired peers). Returns how many were dropped.
    pub fn sweep_expired(&mut self, table: &PositionTable) -> usize {
        let before = self.pending.len();
        self.pending
            .retain(|c| table.get(c.pair.0).is_some() && table.get(c.pair.1).is_some());
        before - self.pending.len()
    }

    /// All pending conflict records.
    pub fn pending(&self) -> &[ConflictRecord] {
        &self.pending
    }

    /// Number of pending conflicts.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Resolutions archived since startup.
    pub fn archived_count(&self) -> u64 {
        self.archived
    }

    fn index_of(&self, id: u64) -> Result<usize> {
        self.pending
            .iter()
            .position(|c| c.resolution_id == id)
            .ok_or(Error::UnknownResolution(id))
    }

    /// Vertical separation: symmetric altitude adjustment, headings
    /// preserved. Applies when the pair's altitude gap is below the
    /// required vertical separation and both adjusted altitudes stay
    /// inside the altitude band.
    fn propose_vertical(
        &self,
        a: &AircraftPosition,
        b: &AircraftPosition,
    ) -> Option<ResolutionPlan> {
        let required = self.config.vertical_minima_m * self.config.safety_factor;
        let alt_diff = a.altitude - b.altitude;
        if alt_diff.abs() >= required {
            return None;
        }

        // Each aircraft takes half the deficit; the higher one climbs.
        // An exact tie breaks toward the first (lower-id) aircraft.
        let half = 0.5 * (required - alt_diff.abs());
        let (new_a, new_b) = if alt_diff >= 0.0 {
            (a.altitude + half, b.altitude - half)
        } else {
            (a.altitude - half, b.altitude + half)
        };

        let (floor, ceiling) = self.config.altitude_band_m;
        if new_a < floor || new_a > ceiling || new_b < floor || new_b > ceiling {
            return None;
        }

        Some(ResolutionPlan {
            kind: ResolutionKind::Vertical,
            new_altitudes: (new_a, new_b),
            new_headings: (a.heading, b.heading),
            delay_s: 0.0,
            delayed: None,
        })
    }

    /// Horizontal separation: symmetric divergent turn, altitudes
    /// preserved. Applies when the lateral gap is below the required
    /// horizontal separation and both aircraft are moving.
    fn propose_horizontal(
        &self,
        a: &AircraftPosition,
        b: &AircraftPosition,
    ) -> Option<ResolutionPlan> {
        let required = self.config.horizontal_minima_m * self.config.safety_factor;
        let lateral = a.lateral_distance(b);
        if lateral >= required {
            return None;
        }
        if a.airspeed <= 0.0 || b.airspeed <= 0.0 {
            return None;
        }

        let turn = self.config.max_turn_deg * (required - lateral) / required;
        Some(ResolutionPlan {
            kind: ResolutionKind::Horizontal,
            new_altitudes: (a.altitude, b.altitude),
            new_headings: (
                normalize_heading(a.heading - turn),
                normalize_heading(b.heading + turn),
            ),
            delay_s: 0.0,
            delayed: None,
        })
    }

    /// Temporal separation: delay the lower-priority aircraft's arrival at
    /// the convergence point by the temporal deficit. Applies only when a
    /// deficit exists.
    fn propose_temporal(
        &self,
        a: &AircraftPosition,
        b: &AircraftPosition,
        time_to_conflict_s: f64,
    ) -> Option<ResolutionPlan> {
        let required = self.config.temporal_minima_s * self.config.safety_factor;
        let deficit = required - time_to_conflict_s;
        if deficit <= 0.0 {
            return None;
        }

        // The lower-priority aircraft waits; a priority tie delays the
        // second (higher-id) aircraft.
        let delayed = if a.priority < b.priority {
            a.aircraft
        } else if b.priority < a.priority {
            b.aircraft
        } else {
            b.aircraft.max(a.aircraft)
        };

        Some(ResolutionPlan {
            kind: ResolutionKind::Temporal,
            new_altitudes: (a.altitude, b.altitude),
            new_headings: (a.heading, b.heading),
            delay_s: deficit,
            delayed: Some(delayed),
        })
    }
}

fn normalize_heading(deg: f64) -> f64 {
    deg.rem_euclid(360.0)
}
