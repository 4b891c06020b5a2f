//! Conflict records and resolution plans.

use serde::{Deserialize, Serialize};
use skymesh_identity::AircraftId;

/// How a conflict is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResolutionKind {
    /// Symmetric altitude adjustment, headings preserved.
    Vertical,
    /// Symmetric divergent heading change.
    Horizontal,
    /// Delay one aircraft's arrival at the convergence point.
    Temporal,
}

/// Lifecycle of a conflict record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResolutionState {
    /// Detected; a plan may or may not have been proposed yet.
    #[default]
    Pending,
    /// Plan passed re-validation and was applied.
    Accepted,
    /// Recorded in the ledger and removed from the pending set.
    Archived,
}

/// A concrete maneuver produced by one resolution strategy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResolutionPlan {
    /// Strategy that produced this plan.
    pub kind: ResolutionKind,
    /// Proposed altitudes for (first, second) aircraft of the pair, meters.
    pub new_altitudes: (f64, f64),
    /// Proposed headings for (first, second) aircraft of the pair, degrees.
    pub new_headings: (f64, f64),
    /// Arrival delay imposed on the delayed aircraft, seconds
    /// (temporal strategy only, otherwise 0).
    pub delay_s: f64,
    /// Aircraft the delay applies to (temporal strategy only).
    pub delayed: Option<AircraftId>,
}

/// One detected separation violation between two aircraft.
///
/// The pair is unordered and stored with the smaller id first, so the same
/// violation observed from either side deduplicates to one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictRecord {
    /// Conflicting pair, smaller id first.
    pub pair: (AircraftId, AircraftId),
    /// Measured 3D separation at detection time, meters.
    pub distance_m: f64,
    /// Estimated time to conflict, seconds (>= 1).
    pub time_to_conflict_s: f64,
    /// Proposed maneuver, if a strategy has produced one.
    pub plan: Option<ResolutionPlan>,
    /// Lifecycle state.
    pub state: ResolutionState,
    /// Resolver-assigned id, unique within a node.
    pub resolution_id: u64,
}

impl ConflictRecord {
    /// Assumed closure speed for the time-to-conflict estimate, m/s.
    pub const CLOSURE_SPEED_MPS: f64 = 200.0;

    /// Build a pending record for a pair at the given separation.
    pub fn detected(a: AircraftId, b: AircraftId, distance_m: f64) -> Self {
        let pair = if a <= b { (a, b) } else { (b, a) };
        Self {
            pair,
            distance_m,
            time_to_conflict_s: (distance_m / Self::CLOSURE_SPEED_MPS).max(1.0),
            plan: None,
            state: ResolutionState::Pending,
            resolution_id: 0,
        }
    }

    /// Whether the given aircraft is one of the conflicting pair.
    pub fn involves(&self, id: AircraftId) -> bool {
        self.pair.0 == id || self.pair.1 == id
    }
}
