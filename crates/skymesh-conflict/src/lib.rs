//! Separation conflict detection and resolution.
//!
//! The detector scans the live position table for unordered aircraft pairs
//! whose composite 3D separation is below the detection threshold. The
//! resolver turns each conflict into a maneuver by trying strategies in
//! fixed priority order - vertical, then horizontal, then temporal - and
//! re-validates every resolution against the live safety margin at
//! acceptance time, so a proposal computed from stale positions can never
//! be applied.
//!
//! A conflict record moves through explicit states:
//!
//! ```text
//! Pending -> Accepted -> Archived
//! ```
//!
//! and is owned by the resolver throughout; raw transport input never
//! mutates a record.

mod detector;
mod record;
mod resolver;

pub use detector::{detect_conflicts, ConflictScan, DETECTION_THRESHOLD_M};
pub use record::{ConflictRecord, ResolutionKind, ResolutionPlan, ResolutionState};
pub use resolver::{ConflictResolver, SeparationConfig};

use skymesh_identity::AircraftId;

/// Result type for conflict operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Reportable conflict errors.
///
/// A failed re-validation at acceptance time is *not* an error (the record
/// stays pending and is retried next tick); only malformed input is
/// reported here.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Error {
    /// A conflicting aircraft is missing from the position table.
    #[error("aircraft {0} is not in the position table")]
    UnknownAircraft(AircraftId),

    /// No pending conflict with the given resolution id.
    #[error("no pending conflict with resolution id {0}")]
    UnknownResolution(u64),
}
