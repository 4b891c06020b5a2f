//! Exclusive airspace volume partitioning.
//!
//! The coverage disk around the swarm's operating area is split into eight
//! deterministic angular sectors sharing the altitude band [0, 10000] m.
//! Every node derives the same partition from the same coverage radius, so
//! volume ids agree across the swarm without negotiation.
//!
//! # Exclusivity invariants
//!
//! - a volume is controlled by at most one aircraft at a time;
//! - an aircraft holds at most one volume at a time (acquiring a new one
//!   releases the previous one first).
//!
//! Contention is a resource error returned to the caller
//! ([`Error::VolumeOccupied`]), never retried automatically.

use serde::{Deserialize, Serialize};
use skymesh_identity::AircraftId;
use std::collections::HashMap;
use tracing::debug;

/// Number of angular sectors in the partition.
pub const SECTOR_COUNT: u32 = 8;

/// Shared altitude band of every volume, meters.
pub const ALTITUDE_BAND_M: (f64, f64) = (0.0, 10_000.0);

/// Result type for airspace operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Resource contention errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Error {
    /// No volume with the given id exists.
    #[error("no volume with id {0}")]
    UnknownVolume(u32),

    /// The volume has been deactivated.
    #[error("volume {0} is inactive")]
    VolumeInactive(u32),

    /// The volume is already controlled by another aircraft.
    #[error("volume {volume} is controlled by {holder}")]
    VolumeOccupied { volume: u32, holder: AircraftId },
}

/// One exclusively-assignable region of airspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirspaceVolume {
    /// Volume id, stable across the swarm for a given coverage radius.
    pub volume_id: u32,
    /// Latitude range, degrees (bounding box of the sector).
    pub lat_range: (f64, f64),
    /// Longitude range, degrees (bounding box of the sector).
    pub lon_range: (f64, f64),
    /// Altitude range, meters.
    pub alt_range: (f64, f64),
    /// Controlling aircraft, if any.
    pub controller: Option<AircraftId>,
    /// Aircraft currently assigned (0 or 1 entries).
    pub aircraft_ids: Vec<AircraftId>,
    /// Whether the volume accepts assignments.
    pub is_active: bool,
}

impl AirspaceVolume {
    /// Whether the volume currently has no controller.
    pub fn is_free(&self) -> bool {
        self.controller.is_none() && self.aircraft_ids.is_empty()
    }
}

/// Deterministic partition of the coverage disk plus the ownership map.
#[derive(Debug)]
pub struct VolumeManager {
    volumes: Vec<AirspaceVolume>,
    assignments: HashMap<AircraftId, u32>,
}

impl VolumeManager {
    /// Partition a coverage disk of the given radius into
    /// [`SECTOR_COUNT`] sectors centered on the swarm origin.
    pub fn new(coverage_radius_km: f64) -> Self {
        // Degrees of latitude spanned by the coverage radius.
        let radius_deg = coverage_radius_km / 111.0;
        let ring_radius = 0.5 * radius_deg;
        // Half the chord between adjacent centers bounds the box size on
        // both axes, so no two sector boxes can intersect.
        let half_extent =
            0.5 * ring_radius * (std::f64::consts::PI / f64::from(SECTOR_COUNT)).sin();

        let volumes = (0..SECTOR_COUNT)
            .map(|i| {
                let angle = std::f64::consts::TAU * f64::from(i) / f64::from(SECTOR_COUNT);
                let center_lat = ring_radius * angle.cos();
                let center_lon = ring_radius * angle.sin();
                AirspaceVolume {
                    volume_id: i,
                    lat_range: (center_lat - half_extent, center_lat + half_extent),
                    lon_range: (center_lon - half_extent, center_lon + half_extent),
                    alt_range: ALTITUDE_BAND_M,
                    controller: None,
                    aircraft_ids: Vec::new(),
                    is_active: true,
                }
            })
            .collect();

        debug!(
            sectors = SECTOR_COUNT,
            coverage_radius_km, "airspace partition initialized"
        );

        Self {
            volumes,
            assignments: HashMap::new(),
        }
    }

    /// Assign exclusive control of a volume to an aircraft.
    ///
    /// Fails if the volume is inactive or controlled by someone else.
    /// Succeeds trivially if the requester already controls it. Any volume
    /// the requester held before is released first, so an aircraft never
    /// holds more than one.
    pub fn assign(&mut self, aircraft: AircraftId, volume_id: u32) -> Result<()> {
        let volume = self
            .volumes
            .iter()
            .find(|v| v.volume_id == volume_id)
            .ok_or(Error::UnknownVolume(volume_id))?;

        if !volume.is_active {
            return Err(Error::VolumeInactive(volume_id));
        }
        match volume.controller {
            Some(holder) if holder == aircraft => return Ok(()),
            Some(holder) => return Err(Error::VolumeOccupied { volume: volume_id, holder }),
            None => {}
        }

        if let Some(previous) = self.assignments.get(&aircraft).copied() {
            self.clear_volume(aircraft, previous);
        }

        let volume = self
            .volumes
            .iter_mut()
            .find(|v| v.volume_id == volume_id)
            .expect("volume existence checked above");
        volume.controller = Some(aircraft);
        volume.aircraft_ids = vec![aircraft];
        self.assignments.insert(aircraft, volume_id);
        debug!(%aircraft, volume = volume_id, "volume assigned");
        Ok(())
    }

    /// Release a volume held by an aircraft. A no-op (not an error) if the
    /// aircraft holds no such volume.
    pub fn release(&mut self, aircraft: AircraftId, volume_id: u32) {
        if self.assignments.get(&aircraft) == Some(&volume_id) {
            self.assignments.remove(&aircraft);
            self.clear_volume(aircraft, volume_id);
            debug!(%aircraft, volume = volume_id, "volume released");
        }
    }

    /// Deactivate a volume. Its current assignment, if any, is cleared.
    pub fn deactivate(&mut self, volume_id: u32) {
        if let Some(v) = self.volumes.iter_mut().find(|v| v.volume_id == volume_id) {
            v.is_active = false;
            if let Some(holder) = v.controller.take() {
                v.aircraft_ids.clear();
                self.assignments.remove(&holder);
            }
        }
    }

    /// The volume an aircraft currently controls.
    pub fn volume_of(&self, aircraft: AircraftId) -> Option<u32> {
        self.assignments.get(&aircraft).copied()
    }

    /// First active, unoccupied volume.
    pub fn first_available(&self) -> Option<u32> {
        self.volumes
            .iter()
            .find(|v| v.is_active && v.is_free())
            .map(|v| v.volume_id)
    }

    /// All volumes in the partition.
    pub fn volumes(&self) -> &[AirspaceVolume] {
        &self.volumes
    }

    fn clear_volume(&mut self, aircraft: AircraftId, volume_id: u32) {
        if let Some(v) = self.volumes.iter_mut().find(|v| v.volume_id == volume_id) {
            if v.controller == Some(aircraft) {
                v.controller = None;
            }
            v.aircraft_ids.retain(|id| *id != aircraft);
        }
    }
}
