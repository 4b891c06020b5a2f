//! Node configuration.

use std::time::Duration;

use skymesh_conflict::{SeparationConfig, DETECTION_THRESHOLD_M};
use skymesh_geo::STALENESS_WINDOW_MS;

/// Tunables for a swarm node.
///
/// The defaults match the fleet deployment profile; tests narrow them with
/// the `with_*` builders.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Radio range, kilometers.
    pub communication_range_km: f64,
    /// Tick frequency, Hz. The tick interval and the efficiency target
    /// derive from this.
    pub update_frequency_hz: u32,
    /// Radius of the managed airspace, kilometers.
    pub coverage_radius_km: f64,
    /// A tick running longer than this counts as a deadline miss and
    /// degrades node health.
    pub tick_deadline: Duration,
    /// Positions older than this are expired from the table.
    pub staleness_window_ms: u64,
    /// Pairwise separation below this triggers conflict handling, meters.
    pub detection_threshold_m: f64,
    /// Separation minima for the resolver.
    pub separation: SeparationConfig,
    /// Quorum-less consensus rounds tolerated before the candidate pool
    /// is discarded and the vote restarts.
    pub consensus_round_limit: u32,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            communication_range_km: 100.0,
            update_frequency_hz: 10,
            coverage_radius_km: 50.0,
            tick_deadline: Duration::from_millis(100),
            staleness_window_ms: STALENESS_WINDOW_MS,
            detection_threshold_m: DETECTION_THRESHOLD_M,
            separation: SeparationConfig::default(),
            consensus_round_limit: 8,
        }
    }
}

impl NodeConfig {
    pub fn with_communication_range_km(mut self, km: f64) -> Self {
        self.communication_range_km = km;
        self
    }

    pub fn with_update_frequency_hz(mut self, hz: u32) -> Self {
        self.update_frequency_hz = hz.max(1);
        self
    }

    pub fn with_coverage_radius_km(mut self, km: f64) -> Self {
        self.coverage_radius_km = km;
        self
    }

    pub fn with_tick_deadline(mut self, deadline: Duration) -> Self {
        self.tick_deadline = deadline;
        self
    }

    pub fn with_staleness_window_ms(mut self, window_ms: u64) -> Self {
        self.staleness_window_ms = window_ms;
        self
    }

    pub fn with_detection_threshold_m(mut self, meters: f64) -> Self {
        self.detection_threshold_m = meters;
        self
    }

    pub fn with_separation(mut self, separation: SeparationConfig) -> Self {
        self.separation = separation;
        self
    }

    pub fn with_consensus_round_limit(mut self, rounds: u32) -> Self {
        self.consensus_round_limit = rounds.max(1);
        self
    }

    /// Wall-clock interval between ticks.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(1_000 / u64::from(self.update_frequency_hz.max(1)))
    }

    /// Messages per second the node is expected to sustain at full health.
    pub fn throughput_target(&self) -> f64 {
        f64::from(self.update_frequency_hz) * 10.0
    }
}
