//! The swarm node state machine and its tick loop.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use skymesh_airspace::VolumeManager;
use skymesh_conflict::{detect_conflicts, ConflictRecord, ConflictResolver, ResolutionState};
use skymesh_geo::{AircraftPosition, PositionTable, Priority};
use skymesh_identity::{AircraftId, Identity};
use skymesh_ledger::{Block, Ledger};
use skymesh_protocol::{decode_payload, encode_payload, MessageKind, ReplayGuard, SwarmMessage};

use crate::config::NodeConfig;
use crate::transport::Transport;
use crate::{Error, Result};

/// Payload of a [`MessageKind::VolumeAssignment`] envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeClaim {
    /// Volume being claimed or yielded.
    pub volume_id: u32,
    /// `true` for a claim, `false` for a release.
    pub claimed: bool,
}

/// Counters accumulated over the node's lifetime.
#[derive(Debug, Clone, Copy, Default)]
pub struct NodeStats {
    /// Ticks completed.
    pub ticks: u64,
    /// Envelopes applied to node state.
    pub messages_processed: u64,
    /// Envelopes dropped for a bad authentication tag.
    pub auth_failures: u64,
    /// Envelopes dropped by the replay guard.
    pub replays_rejected: u64,
    /// Envelopes dropped as undecodable.
    pub malformed: u64,
    /// Heartbeats seen.
    pub heartbeats: u64,
    /// Conflicts first observed by this node's own scan.
    pub conflicts_detected: u64,
    /// Resolutions accepted and archived.
    pub resolutions_archived: u64,
    /// Ticks that ran past the deadline.
    pub deadline_misses: u64,
}

/// What one tick did.
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    /// Envelopes applied this tick.
    pub processed: usize,
    /// Envelopes dropped (bad tag, replay, malformed).
    pub dropped: usize,
    /// Positions expired from the table.
    pub expired: usize,
    /// Conflicts newly observed by the local scan.
    pub new_conflicts: usize,
    /// Resolutions accepted and archived this tick.
    pub resolved: usize,
    /// Block sealed this tick, for distribution to peers.
    pub sealed: Option<Block>,
    /// Whether a consensus round committed a block.
    pub committed: bool,
    /// Wall time the tick took.
    pub elapsed: Duration,
}

/// One aircraft's coordination node.
///
/// Generic over the transport medium and the identity backend; both seams
/// exist so simulations and hardware builds share every line of
/// coordination logic.
pub struct SwarmNode<T: Transport, I: Identity> {
    config: NodeConfig,
    identity: I,
    transport: T,
    ledger: Ledger,
    volumes: VolumeManager,
    positions: PositionTable,
    resolver: ConflictResolver,
    replay: ReplayGuard,
    nonce: u64,
    stats: NodeStats,
    /// Latched by the last tick: deadline held and link up.
    healthy: bool,
    efficiency: f64,
}

impl<T: Transport, I: Identity> SwarmNode<T, I> {
    /// Build a node and create its genesis block.
    pub fn new(config: NodeConfig, identity: I, transport: T) -> Self {
        let local = identity.local_id();
        let mut ledger = Ledger::new(local);
        ledger.create_genesis();
        info!(node = %local, "swarm node initialized");
        Self {
            volumes: VolumeManager::new(config.coverage_radius_km),
            resolver: ConflictResolver::new(config.separation),
            config,
            identity,
            transport,
            ledger,
            positions: PositionTable::new(),
            replay: ReplayGuard::new(),
            nonce: 0,
            stats: NodeStats::default(),
            healthy: true,
            efficiency: 0.0,
        }
    }

    /// This node's aircraft id.
    pub fn id(&self) -> AircraftId {
        self.identity.local_id()
    }

    /// One coordination cycle.
    ///
    /// Inbound envelopes are applied first, the state-vector beacon goes
    /// out, stale positions expire, the conflict scan runs, pending
    /// resolutions advance, proof difficulty tracks the swarm size, and a
    /// full open block is sealed and put to the vote. `now_ms` is the caller's clock so simulations
    /// stay deterministic.
    pub fn tick(&mut self, now_ms: u64) -> TickReport {
        let started = Instant::now();
        let mut report = TickReport::default();

        self.process_inbound(&mut report);
        // The per-tick beacon; doubles as the liveness signal peers feed
        // their staleness expiry with, and refreshing the local timestamp
        // here keeps the node's own vector out of its expiry below. No-op
        // until the local vector is set.
        self.broadcast_position(now_ms);
        self.expire_stale(now_ms, &mut report);
        self.scan_conflicts(now_ms, &mut report);
        self.advance_resolutions(now_ms, &mut report);

        let peers = self.transport.peer_count() as u32;
        self.ledger.set_difficulty_for_peers(peers);
        report.sealed = self.ledger.seal_block_if_full(now_ms);
        if let Some(block) = &report.sealed {
            // Quorum needs peer candidates: every sealed block goes to the
            // whole swarm for the vote.
            let msg = self.sign(MessageKind::BlockProposal, encode_payload(block), now_ms);
            self.transport.send(msg);
        }
        if self.ledger.candidate_count() > 0 {
            report.committed = self.ledger.has_consensus(peers);
            if !report.committed
                && self.ledger.consensus_round() >= self.config.consensus_round_limit
            {
                warn!(
                    round = self.ledger.consensus_round(),
                    candidates = self.ledger.candidate_count(),
                    "consensus round timed out, discarding candidates"
                );
                self.ledger.discard_round();
            }
        }

        report.elapsed = started.elapsed();
        let on_time = report.elapsed <= self.config.tick_deadline;
        if !on_time {
            self.stats.deadline_misses += 1;
            warn!(elapsed_ms = report.elapsed.as_millis() as u64, "tick deadline missed");
        }
        self.healthy = on_time && self.transport.is_connected();
        self.efficiency = self.compute_efficiency();
        self.stats.ticks += 1;
        report
    }

    fn process_inbound(&mut self, report: &mut TickReport) {
        let local = self.id();
        for msg in self.transport.receive() {
            if !msg.is_broadcast() && msg.target != local {
                continue;
            }
            if !msg.verify(&self.identity) {
                self.stats.auth_failures += 1;
                report.dropped += 1;
                warn!(sender = %msg.sender, kind = ?msg.kind, "authentication failed, envelope dropped");
                continue;
            }
            if !self.replay.check(&msg) {
                self.stats.replays_rejected += 1;
                report.dropped += 1;
                warn!(sender = %msg.sender, nonce = msg.nonce, "replayed envelope dropped");
                continue;
            }
            match self.apply(&msg) {
                Ok(()) => {
                    self.stats.messages_processed += 1;
                    report.processed += 1;
                }
                Err(reason) => {
                    self.stats.malformed += 1;
                    report.dropped += 1;
                    warn!(sender = %msg.sender, kind = ?msg.kind, %reason, "envelope dropped");
                }
            }
        }
    }

    /// Apply one verified, replay-checked envelope.
    fn apply(&mut self, msg: &SwarmMessage) -> Result<()> {
        trace!(sender = %msg.sender, kind = ?msg.kind, "applying envelope");
        match msg.kind {
            MessageKind::PositionUpdate => {
                let pos: AircraftPosition = decode_payload(&msg.payload)?;
                if pos.aircraft == msg.sender {
                    self.positions.upsert(pos);
                }
            }
            MessageKind::Heartbeat => {
                self.stats.heartbeats += 1;
            }
            MessageKind::ConflictDetected => {
                // Only the observation is taken from the wire; lifecycle
                // fields (state, plan, resolution id) are owned by the
                // local resolver and never by raw transport input.
                let wire: ConflictRecord = decode_payload(&msg.payload)?;
                self.resolver.note_conflict(ConflictRecord::detected(
                    wire.pair.0,
                    wire.pair.1,
                    wire.distance_m,
                ));
                self.ledger.append_transaction(msg.clone())?;
            }
            MessageKind::EmergencyBroadcast => {
                if let Some(pos) = self.positions.get(msg.sender).copied() {
                    let mut pos = pos;
                    pos.priority = Priority::Emergency;
                    pos.timestamp_ms = pos.timestamp_ms.max(msg.timestamp_ms);
                    self.positions.upsert(pos);
                }
                self.ledger.append_transaction(msg.clone())?;
            }
            MessageKind::VolumeAssignment => {
                let claim: VolumeClaim = decode_payload(&msg.payload)?;
                if claim.claimed {
                    if let Err(reason) = self.volumes.assign(msg.sender, claim.volume_id) {
                        debug!(sender = %msg.sender, volume = claim.volume_id, %reason, "claim not applied");
                    }
                } else {
                    self.volumes.release(msg.sender, claim.volume_id);
                }
                self.ledger.append_transaction(msg.clone())?;
            }
            MessageKind::BlockProposal => {
                // A vote, not a transaction: the candidate goes to the
                // pool, never to the open block.
                let block: Block = decode_payload(&msg.payload)?;
                self.ledger.submit_candidate(block);
            }
            MessageKind::IntentDeclaration
            | MessageKind::ResolutionProposed
            | MessageKind::ResolutionAccepted => {
                self.ledger.append_transaction(msg.clone())?;
            }
        }
        Ok(())
    }

    fn expire_stale(&mut self, now_ms: u64, report: &mut TickReport) {
        let expired = self
            .positions
            .expire_stale(now_ms, self.config.staleness_window_ms);
        // Nonce high-water marks are kept for expired peers: dropping one
        // would let old signed envelopes replay when the peer goes quiet.
        for id in &expired {
            if let Some(volume) = self.volumes.volume_of(*id) {
                self.volumes.release(*id, volume);
            }
        }
        report.expired = expired.len();
        let swept = self.resolver.sweep_expired(&self.positions);
        if swept > 0 {
            debug!(swept, "dropped conflicts referencing expired aircraft");
        }
    }

    fn scan_conflicts(&mut self, now_ms: u64, report: &mut TickReport) {
        let conflicts: Vec<ConflictRecord> =
            detect_conflicts(&self.positions, self.config.detection_threshold_m).collect();
        for conflict in conflicts {
            let before = self.resolver.pending_count();
            let payload = encode_payload(&conflict);
            self.resolver.note_conflict(conflict);
            if self.resolver.pending_count() > before {
                self.stats.conflicts_detected += 1;
                report.new_conflicts += 1;
                let msg = self.sign(MessageKind::ConflictDetected, payload, now_ms);
                // Locally observed conflicts are recorded and announced.
                if let Err(reason) = self.ledger.append_transaction(msg.clone()) {
                    warn!(%reason, "conflict transaction not recorded");
                }
                self.transport.send(msg);
            }
        }
    }

    fn advance_resolutions(&mut self, now_ms: u64, report: &mut TickReport) {
        let pending: Vec<u64> = self
            .resolver
            .pending()
            .iter()
            .filter(|c| c.state == ResolutionState::Pending)
            .map(|c| c.resolution_id)
            .collect();

        for id in pending {
            if self.resolver.pending().iter().any(|c| {
                c.resolution_id == id && c.plan.is_none()
            }) {
                match self.resolver.propose_resolution(id, &self.positions) {
                    Ok(true) => {}
                    Ok(false) => continue,
                    Err(reason) => {
                        debug!(resolution = id, %reason, "proposal skipped");
                        continue;
                    }
                }
            }

            let accepted = match self.resolver.accept(id, &self.positions) {
                Ok(Some(record)) => record.clone(),
                Ok(None) => continue,
                Err(reason) => {
                    debug!(resolution = id, %reason, "acceptance skipped");
                    continue;
                }
            };

            self.apply_plan(&accepted, now_ms);

            let payload = encode_payload(&accepted);
            let msg = self.sign(MessageKind::ResolutionAccepted, payload, now_ms);
            if let Err(reason) = self.ledger.append_transaction(msg.clone()) {
                warn!(%reason, "resolution transaction not recorded");
            }
            self.transport.send(msg);

            match self.resolver.archive(id) {
                Ok(record) => {
                    self.stats.resolutions_archived += 1;
                    report.resolved += 1;
                    debug!(
                        resolution = record.resolution_id,
                        kind = ?record.plan.map(|p| p.kind),
                        "resolution archived"
                    );
                }
                Err(reason) => warn!(resolution = id, %reason, "archive failed"),
            }
        }
    }

    /// Apply an accepted plan to the local aircraft only. Peers apply their
    /// own side when they accept; this node never rewrites another
    /// aircraft's state vector.
    fn apply_plan(&mut self, record: &ConflictRecord, now_ms: u64) {
        let local = self.id();
        if !record.involves(local) {
            return;
        }
        let Some(plan) = record.plan else { return };
        let Some(mut pos) = self.positions.get(local).copied() else {
            return;
        };
        if record.pair.0 == local {
            pos.altitude = plan.new_altitudes.0;
            pos.heading = plan.new_headings.0;
        } else {
            pos.altitude = plan.new_altitudes.1;
            pos.heading = plan.new_headings.1;
        }
        pos.timestamp_ms = now_ms;
        self.positions.upsert(pos);
        info!(
            node = %local,
            altitude = pos.altitude,
            heading = pos.heading,
            "maneuver applied"
        );
        self.broadcast_position(now_ms);
    }

    /// Record the local aircraft's state vector.
    pub fn update_position(&mut self, mut pos: AircraftPosition) {
        pos.aircraft = self.id();
        self.positions.upsert(pos);
    }

    /// Broadcast the local state vector to the swarm, refreshing its
    /// observation time. This is the liveness signal peers feed their
    /// staleness expiry with.
    pub fn broadcast_position(&mut self, now_ms: u64) -> bool {
        let Some(mut pos) = self.positions.get(self.id()).copied() else {
            return false;
        };
        pos.timestamp_ms = now_ms;
        self.positions.upsert(pos);
        let payload = encode_payload(&pos);
        let msg = self.sign(MessageKind::PositionUpdate, payload, now_ms);
        self.transport.send(msg)
    }

    /// Broadcast a liveness beacon.
    pub fn send_heartbeat(&mut self, now_ms: u64) -> bool {
        let msg = self.sign(MessageKind::Heartbeat, Vec::new(), now_ms);
        self.transport.send(msg)
    }

    /// Declare an emergency: the local aircraft's priority becomes
    /// [`Priority::Emergency`] and the swarm is told why.
    pub fn send_emergency_alert(&mut self, reason: &str, now_ms: u64) -> Result<()> {
        let local = self.id();
        let mut pos = self
            .positions
            .get(local)
            .copied()
            .ok_or(Error::NoLocalPosition(local))?;
        pos.priority = Priority::Emergency;
        pos.timestamp_ms = now_ms;
        self.positions.upsert(pos);

        let msg = self.sign(
            MessageKind::EmergencyBroadcast,
            reason.as_bytes().to_vec(),
            now_ms,
        );
        self.ledger.append_transaction(msg.clone())?;
        self.transport.send(msg);
        info!(node = %local, reason, "emergency declared");
        Ok(())
    }

    /// Claim the first free airspace volume, announce the claim and record
    /// it in the ledger. Returns the claimed volume id.
    pub fn request_volume(&mut self, now_ms: u64) -> Result<u32> {
        let local = self.id();
        let volume_id = self.volumes.first_available().ok_or(Error::NoFreeVolume)?;
        self.volumes.assign(local, volume_id)?;

        let payload = encode_payload(&VolumeClaim {
            volume_id,
            claimed: true,
        });
        let msg = self.sign(MessageKind::VolumeAssignment, payload, now_ms);
        self.ledger.append_transaction(msg.clone())?;
        self.transport.send(msg);
        debug!(node = %local, volume = volume_id, "volume claimed");
        Ok(volume_id)
    }

    /// Yield the currently held volume, if any.
    pub fn release_volume(&mut self, now_ms: u64) -> Result<()> {
        let local = self.id();
        let Some(volume_id) = self.volumes.volume_of(local) else {
            return Ok(());
        };
        self.volumes.release(local, volume_id);

        let payload = encode_payload(&VolumeClaim {
            volume_id,
            claimed: false,
        });
        let msg = self.sign(MessageKind::VolumeAssignment, payload, now_ms);
        self.ledger.append_transaction(msg.clone())?;
        self.transport.send(msg);
        debug!(node = %local, volume = volume_id, "volume released");
        Ok(())
    }

    /// Broadcast a route intent and record it.
    pub fn declare_intent(&mut self, route: &[u8], now_ms: u64) -> Result<()> {
        let msg = self.sign(MessageKind::IntentDeclaration, route.to_vec(), now_ms);
        self.ledger.append_transaction(msg.clone())?;
        self.transport.send(msg);
        Ok(())
    }

    /// Vote a peer's sealed block into the local candidate pool.
    pub fn submit_candidate(&mut self, block: Block) -> bool {
        self.ledger.submit_candidate(block)
    }

    /// Current health warnings, worst first.
    pub fn warnings(&self) -> Vec<&'static str> {
        let mut warnings = Vec::new();
        if !self.healthy {
            warnings.push("System health degraded");
        }
        if !self.transport.is_connected() {
            warnings.push("Network disconnected");
        }
        if self.positions.len() < 2 {
            warnings.push("Low swarm size");
        }
        if self.resolver.pending_count() > 5 {
            warnings.push("High conflict rate");
        }
        if self.efficiency < 0.5 {
            warnings.push("Low swarm efficiency");
        }
        warnings
    }

    /// Whether the last tick held its deadline with the link up.
    pub fn is_healthy(&self) -> bool {
        self.healthy
    }

    /// Swarm efficiency in `[0, 1]`: achieved throughput over the
    /// configured target, where achieved throughput scales with network
    /// health (reachable peers over a nominal swarm of 10).
    pub fn efficiency(&self) -> f64 {
        self.efficiency
    }

    fn compute_efficiency(&self) -> f64 {
        let network_health = (self.transport.peer_count() as f64 / 10.0).min(1.0);
        let throughput = network_health * 100.0;
        (throughput / self.config.throughput_target()).min(1.0)
    }

    /// Peers within communication range of the local aircraft. Empty when
    /// the local position is unknown.
    pub fn nearby_aircraft(&self) -> Vec<&AircraftPosition> {
        match self.positions.get(self.id()) {
            Some(origin) => self
                .positions
                .nearby(origin, self.config.communication_range_km * 1_000.0),
            None => Vec::new(),
        }
    }

    /// Pending conflicts known to this node.
    pub fn pending_conflicts(&self) -> &[ConflictRecord] {
        self.resolver.pending()
    }

    /// Last committed ledger block.
    pub fn latest_block(&self) -> Option<&Block> {
        self.ledger.latest_block()
    }

    /// Re-validate the whole local chain.
    pub fn validate_chain(&self) -> bool {
        self.ledger.validate_chain()
    }

    /// The node's ledger replica.
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// The node's airspace partition.
    pub fn volumes(&self) -> &VolumeManager {
        &self.volumes
    }

    /// The node's position table.
    pub fn positions(&self) -> &PositionTable {
        &self.positions
    }

    /// Lifetime counters.
    pub fn stats(&self) -> &NodeStats {
        &self.stats
    }

    /// The node's configuration.
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// The identity backend, for peer key management.
    pub fn identity_mut(&mut self) -> &mut I {
        &mut self.identity
    }

    /// The transport seam.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn sign(&mut self, kind: MessageKind, payload: Vec<u8>, now_ms: u64) -> SwarmMessage {
        self.nonce += 1;
        SwarmMessage::signed(
            &self.identity,
            AircraftId::BROADCAST,
            kind,
            payload,
            now_ms,
            self.nonce,
        )
    }
}
