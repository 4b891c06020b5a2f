//! Message transport between swarm nodes.
//!
//! [`Transport`] is the seam between a node and the radio: the node only
//! ever sends envelopes and drains its inbox, so the medium can be swapped
//! without touching coordination logic. [`MessageHub`] is the in-process
//! medium used by simulations and tests: a shared switchboard with one
//! bounded FIFO inbox per endpoint.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::warn;

use skymesh_identity::AircraftId;
use skymesh_protocol::SwarmMessage;

/// A node's view of the communication medium.
pub trait Transport {
    /// Hand an envelope to the medium. Broadcast envelopes go to every
    /// connected peer. Returns `false` if the medium refused it.
    fn send(&self, msg: SwarmMessage) -> bool;

    /// Drain the local inbox.
    fn receive(&self) -> Vec<SwarmMessage>;

    /// Whether the medium currently reaches any peer.
    fn is_connected(&self) -> bool;

    /// Number of reachable peers, the local endpoint included.
    fn peer_count(&self) -> usize;
}

/// Default inbox capacity per endpoint.
const INBOX_CAPACITY: usize = 1_024;

#[derive(Debug, Default)]
struct HubState {
    inboxes: HashMap<AircraftId, VecDeque<SwarmMessage>>,
    /// Messages discarded because an inbox was full.
    overflowed: u64,
}

/// In-process switchboard connecting [`HubTransport`] endpoints.
#[derive(Debug, Clone, Default)]
pub struct MessageHub {
    state: Arc<Mutex<HubState>>,
    capacity: usize,
}

impl MessageHub {
    pub fn new() -> Self {
        Self::with_capacity(INBOX_CAPACITY)
    }

    /// A hub whose inboxes hold at most `capacity` pending envelopes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(HubState::default())),
            capacity: capacity.max(1),
        }
    }

    /// Register an endpoint and return its transport handle.
    pub fn endpoint(&self, id: AircraftId) -> HubTransport {
        self.lock().inboxes.entry(id).or_default();
        HubTransport {
            hub: self.clone(),
            local: id,
            connected: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Registered endpoints.
    pub fn endpoint_count(&self) -> usize {
        self.lock().inboxes.len()
    }

    /// Envelopes discarded because an inbox was full.
    pub fn overflowed(&self) -> u64 {
        self.lock().overflowed
    }

    fn lock(&self) -> MutexGuard<'_, HubState> {
        // A poisoned hub still holds consistent queues; keep going.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn deliver(&self, from: AircraftId, msg: SwarmMessage) {
        let capacity = self.capacity;
        let mut state = self.lock();
        if msg.is_broadcast() {
            let mut overflowed = 0;
            for (id, inbox) in state.inboxes.iter_mut() {
                if *id == from {
                    continue;
                }
                if inbox.len() >= capacity {
                    overflowed += 1;
                    continue;
                }
                inbox.push_back(msg.clone());
            }
            state.overflowed += overflowed;
            if overflowed > 0 {
                warn!(sender = %from, overflowed, "inbox overflow, broadcast dropped for some peers");
            }
        } else if let Some(inbox) = state.inboxes.get_mut(&msg.target) {
            if inbox.len() >= capacity {
                state.overflowed += 1;
                warn!(sender = %from, target = %msg.target, "inbox overflow, envelope dropped");
            } else {
                inbox.push_back(msg);
            }
        }
    }
}

/// One endpoint's handle on a [`MessageHub`].
///
/// The connected flag models radio loss: a disconnected endpoint neither
/// sends nor receives, but its inbox keeps buffering up to capacity.
#[derive(Debug, Clone)]
pub struct HubTransport {
    hub: MessageHub,
    local: AircraftId,
    connected: Arc<AtomicBool>,
}

impl HubTransport {
    /// Simulate losing or regaining the radio link.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// The endpoint this handle sends as.
    pub fn local_id(&self) -> AircraftId {
        self.local
    }
}

impl Transport for HubTransport {
    fn send(&self, msg: SwarmMessage) -> bool {
        if !self.is_connected() {
            return false;
        }
        self.hub.deliver(self.local, msg);
        true
    }

    fn receive(&self) -> Vec<SwarmMessage> {
        if !self.is_connected() {
            return Vec::new();
        }
        let mut state = self.hub.lock();
        state
            .inboxes
            .get_mut(&self.local)
            .map(|inbox| inbox.drain(..).collect())
            .unwrap_or_default()
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn peer_count(&self) -> usize {
        self.hub.endpoint_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skymesh_identity::KeyStore;
    use skymesh_protocol::MessageKind;

    fn heartbeat(ks: &KeyStore, target: AircraftId, nonce: u64) -> SwarmMessage {
        SwarmMessage::signed(ks, target, MessageKind::Heartbeat, Vec::new(), 0, nonce)
    }

    #[test]
    fn broadcast_reaches_every_peer_but_not_the_sender() {
        let hub = MessageHub::new();
        let a = hub.endpoint(AircraftId(1));
        let b = hub.endpoint(AircraftId(2));
        let c = hub.endpoint(AircraftId(3));

        let ks = KeyStore::generate(AircraftId(1)).unwrap();
        assert!(a.send(heartbeat(&ks, AircraftId::BROADCAST, 1)));

        assert_eq!(a.receive().len(), 0);
        assert_eq!(b.receive().len(), 1);
        assert_eq!(c.receive().len(), 1);
    }

    #[test]
    fn targeted_delivery() {
        let hub = MessageHub::new();
        let a = hub.endpoint(AircraftId(1));
        let b = hub.endpoint(AircraftId(2));
        let c = hub.endpoint(AircraftId(3));

        let ks = KeyStore::generate(AircraftId(1)).unwrap();
        a.send(heartbeat(&ks, AircraftId(2), 1));

        assert_eq!(b.receive().len(), 1);
        assert_eq!(c.receive().len(), 0);
    }

    #[test]
    fn inbox_drains_in_fifo_order() {
        let hub = MessageHub::new();
        let a = hub.endpoint(AircraftId(1));
        let b = hub.endpoint(AircraftId(2));

        let ks = KeyStore::generate(AircraftId(1)).unwrap();
        for nonce in 1..=3 {
            a.send(heartbeat(&ks, AircraftId(2), nonce));
        }
        let nonces: Vec<u64> = b.receive().iter().map(|m| m.nonce).collect();
        assert_eq!(nonces, vec![1, 2, 3]);
    }

    #[test]
    fn full_inbox_drops_and_counts() {
        let hub = MessageHub::with_capacity(2);
        let a = hub.endpoint(AircraftId(1));
        let b = hub.endpoint(AircraftId(2));

        let ks = KeyStore::generate(AircraftId(1)).unwrap();
        for nonce in 1..=5 {
            a.send(heartbeat(&ks, AircraftId(2), nonce));
        }
        assert_eq!(b.receive().len(), 2);
        assert_eq!(hub.overflowed(), 3);
    }

    #[test]
    fn disconnected_endpoint_neither_sends_nor_receives() {
        let hub = MessageHub::new();
        let a = hub.endpoint(AircraftId(1));
        let b = hub.endpoint(AircraftId(2));

        let ks_a = KeyStore::generate(AircraftId(1)).unwrap();
        let ks_b = KeyStore::generate(AircraftId(2)).unwrap();

        b.set_connected(false);
        assert!(!b.send(heartbeat(&ks_b, AircraftId::BROADCAST, 1)));

        // Delivery still lands in the inbox; the drain waits for the link.
        a.send(heartbeat(&ks_a, AircraftId(2), 1));
        assert!(b.receive().is_empty());

        b.set_connected(true);
        assert_eq!(b.receive().len(), 1);
    }
}
