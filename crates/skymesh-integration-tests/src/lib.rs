//! Shared harness for multi-node simulations.

use skymesh_identity::{AircraftId, Identity, KeyStore};
use skymesh_node::{HubTransport, MessageHub, NodeConfig, SwarmNode};

/// A swarm of fully keyed nodes wired through one in-process hub.
pub struct Swarm {
    pub hub: MessageHub,
    pub nodes: Vec<SwarmNode<HubTransport, KeyStore>>,
}

impl Swarm {
    /// Spin up `n` nodes with ids `1..=n`, every pair's verifying keys
    /// exchanged.
    pub fn launch(n: u32, config: NodeConfig) -> Self {
        let hub = MessageHub::new();
        let mut stores: Vec<KeyStore> = (1..=n)
            .map(|id| KeyStore::generate(AircraftId(id)).expect("keygen"))
            .collect();

        let keys: Vec<_> = stores
            .iter()
            .map(|ks| (ks.local_id(), ks.verifying_key()))
            .collect();
        for ks in &mut stores {
            for (id, key) in &keys {
                if *id != ks.local_id() {
                    ks.register_peer(*id, *key).expect("register peer");
                }
            }
        }

        let nodes = stores
            .into_iter()
            .map(|ks| {
                let endpoint = hub.endpoint(ks.local_id());
                SwarmNode::new(config.clone(), ks, endpoint)
            })
            .collect();
        Self { hub, nodes }
    }

    /// Tick every node once at the given time.
    pub fn tick_all(&mut self, now_ms: u64) {
        for node in &mut self.nodes {
            node.tick(now_ms);
        }
    }

    pub fn node(&mut self, id: u32) -> &mut SwarmNode<HubTransport, KeyStore> {
        self.nodes
            .iter_mut()
            .find(|n| n.id() == AircraftId(id))
            .expect("unknown node id")
    }
}
