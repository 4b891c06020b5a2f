//! Swarm node binary
//!
//! Runs an in-process swarm of coordinating aircraft nodes until
//! interrupted. Each node broadcasts its state vector, detects and
//! resolves separation conflicts and votes on ledger blocks.

use std::time::{SystemTime, UNIX_EPOCH};

use skymesh_geo::AircraftPosition;
use skymesh_identity::{AircraftId, Identity, KeyStore};
use skymesh_node::{MessageHub, NodeConfig, NodeRunner, SwarmNode};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const SWARM_SIZE: u32 = 5;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "skymesh=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(swarm_size = SWARM_SIZE, "Starting Skymesh swarm");

    let hub = MessageHub::new();
    let mut stores: Vec<KeyStore> = (1..=SWARM_SIZE)
        .map(|id| KeyStore::generate(AircraftId(id)))
        .collect::<Result<_, _>>()?;

    // Full key exchange before launch.
    let keys: Vec<_> = stores
        .iter()
        .map(|ks| (ks.local_id(), ks.verifying_key()))
        .collect();
    for ks in &mut stores {
        for (id, key) in &keys {
            if *id != ks.local_id() {
                ks.register_peer(*id, *key)?;
            }
        }
    }

    let now = unix_ms();
    let mut runners = Vec::new();
    for (i, ks) in stores.into_iter().enumerate() {
        let id = ks.local_id();
        let endpoint = hub.endpoint(id);
        let mut node = SwarmNode::new(NodeConfig::default(), ks, endpoint);

        // Stagger the fleet along a corridor at slightly offset levels.
        let mut pos =
            AircraftPosition::at(id, 45.0 + i as f64 * 0.005, 9.0, 2_000.0 + i as f64 * 50.0);
        pos.heading = 90.0;
        pos.airspeed = 120.0;
        pos.timestamp_ms = now;
        node.update_position(pos);

        runners.push(NodeRunner::spawn(node));
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down swarm");

    for runner in runners {
        if let Some(node) = runner.shutdown().await {
            let stats = *node.stats();
            tracing::info!(
                node = %node.id(),
                ticks = stats.ticks,
                processed = stats.messages_processed,
                conflicts = stats.conflicts_detected,
                resolved = stats.resolutions_archived,
                chain_len = node.ledger().chain().len(),
                "node stopped"
            );
        }
    }
    Ok(())
}

fn unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
