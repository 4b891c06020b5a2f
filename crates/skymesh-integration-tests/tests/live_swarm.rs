//! End-to-end smoke test with real tick loops.

use std::time::Duration;

use skymesh_geo::AircraftPosition;
use skymesh_identity::AircraftId;
use skymesh_integration_tests::Swarm;
use skymesh_node::{NodeConfig, NodeRunner, SwarmNode};

#[tokio::test]
async fn swarm_of_runners_exchanges_positions() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "skymesh=warn".into()),
        )
        .with_test_writer()
        .try_init();

    // 100 Hz to keep the test short.
    let config = NodeConfig::default().with_update_frequency_hz(100);
    let mut swarm = Swarm::launch(3, config);
    for i in 1..=3u32 {
        let pos = AircraftPosition::at(AircraftId(i), 40.0 + f64::from(i), 9.0, 3_000.0);
        swarm.node(i).update_position(pos);
    }

    let mut runners: Vec<NodeRunner<_, _>> = swarm
        .nodes
        .drain(..)
        .map(NodeRunner::spawn)
        .collect();

    tokio::time::sleep(Duration::from_millis(200)).await;

    let mut nodes: Vec<SwarmNode<_, _>> = Vec::new();
    for runner in runners.drain(..) {
        nodes.push(runner.shutdown().await.expect("clean shutdown"));
    }

    for node in &nodes {
        assert!(node.stats().ticks > 0);
        assert_eq!(node.positions().len(), 3);
        assert!(node.validate_chain());
    }
}
