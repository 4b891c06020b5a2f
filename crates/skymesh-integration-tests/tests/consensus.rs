//! Ledger convergence across replicas.

use skymesh_integration_tests::Swarm;
use skymesh_node::NodeConfig;

/// One proposer fills a block with intents, everyone receives the same
/// transactions in the same order, every replica seals an identical
/// candidate, the proposals cross the hub and the swarm commits one
/// block with no driver beyond the tick loop.
#[test]
fn replicas_converge_on_one_block() {
    let mut swarm = Swarm::launch(3, NodeConfig::default());

    for i in 0..10u64 {
        swarm
            .node(1)
            .declare_intent(format!("leg-{i}").as_bytes(), 1_000 + i)
            .unwrap();
    }

    // First tick: every replica seals (node 1 from its own appends, the
    // others from the received broadcasts) and puts its candidate on the
    // wire. Later nodes in the order already hear earlier proposals.
    for node in &mut swarm.nodes {
        let report = node.tick(2_000);
        assert!(report.sealed.is_some());
    }

    // Second tick: the remaining proposals arrive and every replica has
    // committed the same block.
    swarm.tick_all(3_000);
    for i in 1..=3u32 {
        assert_eq!(swarm.node(i).ledger().chain().len(), 2);
    }

    let digest = swarm.node(1).latest_block().unwrap().digest;
    for i in 1..=3u32 {
        let node = swarm.node(i);
        let head = node.latest_block().unwrap();
        assert_eq!(head.id, 1);
        assert_eq!(head.digest, digest);
        assert_eq!(head.transactions.len(), 10);
        assert!(node.validate_chain());
        assert_eq!(node.ledger().open_len(), 0);
        assert_eq!(node.ledger().candidate_count(), 0);
    }
}

/// A lone candidate cannot commit against a three-node quorum; the round
/// counter records the stalled vote.
#[test]
fn minority_candidate_does_not_commit() {
    let mut swarm = Swarm::launch(3, NodeConfig::default());

    for i in 0..10u64 {
        swarm.node(1).declare_intent(b"solo", 1_000 + i).unwrap();
    }

    // Only node 1 ticks: its own sealed candidate is the whole pool.
    let report = swarm.node(1).tick(2_000);
    assert!(report.sealed.is_some());
    assert!(!report.committed);
    assert_eq!(swarm.node(1).latest_block().unwrap().id, 0);
    assert_eq!(swarm.node(1).ledger().consensus_round(), 1);
}

/// A tampered candidate is rejected by every honest replica.
#[test]
fn tampered_candidate_is_rejected() {
    let mut swarm = Swarm::launch(3, NodeConfig::default());

    for i in 0..10u64 {
        swarm.node(1).declare_intent(b"leg", 1_000 + i).unwrap();
    }
    let mut block = swarm.node(1).tick(2_000).sealed.expect("sealed");
    block.transactions.pop();

    let rejected_before = swarm.node(2).ledger().rejected_candidates();
    swarm.node(2).tick(2_000);
    assert!(!swarm.node(2).submit_candidate(block));
    assert_eq!(
        swarm.node(2).ledger().rejected_candidates(),
        rejected_before + 1
    );
}
