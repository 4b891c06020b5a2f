//! Airspace volume claims across the swarm.

use skymesh_identity::AircraftId;
use skymesh_integration_tests::Swarm;
use skymesh_node::NodeConfig;

#[test]
fn claims_propagate_and_exclude() {
    let mut swarm = Swarm::launch(3, NodeConfig::default());

    let v1 = swarm.node(1).request_volume(1_000).unwrap();
    swarm.tick_all(1_001);

    // Every replica agrees on who holds the volume.
    for i in 1..=3u32 {
        assert_eq!(swarm.node(i).volumes().volume_of(AircraftId(1)), Some(v1));
    }

    // The next claimant is steered to a different volume.
    let v2 = swarm.node(2).request_volume(1_100).unwrap();
    assert_ne!(v1, v2);
    swarm.tick_all(1_101);
    for i in 1..=3u32 {
        assert_eq!(swarm.node(i).volumes().volume_of(AircraftId(2)), Some(v2));
    }
}

#[test]
fn release_frees_the_volume_for_the_swarm() {
    let mut swarm = Swarm::launch(2, NodeConfig::default());

    let v1 = swarm.node(1).request_volume(1_000).unwrap();
    swarm.tick_all(1_001);

    swarm.node(1).release_volume(1_100).unwrap();
    swarm.tick_all(1_101);

    for i in 1..=2u32 {
        assert_eq!(swarm.node(i).volumes().volume_of(AircraftId(1)), None);
    }

    // The freed volume is first in line again.
    assert_eq!(swarm.node(2).request_volume(1_200).unwrap(), v1);
}

#[test]
fn a_swarm_larger_than_the_sector_count_exhausts_volumes() {
    let mut swarm = Swarm::launch(9, NodeConfig::default());

    for i in 1..=8u32 {
        swarm.node(i).request_volume(1_000 + u64::from(i)).unwrap();
        swarm.tick_all(1_010 + u64::from(i));
    }
    assert!(matches!(
        swarm.node(9).request_volume(2_000),
        Err(skymesh_node::Error::NoFreeVolume)
    ));
}
