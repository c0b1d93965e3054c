use std::time::Duration;

use crate::dht::Did;
use crate::error::Error;
use crate::error::Result;
use crate::membership::Membership;
use crate::network::callback::NodeEvent;
use crate::network::Network;
use crate::network::NetworkBuilder;
use crate::node::NodeState;
use crate::sim::ConstantDelay;
use crate::sim::TieBreak;
use crate::tests::default::assert_converged;
use crate::tests::default::dids;
use crate::tests::default::joined;
use crate::tests::default::network;
use crate::tests::default::network_with_callback;
use crate::tests::default::preloaded;
use crate::tests::default::settle;
use crate::tests::default::test_config;
use crate::tests::default::RecordingCallback;

fn d(v: u64) -> Did {
    Did::from(v)
}

/// Expected finger table entries of `did`, None where the offset wraps back to itself.
fn expected_fingers(net: &Network, did: Did) -> Vec<Option<Did>> {
    let space = net.space();
    (1..=space.bits())
        .map(|i| {
            let owner = net.first_not_crashed(space.finger_start(did, i));
            owner.filter(|o| *o != did)
        })
        .collect()
}

fn fingers(net: &Network, did: Did) -> Result<Vec<Option<Did>>> {
    let node = net.node(did)?;
    Ok((1..=net.space().bits())
        .map(|i| node.ring().finger[i])
        .collect())
}

#[test]
fn test_stabilization_of_two_nodes() -> Result<()> {
    let callback = RecordingCallback::shared();
    let mut net = network_with_callback(4, callback.clone())?;
    net.create(d(3))?;
    net.join(d(10), d(3))?;
    assert_eq!(net.state_of(d(10)), Some(NodeState::Joining));

    settle(&mut net, 3)?;
    let n3 = net.snapshot(d(3))?;
    let n10 = net.snapshot(d(10))?;
    assert_eq!(n3.dht.successors, vec![d(10)]);
    assert_eq!(n3.dht.predecessor, Some(d(10)));
    assert_eq!(n10.dht.successors, vec![d(3)]);
    assert_eq!(n10.dht.predecessor, Some(d(3)));
    assert_eq!(n10.state, NodeState::Active);

    assert_eq!(
        callback.count(|did, e| *did == d(10)
            && *e
                == NodeEvent::StateChanged {
                    from: NodeState::Joining,
                    to: NodeState::Active,
                }),
        1
    );
    Ok(())
}

#[test]
fn test_ring_closure_after_joins() -> Result<()> {
    let ids = [5, 200, 17, 90, 130, 250, 44, 3, 160, 71];
    let mut net = joined(&ids, 8)?;
    settle(&mut net, 10)?;
    assert_converged(&net);

    let mut sorted = dids(&ids);
    sorted.sort();
    for (i, did) in sorted.iter().enumerate() {
        let previous = sorted[(i + sorted.len() - 1) % sorted.len()];
        assert_eq!(net.node(*did)?.ring().predecessor, Some(previous));
        assert!(net.is_active(*did));
        assert!(net.is_initialized(*did));
    }
    Ok(())
}

#[test]
fn test_finger_table_reaches_fixed_point() -> Result<()> {
    let ids = [1, 6, 11, 19, 23, 30, 38, 41, 47, 52, 58, 63];
    let callback = RecordingCallback::shared();
    let mut net = network_with_callback(6, callback.clone())?;
    net.preload(&dids(&ids))?;
    settle(&mut net, 60)?;
    assert_converged(&net);

    let before = dids(&ids)
        .into_iter()
        .map(|did| fingers(&net, did))
        .collect::<Result<Vec<_>>>()?;
    for (did, table) in dids(&ids).into_iter().zip(before.iter()) {
        assert_eq!(*table, expected_fingers(&net, did), "fingers of {}", did);
    }

    callback.clear();
    settle(&mut net, 20)?;
    let after = dids(&ids)
        .into_iter()
        .map(|did| fingers(&net, did))
        .collect::<Result<Vec<_>>>()?;
    assert_eq!(before, after);
    assert_eq!(
        callback.count(|_, e| matches!(e, NodeEvent::FingerUpdated { .. })),
        0
    );
    Ok(())
}

#[test]
fn test_convergence_with_colliding_timestamps() -> Result<()> {
    for tie_break in [TieBreak::Fifo, TieBreak::Lifo, TieBreak::Shuffled(7)] {
        let config = crate::ChordConfig {
            stabilize_amplitude_ms: 0,
            ..test_config(6)
        };
        let mut net = NetworkBuilder::new(config)
            .seed(3)
            .tie_break(tie_break)
            .delay_model(Box::new(ConstantDelay::new(
                Duration::from_millis(10),
                Duration::from_millis(50),
            )))
            .build()?;
        net.preload(&dids(&[2, 10, 20, 28, 36, 44, 52, 60]))?;
        // three joins at the very same instant, each through another seed
        net.join(d(15), d(2))?;
        net.join(d(40), d(28))?;
        net.join(d(63), d(52))?;
        settle(&mut net, 30)?;
        assert_converged(&net);
        assert_eq!(net.active_nodes().len(), 11, "{:?}", tie_break);
    }
    Ok(())
}

#[test]
fn test_join_rejects_bad_seed() -> Result<()> {
    let mut net = preloaded(&[2, 7, 12], 4)?;
    net.crash(d(7))?;
    assert!(matches!(
        net.join(d(9), d(7)),
        Err(Error::InvalidSeed(s)) if s == d(7)
    ));
    assert!(matches!(net.join(d(9), d(9)), Err(Error::InvalidSeed(_))));
    assert!(matches!(
        net.join(d(2), d(12)),
        Err(Error::InvalidTransition { .. })
    ));
    assert!(matches!(
        net.join(d(20), d(12)),
        Err(Error::DidOutOfRange(20, 4))
    ));
    Ok(())
}

#[test]
fn test_join_fails_when_path_vanishes() -> Result<()> {
    let callback = RecordingCallback::shared();
    let mut net = NetworkBuilder::new(test_config(4))
        .seed(1)
        .delay_model(Box::new(ConstantDelay::new(
            Duration::from_millis(10),
            Duration::from_millis(50),
        )))
        .callback(callback.clone())
        .build()?;
    net.preload(&dids(&[3, 7]))?;
    // 3 forwards the query to 7, which is gone when asked
    net.join(d(10), d(3))?;
    net.crash(d(7))?;
    net.run_for(Duration::from_millis(150))?;

    assert_eq!(net.state_of(d(10)), Some(NodeState::Unsubscribed));
    assert_eq!(
        callback.count(|did, e| *did == d(10) && *e == NodeEvent::JoinFailed),
        1
    );
    assert_eq!(
        callback.count(|did, e| *did == d(3) && *e == NodeEvent::PeerPruned { peer: d(7) }),
        1
    );
    assert!(net.node(d(3))?.ring().successors().is_singleton());

    println!("a failed node may join again");
    net.join(d(10), d(3))?;
    settle(&mut net, 5)?;
    assert_eq!(net.state_of(d(10)), Some(NodeState::Active));
    assert_eq!(net.node(d(10))?.incarnation(), 2);
    Ok(())
}

#[test]
fn test_singleton_ring() -> Result<()> {
    let mut net = network(4)?;
    net.create(d(6))?;
    settle(&mut net, 5)?;
    assert!(net.ring_closure());
    assert!(net.node(d(6))?.ring().successors().is_singleton());
    assert_eq!(net.node(d(6))?.ring().predecessor, None);
    Ok(())
}
