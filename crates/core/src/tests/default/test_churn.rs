use rand::Rng;
use rand::SeedableRng;
use rand_hc::Hc128Rng;

use crate::dht::Did;
use crate::dht::SuccessorReader;
use crate::error::Result;
use crate::membership::Membership;
use crate::network::callback::NodeEvent;
use crate::node::NodeState;
use crate::storage::KvStorageInterface;
use crate::tests::default::assert_converged;
use crate::tests::default::assert_keys_at_owners;
use crate::tests::default::dids;
use crate::tests::default::fill_keys;
use crate::tests::default::network_with_callback;
use crate::tests::default::preloaded;
use crate::tests::default::random_active;
use crate::tests::default::settle;
use crate::tests::default::RecordingCallback;

const RING: [u64; 10] = [10, 40, 75, 101, 130, 160, 190, 215, 233, 250];

fn d(v: u64) -> Did {
    Did::from(v)
}

#[test]
fn test_crash_and_recovery() -> Result<()> {
    let callback = RecordingCallback::shared();
    let mut net = network_with_callback(8, callback.clone())?;
    net.preload(&dids(&RING))?;
    let keys = fill_keys(&mut net, 40, 9)?;
    settle(&mut net, 10)?;

    let crashed = d(130);
    let crashed_keys: Vec<Did> = net.node(crashed)?.storage().keys().copied().collect();
    net.crash(crashed)?;
    assert!(!net.is_active(crashed));
    assert!(net.is_initialized(crashed));
    settle(&mut net, 15)?;

    println!("every live peer dropped the crashed node");
    assert_converged(&net);
    for did in net.active_nodes() {
        let ring = net.node(did)?.ring();
        assert!(!ring.successors().contains(&crashed), "{} still lists it", did);
        assert_ne!(ring.predecessor, Some(crashed));
    }
    assert_eq!(net.node(d(160))?.ring().predecessor, Some(d(101)));

    println!("its keys resolve to the next live node meanwhile");
    let mut rng = Hc128Rng::seed_from_u64(2);
    let mut issued = vec![];
    for key in crashed_keys.iter() {
        let requester = random_active(&net, &mut rng);
        issued.push(net.lookup(requester, *key)?);
    }
    settle(&mut net, 5)?;
    for id in issued {
        let lookup = net.lookups().get(id).expect("tracked");
        assert!(lookup.succeeded(), "{:?}", lookup);
        let outcome = lookup.outcome.as_ref().expect("completed");
        assert_eq!(outcome.resolution.owner, d(160));
    }

    net.recover(crashed)?;
    settle(&mut net, 15)?;
    assert!(net.is_active(crashed));
    assert_converged(&net);
    assert_eq!(net.node(d(160))?.ring().predecessor, Some(crashed));
    assert_keys_at_owners(&net, keys.len());
    for key in crashed_keys {
        assert!(net.node(crashed)?.storage().contains_key(&key));
    }
    assert_eq!(
        callback.count(|did, e| *did == crashed
            && matches!(e, NodeEvent::StateChanged {
                to: NodeState::Active,
                ..
            })),
        2
    );
    Ok(())
}

#[test]
fn test_graceful_leave() -> Result<()> {
    let callback = RecordingCallback::shared();
    let mut net = network_with_callback(8, callback.clone())?;
    net.preload(&dids(&RING))?;
    let keys = fill_keys(&mut net, 40, 4)?;
    settle(&mut net, 10)?;

    let leaving = d(190);
    let handed = net.node(leaving)?.storage().count();
    net.leave(leaving)?;
    assert_eq!(net.state_of(leaving), Some(NodeState::Leaving));
    assert!(!net.is_active(leaving));
    settle(&mut net, 1)?;

    assert_eq!(net.state_of(leaving), Some(NodeState::Cleared));
    assert!(!net.is_initialized(leaving));
    assert_keys_at_owners(&net, keys.len());
    let snapshot = net.snapshot(leaving)?;
    assert!(snapshot.dht.successors.is_empty());
    assert!(snapshot.storage.keys.is_empty());
    if handed > 0 {
        assert_eq!(
            callback.count(|did, e| *did == leaving
                && *e
                    == NodeEvent::KeysTransferred {
                        to: d(215),
                        count: handed,
                    }),
            1
        );
    }

    settle(&mut net, 10)?;
    assert_converged(&net);
    assert_eq!(net.node(d(215))?.ring().predecessor, Some(d(160)));
    assert_eq!(net.node(d(160))?.ring().successors().min(), d(215));

    println!("a cleared node may join again");
    net.join(leaving, d(10))?;
    settle(&mut net, 10)?;
    assert_converged(&net);
    assert_keys_at_owners(&net, keys.len());
    Ok(())
}

#[test]
fn test_churn_keeps_ring_and_keys() -> Result<()> {
    let callback = RecordingCallback::shared();
    let mut net = network_with_callback(8, callback.clone())?;
    net.preload(&dids(&[
        5, 20, 34, 51, 66, 80, 97, 110, 128, 141, 157, 172, 190, 203, 221, 240,
    ]))?;
    let keys = fill_keys(&mut net, 50, 21)?;
    settle(&mut net, 10)?;

    let mut rng = Hc128Rng::seed_from_u64(99);
    for fresh in [13, 60, 120, 180, 230, 250] {
        let leaving = random_active(&net, &mut rng);
        net.leave(leaving)?;
        settle(&mut net, 4)?;

        let seed = random_active(&net, &mut rng);
        net.join(d(fresh), seed)?;
        settle(&mut net, 4)?;

        for _ in 0..20 {
            let requester = random_active(&net, &mut rng);
            let key = keys[rng.gen_range(0..keys.len())];
            net.lookup(requester, key)?;
        }
        // a requester leaving with a query in flight never hears back
        settle(&mut net, 4)?;
    }
    settle(&mut net, 15)?;

    assert_converged(&net);
    assert_eq!(net.active_nodes().len(), 16);
    assert_keys_at_owners(&net, keys.len());

    println!("every lookup completed, failures are flagged");
    assert_eq!(net.lookups().pending(), 0);
    for lookup in net.lookups().iter() {
        let report = lookup.report();
        assert!(report.completed);
        if report.hop_count < 0 {
            assert!(!report.owner_correct);
            assert!(!lookup.succeeded());
        }
    }
    assert_eq!(
        callback.count(|_, e| matches!(e, NodeEvent::LookupCompleted { .. })),
        net.lookups().len()
    );

    println!("the settled ring answers every lookup");
    let before = net.lookups().len();
    let mut issued = vec![];
    for _ in 0..100 {
        let requester = random_active(&net, &mut rng);
        let key = keys[rng.gen_range(0..keys.len())];
        issued.push(net.lookup(requester, key)?);
    }
    settle(&mut net, 5)?;
    assert_eq!(net.lookups().len(), before + 100);
    for id in issued {
        let lookup = net.lookups().get(id).expect("tracked");
        assert!(lookup.succeeded(), "{:?}", lookup);
        assert!(lookup.report().key_present);
    }
    Ok(())
}

#[test]
fn test_adjacent_leaves_keep_keys() -> Result<()> {
    let mut net = preloaded(&RING, 8)?;
    let keys = fill_keys(&mut net, 60, 12)?;
    settle(&mut net, 10)?;

    // 40 still hands its keys to 75, which is already leaving
    net.leave(d(75))?;
    assert_eq!(net.node(d(40))?.ring().successors().min(), d(75));
    net.leave(d(40))?;
    settle(&mut net, 1)?;
    assert_eq!(net.state_of(d(75)), Some(NodeState::Cleared));
    assert_eq!(net.state_of(d(40)), Some(NodeState::Cleared));

    settle(&mut net, 30)?;
    assert_converged(&net);
    assert_keys_at_owners(&net, keys.len());
    Ok(())
}

#[test]
fn test_lookups_under_churn_are_right_or_flagged() -> Result<()> {
    let mut net = preloaded(
        &[
            5, 20, 34, 51, 66, 80, 97, 110, 128, 141, 157, 172, 190, 203, 221, 240,
        ],
        8,
    )?;
    let keys = fill_keys(&mut net, 50, 33)?;
    settle(&mut net, 10)?;

    let mut rng = Hc128Rng::seed_from_u64(17);
    for _ in 0..30 {
        if rng.gen_bool(0.5) && net.active_nodes().len() > 6 {
            let leaving = random_active(&net, &mut rng);
            net.leave(leaving)?;
        } else {
            let fresh = loop {
                let candidate = d(rng.gen_range(0..256));
                match net.state_of(candidate) {
                    None | Some(NodeState::Unsubscribed) | Some(NodeState::Cleared) => {
                        break candidate
                    }
                    _ => continue,
                }
            };
            let seed = random_active(&net, &mut rng);
            net.join(fresh, seed)?;
        }
        // issued while the change is still spreading
        for _ in 0..20 {
            let requester = random_active(&net, &mut rng);
            let key = keys[rng.gen_range(0..keys.len())];
            net.lookup(requester, key)?;
        }
        settle(&mut net, 4)?;
    }
    settle(&mut net, 10)?;

    let mut completed = 0;
    for lookup in net.lookups().iter().filter(|l| l.is_complete()) {
        completed += 1;
        assert!(
            lookup.succeeded() || lookup.report().hop_count < 0,
            "wrong owner not flagged: {:?}",
            lookup
        );
    }
    assert!(completed >= 300, "{} lookups completed", completed);
    assert_converged(&net);
    assert_keys_at_owners(&net, keys.len());
    Ok(())
}
