use rand::Rng;
use rand::SeedableRng;
use rand_hc::Hc128Rng;

use crate::dht::Did;
use crate::error::Error;
use crate::error::Result;
use crate::membership::Membership;
use crate::tests::default::assert_converged;
use crate::tests::default::assert_keys_at_owners;
use crate::tests::default::dids;
use crate::tests::default::fill_keys;
use crate::tests::default::network;
use crate::tests::default::preloaded;
use crate::tests::default::random_active;
use crate::tests::default::settle;

fn d(v: u64) -> Did {
    Did::from(v)
}

#[test]
fn test_lookups_on_static_ring() -> Result<()> {
    let mut rng = Hc128Rng::seed_from_u64(11);
    let mut ids: Vec<u64> = vec![];
    while ids.len() < 20 {
        let id = rng.gen_range(0..1024);
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    let mut net = network(10)?;
    net.preload(&dids(&ids))?;
    settle(&mut net, 40)?;
    assert_converged(&net);

    for _ in 0..1000 {
        let requester = random_active(&net, &mut rng);
        let key = d(rng.gen_range(0..1024));
        net.lookup(requester, key)?;
    }
    settle(&mut net, 10)?;

    let lookups = net.lookups();
    assert_eq!(lookups.len(), 1000);
    assert_eq!(lookups.pending(), 0);
    for lookup in lookups.iter() {
        let report = lookup.report();
        assert!(lookup.succeeded(), "{:?}", lookup);
        assert!(report.owner_correct);
        assert_eq!(report.timeout_count, 0);
        assert!(report.hop_count >= 0);
        let outcome = lookup.outcome.as_ref().expect("completed");
        assert_eq!(Some(outcome.resolution.owner), lookup.expected_owner);
    }
    let summary = lookups.summary();
    assert_eq!(summary.succeeded, 1000);
    assert!(summary.mean_hops < 10.0, "mean hops {}", summary.mean_hops);
    Ok(())
}

#[test]
fn test_lookup_of_own_id() -> Result<()> {
    let mut net = preloaded(&[2, 7, 12], 4)?;
    let id = net.lookup(d(7), d(7))?;
    settle(&mut net, 1)?;
    let lookup = net.lookups().get(id).expect("tracked");
    let report = lookup.report();
    assert!(report.completed);
    assert!(report.owner_correct);
    assert_eq!(report.hop_count, 0);
    assert_eq!(report.contact_count, 0);
    Ok(())
}

#[test]
fn test_lookup_reports_key_presence() -> Result<()> {
    let mut net = preloaded(&[2, 7, 12], 4)?;
    let keys = fill_keys(&mut net, 5, 3)?;
    settle(&mut net, 3)?;

    let present = net.lookup(d(2), keys[0])?;
    let absent_key = (0..16)
        .map(d)
        .find(|k| !keys.contains(k))
        .expect("ring has room");
    let absent = net.lookup(d(12), absent_key)?;
    settle(&mut net, 2)?;

    let present = net.lookups().get(present).expect("tracked").report();
    assert!(present.owner_correct);
    assert!(present.key_present);
    assert!(!present.owner_crashed);
    let absent = net.lookups().get(absent).expect("tracked").report();
    assert!(absent.owner_correct);
    assert!(!absent.key_present);
    Ok(())
}

#[test]
fn test_lookup_needs_active_requester() -> Result<()> {
    let mut net = preloaded(&[2, 7, 12], 4)?;
    net.crash(d(7))?;
    assert!(matches!(
        net.lookup(d(7), d(1)),
        Err(Error::InvalidTransition { op: "lookup", .. })
    ));
    assert!(matches!(net.lookup(d(5), d(1)), Err(Error::NodeNotFound(_))));
    Ok(())
}

#[test]
fn test_keys_follow_joins() -> Result<()> {
    let mut net = preloaded(&[10, 40, 75, 101, 130, 160, 190, 215, 233, 250], 8)?;
    fill_keys(&mut net, 60, 5)?;
    assert_keys_at_owners(&net, 60);
    settle(&mut net, 5)?;
    assert_keys_at_owners(&net, 60);

    let mut rng = Hc128Rng::seed_from_u64(17);
    for id in [20, 90, 140, 200, 245] {
        let seed = random_active(&net, &mut rng);
        net.join(d(id), seed)?;
        settle(&mut net, 4)?;
    }
    settle(&mut net, 10)?;
    assert_converged(&net);
    assert_keys_at_owners(&net, 60);
    Ok(())
}
