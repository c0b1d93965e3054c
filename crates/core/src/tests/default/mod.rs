use std::sync::Arc;
use std::sync::Mutex;

use rand::Rng;
use rand::SeedableRng;
use rand_hc::Hc128Rng;

use crate::config::ChordConfig;
use crate::dht::Did;
use crate::error::Result;
use crate::membership::Membership;
use crate::network::callback::NetworkCallback;
use crate::network::callback::NodeEvent;
use crate::network::Network;
use crate::network::NetworkBuilder;

mod test_churn;
mod test_lookup;
mod test_stabilization;

/// Fast links and short stabilization periods.
pub fn test_config(bits: u8) -> ChordConfig {
    ChordConfig {
        hash_bits: bits,
        successors_size: 3,
        mean_packet_delay_ms: 10,
        max_packet_delay_ms: 50,
        stabilize_offset_ms: 200,
        stabilize_amplitude_ms: 100,
        ..Default::default()
    }
}

pub fn network(bits: u8) -> Result<Network> {
    NetworkBuilder::new(test_config(bits)).seed(42).build()
}

pub fn dids(ids: &[u64]) -> Vec<Did> {
    ids.iter().map(|x| Did::from(*x)).collect()
}

/// Every node active with its correct successor.
pub fn preloaded(ids: &[u64], bits: u8) -> Result<Network> {
    let mut net = network(bits)?;
    net.preload(&dids(ids))?;
    Ok(net)
}

/// First node creates the ring, the others join through it one at a time.
pub fn joined(ids: &[u64], bits: u8) -> Result<Network> {
    let mut net = network(bits)?;
    let ids = dids(ids);
    let (first, rest) = ids.split_first().expect("at least one node");
    net.create(*first)?;
    for did in rest {
        net.join(*did, *first)?;
        settle(&mut net, 3)?;
    }
    Ok(net)
}

/// Run for `periods` full stabilization periods.
pub fn settle(net: &mut Network, periods: u32) -> Result<usize> {
    let period = net.config().stabilize_period();
    net.run_for(period * periods)
}

pub fn assert_converged(net: &Network) {
    assert!(net.ring_closure(), "ring is not closed: {:#?}", net.inspect());
    assert_eq!(net.missing_wrong_successors(), (0, 0));
}

/// Every key sits at exactly one node, its owner.
pub fn assert_keys_at_owners(net: &Network, expected: usize) {
    let stored = net.stored_keys();
    assert_eq!(stored.len(), expected, "keys: {:?}", stored);
    for (key, holder) in stored {
        assert_eq!(
            net.first_not_crashed(key),
            Some(holder),
            "key {} is held by {}",
            key,
            holder
        );
    }
}

/// Put `count` distinct random keys at their owners.
pub fn fill_keys(net: &mut Network, count: usize, seed: u64) -> Result<Vec<Did>> {
    use crate::message::handlers::storage::ChordStorageInterface;

    let mut rng = Hc128Rng::seed_from_u64(seed);
    let size = net.space().size();
    let mut keys: Vec<Did> = vec![];
    while keys.len() < count {
        let key = Did::from(rng.gen_range(0..size));
        if !keys.contains(&key) {
            net.storage_store(key, format!("value of {}", key))?;
            keys.push(key);
        }
    }
    Ok(keys)
}

pub fn random_active(net: &Network, rng: &mut Hc128Rng) -> Did {
    let active = net.active_nodes();
    active[rng.gen_range(0..active.len())]
}

/// Keeps every event in order.
#[derive(Default)]
pub struct RecordingCallback {
    events: Mutex<Vec<(Did, NodeEvent)>>,
}

impl RecordingCallback {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<(Did, NodeEvent)> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, f: impl Fn(&Did, &NodeEvent) -> bool) -> usize {
        self.events().iter().filter(|(d, e)| f(d, e)).count()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

impl NetworkCallback for RecordingCallback {
    fn on_event(&self, did: Did, event: &NodeEvent) {
        self.events.lock().unwrap().push((did, event.clone()));
    }
}

pub fn network_with_callback(bits: u8, callback: Arc<RecordingCallback>) -> Result<Network> {
    NetworkBuilder::new(test_config(bits))
        .seed(42)
        .callback(callback)
        .build()
}
