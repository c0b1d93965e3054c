#![warn(missing_docs)]
//! This module provides [NetworkBuilder] and its interface for [Network].

use std::collections::BTreeMap;
use std::sync::Arc;

use rand::SeedableRng;
use rand_hc::Hc128Rng;

use crate::config::ChordConfig;
use crate::dht::IdSpace;
use crate::error::Result;
use crate::lookup::LookupTracker;
use crate::network::callback::DefaultCallback;
use crate::network::callback::SharedNetworkCallback;
use crate::network::Network;
use crate::sim::DelayModel;
use crate::sim::EventQueue;
use crate::sim::ExponentialDelay;
use crate::sim::TieBreak;

/// Creates a NetworkBuilder to configure a Network.
pub struct NetworkBuilder {
    config: ChordConfig,
    seed: u64,
    tie_break: TieBreak,
    delay: Option<Box<dyn DelayModel>>,
    callback: Option<SharedNetworkCallback>,
}

impl NetworkBuilder {
    /// Creates new instance of [NetworkBuilder]
    pub fn new(config: ChordConfig) -> Self {
        NetworkBuilder {
            config,
            seed: 0,
            tie_break: TieBreak::default(),
            delay: None,
            callback: None,
        }
    }

    /// Seed of every random choice of the network: delays and stabilization jitter.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Order of messages due at the same time.
    pub fn tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    /// Replace the exponential delays derived from the config.
    pub fn delay_model(mut self, delay: Box<dyn DelayModel>) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Bind callback for Network.
    pub fn callback(mut self, callback: SharedNetworkCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Try build for `Network`.
    pub fn build(self) -> Result<Network> {
        self.config.validate()?;
        let delay = match self.delay {
            Some(delay) => delay,
            None => Box::new(ExponentialDelay::from_config(&self.config, self.seed)?),
        };
        let callback = self
            .callback
            .unwrap_or_else(|| Arc::new(DefaultCallback {}));

        Ok(Network {
            space: IdSpace::new(self.config.hash_bits),
            config: self.config,
            nodes: BTreeMap::new(),
            queue: EventQueue::new(self.tie_break),
            delay,
            rng: Hc128Rng::seed_from_u64(self.seed.wrapping_add(1)),
            lookups: LookupTracker::new(),
            callback,
            processed: 0,
        })
    }
}
