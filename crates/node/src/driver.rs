//! Membership policies driving a [Network] through a whole run.
//!
//! The driver keeps its own agenda of policy actions on the same virtual clock as the network.
//! Before an action fires, every message due at or before its time is delivered.
//!
//! ```txt
//! t = 0           preload the ring, or insert one node every insertion_delay
//! t = settled     store the generated payloads at their owners
//! every lookup_interval     a batch of lookups from distinct active nodes
//! every leave_interval      a batch of graceful leaves, join_interval later a batch of joins
//! every crash_interval      each active node crashes with crash_pr, recovering later
//! ```
use std::time::Duration;

use chordsim_core::lookup::LookupSummary;
use chordsim_core::message::handlers::storage::ChordStorageInterface;
use chordsim_core::network::callback::SharedNetworkCallback;
use chordsim_core::node::NodeState;
use chordsim_core::sim::EventQueue;
use chordsim_core::sim::Scheduler;
use chordsim_core::sim::Timestamp;
use chordsim_core::Did;
use chordsim_core::Membership;
use chordsim_core::Network;
use chordsim_core::NetworkBuilder;
use rand::distributions::Alphanumeric;
use rand::seq::index;
use rand::seq::SliceRandom;
use rand::Rng;
use rand::SeedableRng;
use rand_hc::Hc128Rng;
use serde::Serialize;

use crate::config::SimulationConfig;
use crate::error::Error;
use crate::error::Result;

/// Nodes of a leave batch depart one after another, this far apart.
pub const LEAVE_SPACING_MS: u64 = 1000;
/// Draws of payloads per requested key before giving up on distinct keys.
const MAX_DRAWS_PER_KEY: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    InsertNode,
    GenerateData,
    LookupBatch,
    LeaveBatch,
    Leave(Did),
    JoinBatch,
    CrashDraw,
    Recover(Did),
}

/// What the policies did so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DriverStats {
    pub inserted: usize,
    pub keys: usize,
    pub lookups: usize,
    pub leaves: usize,
    pub joins: usize,
    pub crashes: usize,
    pub recoveries: usize,
}

pub struct ChurnDriver {
    config: SimulationConfig,
    network: Network,
    agenda: EventQueue<Action>,
    rng: Hc128Rng,
    keys: Vec<Did>,
    stats: DriverStats,
    started: bool,
}

impl ChurnDriver {
    pub fn new(config: SimulationConfig) -> Result<Self> {
        let network = NetworkBuilder::new(config.chord.clone())
            .seed(config.seed)
            .build()?;
        Ok(Self::with_network(config, network))
    }

    /// Same as [ChurnDriver::new], reporting every node event to `callback`.
    pub fn with_callback(config: SimulationConfig, callback: SharedNetworkCallback) -> Result<Self> {
        let network = NetworkBuilder::new(config.chord.clone())
            .seed(config.seed)
            .callback(callback)
            .build()?;
        Ok(Self::with_network(config, network))
    }

    fn with_network(config: SimulationConfig, network: Network) -> Self {
        let rng = Hc128Rng::seed_from_u64(config.seed.wrapping_add(2));
        Self {
            config,
            network,
            agenda: EventQueue::default(),
            rng,
            keys: vec![],
            stats: DriverStats::default(),
            started: false,
        }
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn stats(&self) -> DriverStats {
        self.stats
    }

    /// Keys of the generated payloads.
    pub fn keys(&self) -> &[Did] {
        &self.keys
    }

    /// Run until the configured end time.
    pub fn run(&mut self) -> Result<LookupSummary> {
        let end = Timestamp::from_millis(self.config.end_time_ms);
        self.run_until(end)?;
        let summary = self.network.lookups().summary();
        tracing::info!(
            "run ended at {}: {:?}, lookups {:?}",
            self.network.now(),
            self.stats,
            summary
        );
        Ok(summary)
    }

    /// Fire every action and deliver every message due at or before `until`.
    pub fn run_until(&mut self, until: Timestamp) -> Result<()> {
        if !self.started {
            self.start()?;
        }
        while let Some(at) = self.agenda.peek_time() {
            if at > until {
                break;
            }
            self.network.run_until(at)?;
            if let Some((_, action)) = self.agenda.pop() {
                self.apply(action)?;
            }
        }
        self.network.run_until(until)?;
        Ok(())
    }

    fn at(ms: u64) -> Timestamp {
        Timestamp::from_millis(ms)
    }

    fn after(&self, ms: u64) -> Timestamp {
        self.network.now() + Duration::from_millis(ms)
    }

    fn start(&mut self) -> Result<()> {
        self.started = true;
        let init = self.config.init.clone();
        let period = self.config.chord.stabilize_offset_ms + self.config.chord.stabilize_amplitude_ms;

        let settled = if init.one_at_time_init {
            self.agenda.schedule_at(Timestamp::ZERO, Action::InsertNode);
            init.init_num_nodes as u64 * init.insertion_delay_ms + period
        } else {
            self.preload(init.init_num_nodes)?;
            period
        };

        self.agenda.schedule_at(Self::at(settled), Action::GenerateData);
        let lookups = &self.config.lookups;
        if lookups.lookup_interval_ms > 0 && lookups.number_lookup > 0 {
            let first = settled + lookups.lookup_interval_ms;
            self.agenda.schedule_at(Self::at(first), Action::LookupBatch);
        }
        let churn = &self.config.churn;
        if churn.leave_interval_ms > 0 {
            let first = settled + churn.leave_interval_ms + 1;
            self.agenda.schedule_at(Self::at(first), Action::LeaveBatch);
        }
        let crashes = &self.config.crashes;
        if crashes.crash_pr > 0.0 {
            let first = settled + crashes.crash_scheduling_interval_ms;
            self.agenda.schedule_at(Self::at(first), Action::CrashDraw);
        }
        tracing::info!(
            "ring of {} bits, {} initial nodes, settled at {}ms",
            self.config.chord.hash_bits,
            init.init_num_nodes,
            settled
        );
        Ok(())
    }

    fn apply(&mut self, action: Action) -> Result<()> {
        tracing::debug!("at {}: {:?}", self.network.now(), action);
        match action {
            Action::InsertNode => self.insert_node(),
            Action::GenerateData => self.generate_data(),
            Action::LookupBatch => self.lookup_batch(),
            Action::LeaveBatch => self.leave_batch(),
            Action::Leave(did) => self.leave(did),
            Action::JoinBatch => self.join_batch(),
            Action::CrashDraw => self.crash_draw(),
            Action::Recover(did) => self.recover(did),
        }
    }

    fn preload(&mut self, count: usize) -> Result<()> {
        let ring_size = self.config.ring_size() as usize;
        let ids: Vec<Did> = index::sample(&mut self.rng, ring_size, count)
            .into_iter()
            .map(|i| Did::from(i as u64))
            .collect();
        self.network.preload(&ids)?;
        self.stats.inserted = ids.len();
        Ok(())
    }

    /// An id the ring never saw, or one whose node is gone for good.
    fn is_free(&self, did: Did) -> bool {
        matches!(
            self.network.state_of(did),
            None | Some(NodeState::Unsubscribed) | Some(NodeState::Cleared)
        )
    }

    fn free_ids(&self) -> u64 {
        let taken = self
            .network
            .nodes()
            .filter(|n| !self.is_free(n.did()))
            .count() as u64;
        self.config.ring_size().saturating_sub(taken)
    }

    fn random_free_id(&mut self, exclude: &[Did]) -> Did {
        let ring_size = self.config.ring_size();
        loop {
            let did = Did::from(self.rng.gen_range(0..ring_size));
            if self.is_free(did) && !exclude.contains(&did) {
                return did;
            }
        }
    }

    fn insert_node(&mut self) -> Result<()> {
        let did = self.random_free_id(&[]);
        let active = self.network.active_nodes();
        match active.choose(&mut self.rng).copied() {
            None => self.network.create(did)?,
            Some(seed) => self.network.join(did, seed)?,
        }
        self.stats.inserted += 1;

        if self.stats.inserted < self.config.init.init_num_nodes {
            let next = self.after(self.config.init.insertion_delay_ms);
            self.agenda.schedule_at(next, Action::InsertNode);
        }
        Ok(())
    }

    /// Random payloads, each stored at the owner of the hash of its prefix. Keys are distinct.
    fn generate_data(&mut self) -> Result<()> {
        let data = self.config.data.clone();
        if data.total_number_data == 0 {
            return Ok(());
        }
        if self.network.active_nodes().is_empty() {
            return Err(Error::NoActiveNode("store data"));
        }

        let mut draws = 0;
        while self.keys.len() < data.total_number_data {
            if draws == data.total_number_data * MAX_DRAWS_PER_KEY {
                tracing::warn!(
                    "only {} distinct keys out of {} after {} payloads",
                    self.keys.len(),
                    data.total_number_data,
                    draws
                );
                break;
            }
            draws += 1;
            let payload: String = (&mut self.rng)
                .sample_iter(&Alphanumeric)
                .take(data.data_size)
                .map(char::from)
                .collect();
            let prefix: String = payload.chars().take(data.key_size).collect();
            let key = self.network.space().hash(&prefix);
            if self.keys.contains(&key) {
                continue;
            }
            let owner = self.network.storage_store(key, payload)?;
            tracing::debug!("key {} stored at {}", key, owner);
            self.keys.push(key);
        }
        self.stats.keys = self.keys.len();
        tracing::info!("{} keys stored", self.keys.len());
        Ok(())
    }

    fn lookup_batch(&mut self) -> Result<()> {
        let next = self.after(self.config.lookups.lookup_interval_ms);
        self.agenda.schedule_at(next, Action::LookupBatch);

        if self.keys.is_empty() {
            return Ok(());
        }
        let active = self.network.active_nodes();
        let requesters: Vec<Did> = active
            .choose_multiple(&mut self.rng, self.config.lookups.number_lookup)
            .copied()
            .collect();

        let single = self.config.lookups.one_key_lookup;
        let shared = self.keys.choose(&mut self.rng).copied();
        for requester in requesters {
            let key = if single {
                shared
            } else {
                self.keys.choose(&mut self.rng).copied()
            };
            let Some(key) = key else {
                continue;
            };
            self.network.lookup(requester, key)?;
            self.stats.lookups += 1;
        }
        Ok(())
    }

    fn leave_batch(&mut self) -> Result<()> {
        let churn = self.config.churn.clone();
        let next = self.after(churn.leave_interval_ms);
        self.agenda.schedule_at(next, Action::LeaveBatch);

        let active = self.network.active_nodes();
        let wanted = churn.min_number_leaving + self.rng.gen_range(0..=churn.leaving_amplitude);
        let count = wanted.min(active.len().saturating_sub(1));
        let leaving: Vec<Did> = active
            .choose_multiple(&mut self.rng, count)
            .copied()
            .collect();

        for (i, did) in leaving.iter().enumerate() {
            let at = self.after(i as u64 * LEAVE_SPACING_MS);
            self.agenda.schedule_at(at, Action::Leave(*did));
        }
        let joins = self.after(leaving.len() as u64 * LEAVE_SPACING_MS + churn.join_interval_ms);
        self.agenda.schedule_at(joins, Action::JoinBatch);
        tracing::debug!("{} nodes scheduled to leave: {:?}", leaving.len(), leaving);
        Ok(())
    }

    fn leave(&mut self, did: Did) -> Result<()> {
        let active = self.network.active_nodes();
        // at least one active node stays
        if !active.contains(&did) || active.len() < 2 {
            tracing::debug!("node {} does not leave anymore", did);
            return Ok(());
        }
        self.network.leave(did)?;
        self.stats.leaves += 1;
        Ok(())
    }

    fn join_batch(&mut self) -> Result<()> {
        let churn = &self.config.churn;
        let wanted = churn.min_number_joins + self.rng.gen_range(0..=churn.join_amplitude);
        let count = (wanted as u64).min(self.free_ids()) as usize;

        let mut joined: Vec<Did> = Vec::with_capacity(count);
        for _ in 0..count {
            let did = self.random_free_id(&joined);
            let seeds = self.network.active_nodes();
            let Some(seed) = seeds.choose(&mut self.rng).copied() else {
                tracing::warn!("no active seed for node {}", did);
                break;
            };
            self.network.join(did, seed)?;
            joined.push(did);
            self.stats.joins += 1;
        }
        tracing::debug!("{} nodes joining: {:?}", joined.len(), joined);
        Ok(())
    }

    fn crash_draw(&mut self) -> Result<()> {
        let crashes = self.config.crashes.clone();
        let next = self.after(crashes.crash_scheduling_interval_ms);
        self.agenda.schedule_at(next, Action::CrashDraw);

        let active = self.network.active_nodes();
        let mut remaining = active.len();
        for did in active {
            if remaining < 2 {
                break;
            }
            if self.rng.gen_bool(crashes.crash_pr) {
                self.network.crash(did)?;
                remaining -= 1;
                self.stats.crashes += 1;
                let at = self.after(crashes.recovery_interval_ms);
                self.agenda.schedule_at(at, Action::Recover(did));
            }
        }
        Ok(())
    }

    fn recover(&mut self, did: Did) -> Result<()> {
        if self.network.state_of(did) != Some(NodeState::Crashed) {
            return Ok(());
        }
        self.network.recover(did)?;
        self.stats.recoveries += 1;
        Ok(())
    }
}
