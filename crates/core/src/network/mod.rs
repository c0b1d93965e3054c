#![warn(missing_docs)]
//! The arena of ring members and the event loop delivering their messages.
//!
//! Nodes never hold references to each other. Finger entries, successors and predecessors are
//! [Did]s resolved through the arena whenever they are used, so a departed peer resolves to its
//! current state instead of aliasing it.

mod builder;
/// Observability hook of the network.
pub mod callback;

use std::collections::BTreeMap;
use std::time::Duration;

pub use builder::NetworkBuilder;
use rand::Rng;
use rand_hc::Hc128Rng;

use crate::config::ChordConfig;
use crate::dht::Did;
use crate::dht::IdSpace;
use crate::dht::SuccessorReader;
use crate::error::Error;
use crate::error::Result;
use crate::lookup::LookupTracker;
use crate::message::types::Envelope;
use crate::message::types::Message;
use crate::message::types::Stabilize;
use crate::network::callback::NodeEvent;
use crate::network::callback::SharedNetworkCallback;
use crate::node::Node;
use crate::node::NodeState;
use crate::sim::DelayModel;
use crate::sim::EventQueue;
use crate::sim::Scheduler;
use crate::sim::Timestamp;

/// Every node of a simulated ring, the clock and the messages in flight.
pub struct Network {
    pub(crate) config: ChordConfig,
    pub(crate) space: IdSpace,
    pub(crate) nodes: BTreeMap<Did, Node>,
    pub(crate) queue: EventQueue<Envelope>,
    pub(crate) delay: Box<dyn DelayModel>,
    pub(crate) rng: Hc128Rng,
    pub(crate) lookups: LookupTracker,
    callback: SharedNetworkCallback,
    processed: u64,
}

impl std::fmt::Debug for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Network")
            .field("now", &self.queue.now())
            .field("nodes", &self.nodes.len())
            .field("pending", &self.queue.len())
            .field("processed", &self.processed)
            .finish()
    }
}

impl Network {
    /// Protocol parameters.
    pub fn config(&self) -> &ChordConfig {
        &self.config
    }

    /// Identifier space of the ring.
    pub fn space(&self) -> IdSpace {
        self.space
    }

    /// Current virtual time.
    pub fn now(&self) -> Timestamp {
        self.queue.now()
    }

    /// Messages in flight.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Messages delivered so far.
    pub fn processed(&self) -> u64 {
        self.processed
    }

    /// Tracker of every lookup issued.
    pub fn lookups(&self) -> &LookupTracker {
        &self.lookups
    }

    /// Node with id `did`.
    pub fn node(&self, did: Did) -> Result<&Node> {
        self.nodes.get(&did).ok_or(Error::NodeNotFound(did))
    }

    pub(crate) fn node_mut(&mut self, did: Did) -> Result<&mut Node> {
        self.nodes.get_mut(&did).ok_or(Error::NodeNotFound(did))
    }

    /// Every node ever created, in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Ids of the active nodes, in id order.
    pub fn active_nodes(&self) -> Vec<Did> {
        self.nodes
            .values()
            .filter(|n| n.is_active())
            .map(|n| n.did())
            .collect()
    }

    /// Current state of `did`, None if it was never created.
    pub fn state_of(&self, did: Did) -> Option<NodeState> {
        self.nodes.get(&did).map(|n| n.state())
    }

    pub(crate) fn is_reachable(&self, did: Did) -> bool {
        self.state_of(did).map(|s| s.is_reachable()).unwrap_or(false)
    }

    pub(crate) fn is_member(&self, did: Did) -> bool {
        self.state_of(did).map(|s| s.is_member()).unwrap_or(false)
    }

    /// Arena entry of `did`, created unsubscribed on first use.
    pub(crate) fn ensure_node(&mut self, did: Did) -> Result<&mut Node> {
        let did = self.space.did(did.value())?;
        let (space, size) = (self.space, self.config.successors_size);
        Ok(self
            .nodes
            .entry(did)
            .or_insert_with(|| Node::new(did, space, size)))
    }

    /// First active node at or after `key` walking clockwise, the owner of `key` on a
    /// quiescent ring.
    pub fn first_not_crashed(&self, key: Did) -> Option<Did> {
        self.nodes
            .range(key..)
            .chain(self.nodes.range(..key))
            .find(|(_, n)| n.is_active())
            .map(|(did, _)| *did)
    }

    /// Every key held by an active or crashed node, with its holder.
    pub fn stored_keys(&self) -> Vec<(Did, Did)> {
        self.nodes
            .values()
            .filter(|n| matches!(n.state(), NodeState::Active | NodeState::Crashed))
            .flat_map(|n| n.storage().keys().map(move |k| (*k, n.did())))
            .collect()
    }

    /// Walk first successors from the smallest active node. True when the walk visits every
    /// active node exactly once and comes back.
    pub fn ring_closure(&self) -> bool {
        let active = self.active_nodes();
        let Some(start) = active.first().copied() else {
            return true;
        };
        let mut visited = vec![start];
        let mut current = start;
        loop {
            let next = match self.nodes.get(&current) {
                Some(n) => n.ring().successors().min(),
                None => return false,
            };
            if next == start {
                break;
            }
            if visited.contains(&next) || !self.is_reachable(next) {
                return false;
            }
            visited.push(next);
            current = next;
        }
        visited.len() == active.len()
    }

    /// Compare every active node's successor list with the ground truth.
    /// Returns the number of wrong first successors and of expected successors missing.
    pub fn missing_wrong_successors(&self) -> (usize, usize) {
        let active = self.active_nodes();
        let r = self.config.successors_size;
        let mut wrong = 0;
        let mut missing = 0;
        for (i, did) in active.iter().enumerate() {
            let Some(node) = self.nodes.get(did) else {
                continue;
            };
            let expected: Vec<Did> = (1..active.len())
                .map(|k| active[(i + k) % active.len()])
                .take(r)
                .collect();
            let list = node.ring().successors();
            if let Some(first) = expected.first() {
                if list.get(0) != Some(*first) {
                    wrong += 1;
                }
            }
            missing += expected.iter().filter(|e| !list.contains(e)).count();
        }
        (wrong, missing)
    }

    /// One way delay of a packet.
    pub(crate) fn one_way(&mut self) -> Duration {
        self.delay.sample_delay()
    }

    /// Request plus response.
    pub(crate) fn round_trip(&mut self) -> Duration {
        self.delay.sample_delay() + self.delay.sample_delay()
    }

    /// Time waited before giving up on a peer.
    pub(crate) fn timeout(&self) -> Duration {
        self.delay.max_delay()
    }

    /// Schedule a continuation of `did` itself, bound to its current incarnation.
    pub(crate) fn send_local(&mut self, did: Did, delay: Duration, message: Message) -> Result<()> {
        let incarnation = self.node(did)?.incarnation();
        self.queue.schedule_after(delay, Envelope {
            target: did,
            incarnation: Some(incarnation),
            message,
        });
        Ok(())
    }

    /// Send a message to a peer, whatever becomes of it in flight.
    pub(crate) fn send_remote(&mut self, did: Did, delay: Duration, message: Message) {
        self.queue.schedule_after(delay, Envelope {
            target: did,
            incarnation: None,
            message,
        });
    }

    /// Schedule the next stabilization round after the jittered period.
    pub(crate) fn schedule_stabilization(&mut self, did: Did) -> Result<()> {
        let jitter = self.rng.gen_range(0..=self.config.stabilize_amplitude_ms);
        let delay = Duration::from_millis(self.config.stabilize_offset_ms + jitter);
        self.send_local(did, delay, Message::Stabilize(Stabilize { retry: 0 }))
    }

    pub(crate) fn emit(&self, did: Did, event: NodeEvent) {
        match &event {
            NodeEvent::StateChanged { .. } | NodeEvent::JoinFailed => {
                tracing::info!("node {} at {}: {:?}", did, self.now(), event)
            }
            NodeEvent::SingletonReset | NodeEvent::StaleReference { .. } => {
                tracing::warn!("node {} at {}: {:?}", did, self.now(), event)
            }
            _ => tracing::debug!("node {} at {}: {:?}", did, self.now(), event),
        }
        self.callback.on_event(did, &event);
    }

    /// Deliver the earliest message. Returns false when nothing is left.
    pub fn step(&mut self) -> Result<bool> {
        match self.queue.pop() {
            Some((_, envelope)) => {
                self.processed += 1;
                self.dispatch(envelope)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Deliver every message due at or before `until`, then move the clock to `until`.
    /// Returns the number of messages delivered.
    pub fn run_until(&mut self, until: Timestamp) -> Result<usize> {
        let mut count = 0;
        while let Some(t) = self.queue.peek_time() {
            if t > until {
                break;
            }
            self.step()?;
            count += 1;
        }
        self.queue.advance_to(until);
        Ok(count)
    }

    /// Run for `duration` of virtual time.
    pub fn run_for(&mut self, duration: Duration) -> Result<usize> {
        let until = self.now() + duration;
        self.run_until(until)
    }
}
