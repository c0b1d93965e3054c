#![warn(missing_docs)]
//! Lifecycle operations a membership driver calls on a [Network].

use std::time::Duration;

use crate::dht::Did;
use crate::dht::SuccessorReader;
use crate::dht::SuccessorWriter;
use crate::error::Error;
use crate::error::Result;
use crate::inspect::NodeInspect;
use crate::lookup::LookupId;
use crate::message::types::ClearAll;
use crate::message::types::Message;
use crate::message::types::NewData;
use crate::message::types::QueryPurpose;
use crate::message::types::ResetPredecessor;
use crate::message::types::SetLastSuccessor;
use crate::message::types::SetPredecessor;
use crate::message::types::SuccessorQuery;
use crate::network::callback::NodeEvent;
use crate::network::Network;
use crate::node::NodeState;
use crate::node::Transition;
use crate::storage::KvStorageInterface;

/// Interface of a membership driver: "make this node join, leave, crash, look up now".
pub trait Membership {
    /// Bootstrap a new ring made of `did` alone.
    fn create(&mut self, did: Did) -> Result<()>;

    /// Make `did` join the ring `seed` belongs to.
    fn join(&mut self, did: Did, seed: Did) -> Result<()>;

    /// Leave gracefully, handing keys and neighbours over.
    fn leave(&mut self, did: Did) -> Result<()>;

    /// Stop answering, keeping every table and key.
    fn crash(&mut self, did: Did) -> Result<()>;

    /// Answer again after a crash.
    fn recover(&mut self, did: Did) -> Result<()>;

    /// Issue a lookup of `key` from `did`. The outcome lands in the lookup tracker.
    fn lookup(&mut self, did: Did, key: Did) -> Result<LookupId>;

    /// True if `did` answers requests.
    fn is_active(&self, did: Did) -> bool;

    /// True if `did` went through initialization and was not cleared since.
    fn is_initialized(&self, did: Did) -> bool;

    /// Routing tables and keys of `did`.
    fn snapshot(&self, did: Did) -> Result<NodeInspect>;
}

impl Membership for Network {
    fn create(&mut self, did: Did) -> Result<()> {
        let node = self.ensure_node(did)?;
        let did = node.did();
        let from = node.transition(Transition::Create)?;
        node.ring.clear();
        node.ring.reset_to_singleton();
        self.emit(did, NodeEvent::StateChanged {
            from,
            to: NodeState::Active,
        });
        self.schedule_stabilization(did)
    }

    fn join(&mut self, did: Did, seed: Did) -> Result<()> {
        if seed == did || !self.is_reachable(seed) {
            return Err(Error::InvalidSeed(seed));
        }
        let node = self.ensure_node(did)?;
        let did = node.did();
        let from = node.transition(Transition::Join)?;
        node.ring.clear();
        self.emit(did, NodeEvent::StateChanged {
            from,
            to: NodeState::Joining,
        });

        let query = SuccessorQuery::new(did, did, QueryPurpose::Init);
        self.find_successor_step(query, seed)?;
        self.schedule_stabilization(did)
    }

    fn leave(&mut self, did: Did) -> Result<()> {
        let node = self.node_mut(did)?;
        let from = node.transition(Transition::Leave)?;
        let successor = node.ring.successors.min();
        let tail = node.ring.successors.max();
        let predecessor = node.ring.predecessor.filter(|p| *p != did);
        let data = node.storage.get_all();
        node.storage.clear();
        self.emit(did, NodeEvent::StateChanged {
            from,
            to: NodeState::Leaving,
        });

        if successor != did {
            let handoff = match predecessor {
                Some(p) if p != successor => {
                    Message::SetPredecessor(SetPredecessor { predecessor: p })
                }
                _ => Message::ResetPredecessor(ResetPredecessor {
                    if_equal: Some(did),
                }),
            };
            let delay = self.one_way();
            self.send_remote(successor, delay, handoff);
            if !data.is_empty() {
                self.emit(did, NodeEvent::KeysTransferred {
                    to: successor,
                    count: data.len(),
                });
                let delay = self.one_way();
                self.send_remote(successor, delay, Message::NewData(NewData { data }));
            }
        } else if !data.is_empty() {
            tracing::warn!("node {} left alone, {} keys are lost", did, data.len());
        }

        if let Some(p) = predecessor {
            let delay = self.one_way();
            self.send_remote(
                p,
                delay,
                Message::SetLastSuccessor(SetLastSuccessor {
                    departed: did,
                    tail: Some(tail).filter(|t| *t != did),
                }),
            );
        }

        // handoffs sent to this node until its predecessor drops it still get relayed
        let delay = self.timeout() * 2 + Duration::from_millis(1);
        self.send_local(did, delay, Message::ClearAll(ClearAll))
    }

    fn crash(&mut self, did: Did) -> Result<()> {
        let from = self.node_mut(did)?.transition(Transition::Crash)?;
        self.emit(did, NodeEvent::StateChanged {
            from,
            to: NodeState::Crashed,
        });
        Ok(())
    }

    fn recover(&mut self, did: Did) -> Result<()> {
        let from = self.node_mut(did)?.transition(Transition::Recover)?;
        self.emit(did, NodeEvent::StateChanged {
            from,
            to: NodeState::Active,
        });
        self.schedule_stabilization(did)
    }

    fn lookup(&mut self, did: Did, key: Did) -> Result<LookupId> {
        let state = self.node(did)?.state();
        if state != NodeState::Active {
            return Err(Error::InvalidTransition {
                did,
                op: "lookup",
                state,
            });
        }
        self.start_lookup(did, key)
    }

    fn is_active(&self, did: Did) -> bool {
        self.is_reachable(did)
    }

    fn is_initialized(&self, did: Did) -> bool {
        self.nodes
            .get(&did)
            .map(|n| n.is_initialized())
            .unwrap_or(false)
    }

    fn snapshot(&self, did: Did) -> Result<NodeInspect> {
        self.node(did).map(NodeInspect::inspect)
    }
}

impl Network {
    /// Activate every node of `ids` at once, each one already knowing its correct successor.
    pub fn preload(&mut self, ids: &[Did]) -> Result<()> {
        let mut ids = ids
            .iter()
            .map(|did| self.space.did(did.value()))
            .collect::<Result<Vec<Did>>>()?;
        ids.sort();
        if let Some(w) = ids.windows(2).find(|w| w[0] == w[1]) {
            return Err(Error::NodeAlreadyExists(w[0]));
        }

        for (i, did) in ids.iter().enumerate() {
            let next = ids[(i + 1) % ids.len()];
            let node = self.ensure_node(*did)?;
            let from = node.transition(Transition::Create)?;
            node.ring.clear();
            if next == *did {
                node.ring.reset_to_singleton();
            } else {
                node.ring.successors.push_back(next);
                node.ring.mirror_successor();
            }
            self.emit(*did, NodeEvent::StateChanged {
                from,
                to: NodeState::Active,
            });
            self.schedule_stabilization(*did)?;
        }
        Ok(())
    }
}
