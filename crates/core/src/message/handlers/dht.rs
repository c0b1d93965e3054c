use crate::dht::belongs_to_interval;
use crate::dht::Chord;
use crate::dht::Did;
use crate::dht::PeerRingAction;
use crate::dht::SuccessorReader;
use crate::error::Error;
use crate::error::Result;
use crate::lookup::LookupId;
use crate::lookup::OwnerObservation;
use crate::lookup::Resolution;
use crate::message::types::CompleteLookup;
use crate::message::types::FindSuccessorStep;
use crate::message::types::Message;
use crate::message::types::NotifiedPredecessor;
use crate::message::types::ProcessSuccResponse;
use crate::message::types::QueryPurpose;
use crate::message::types::SuccessorAnswer;
use crate::message::types::SuccessorQuery;
use crate::message::HandleMsg;
use crate::message::MessageContext;
use crate::network::callback::NodeEvent;
use crate::network::Network;
use crate::node::NodeState;
use crate::node::Transition;

impl Network {
    /// Start resolving the successor of `key` on behalf of `origin`.
    /// The answer is applied according to `purpose` once the query completes.
    pub(crate) fn find_successor(
        &mut self,
        origin: Did,
        key: Did,
        purpose: QueryPurpose,
    ) -> Result<()> {
        let act = self.node(origin)?.ring.find_successor(key);
        match act {
            PeerRingAction::Some(owner) if owner == origin => {
                self.set_result(origin, key, purpose, Resolution {
                    owner,
                    hops: 1,
                    timeouts: 0,
                    contacts: 1,
                })
            }
            // the owner itself confirms, a departed one times out
            PeerRingAction::Some(next) | PeerRingAction::RemoteAction(next, _) => {
                let query = SuccessorQuery::new(origin, key, purpose);
                self.find_successor_step(query, next)
            }
            // a node without successors knows nobody to ask
            PeerRingAction::None => {
                self.set_result(origin, key, purpose, Resolution::failed(origin, 0))
            }
        }
    }

    /// Ask `target` about `query.key`. Its answer is computed now and reaches the origin
    /// after a round trip, or nothing reaches it before the timeout.
    pub(crate) fn find_successor_step(&mut self, query: SuccessorQuery, target: Did) -> Result<()> {
        if query.contacts > self.config.max_lookup_contacts as i32 {
            tracing::warn!(
                "query of node {} for {} gave up after {} contacts",
                query.origin,
                query.key,
                query.contacts
            );
            let failed = Resolution::failed(query.origin, query.timeouts);
            return self.set_result(query.origin, query.key, query.purpose, failed);
        }

        let asker = query.path.last().copied().unwrap_or(query.origin);
        let answer = self.process_succ_request(target, query.key, asker);
        let delay = match answer {
            Some(_) => self.round_trip(),
            None => self.timeout(),
        };
        let origin = query.origin;
        self.send_local(
            origin,
            delay,
            Message::ProcessSuccResponse(ProcessSuccResponse {
                query,
                source: target,
                answer,
            }),
        )
    }

    /// What `did` answers when `asker` routed a query for `key` to it.
    /// Only the owner of a key answers with itself, any other node names the next node to ask.
    /// Nodes that are not active never answer.
    pub(crate) fn process_succ_request(
        &self,
        did: Did,
        key: Did,
        asker: Did,
    ) -> Option<SuccessorAnswer> {
        let node = self.nodes.get(&did)?;
        if !node.state().is_reachable() {
            return None;
        }
        let ring = &node.ring;
        if ring.is_responsible(key, asker) {
            return Some(SuccessorAnswer {
                next: did,
                owner: true,
            });
        }
        // the asker missed a node joined right before this one
        if let Some(p) = ring.predecessor.filter(|p| *p != did && *p != asker) {
            if asker != did
                && belongs_to_interval(p, asker, did)
                && belongs_to_interval(key, asker, p)
            {
                return Some(SuccessorAnswer {
                    next: p,
                    owner: false,
                });
            }
        }
        match ring.find_successor(key) {
            PeerRingAction::Some(next) | PeerRingAction::RemoteAction(next, _) => {
                Some(SuccessorAnswer { next, owner: false })
            }
            PeerRingAction::None => None,
        }
    }

    /// Ask `did` to forget `dead` and to propose another hop towards `key`.
    /// None if `did` is not active or knows no peer anymore.
    pub(crate) fn get_prev_successor(&mut self, did: Did, dead: Did, key: Did) -> Option<Did> {
        if !self.is_reachable(did) {
            return None;
        }
        let node = self.nodes.get_mut(&did)?;
        let first = node.ring.successors.min();
        let pruned = node.ring.remove(dead);
        let knows_peers = node.ring.knows_peers();
        let next = node.ring.closest_preceding_node(key);
        let new_first = node.ring.successors.min();
        let singleton = node.ring.successors.is_singleton();

        if pruned {
            self.emit(did, NodeEvent::PeerPruned { peer: dead });
        }
        if first != new_first {
            if singleton {
                self.emit(did, NodeEvent::SingletonReset);
            } else {
                self.emit(did, NodeEvent::SuccessorChanged {
                    successor: new_first,
                });
            }
        }
        knows_peers.then_some(next)
    }

    /// Apply the answer of a completed query.
    pub(crate) fn set_result(
        &mut self,
        origin: Did,
        key: Did,
        purpose: QueryPurpose,
        resolution: Resolution,
    ) -> Result<()> {
        tracing::debug!(
            "node {} resolved {} for {:?}: {:?}",
            origin,
            key,
            purpose,
            resolution
        );
        match purpose {
            QueryPurpose::Init => self.complete_join(origin, resolution),
            QueryPurpose::Lookup(lookup) => {
                let delay = self.one_way();
                self.send_remote(
                    origin,
                    delay,
                    Message::CompleteLookup(CompleteLookup { lookup, resolution }),
                );
                Ok(())
            }
            QueryPurpose::Finger(_) | QueryPurpose::Successor(_) if resolution.is_failure() => {
                let node = self.node_mut(origin)?;
                if node.state() == NodeState::Joining {
                    return self.fail_join(origin);
                }
                node.ring.reset_to_singleton();
                self.emit(origin, NodeEvent::SingletonReset);
                Ok(())
            }
            QueryPurpose::Finger(index) => {
                let owner = resolution.owner;
                if owner != origin && !self.is_member(owner) {
                    self.emit(origin, NodeEvent::StaleReference { peer: owner });
                    return Ok(());
                }
                let node = self.node_mut(origin)?;
                if node.ring.apply_finger(index, owner) {
                    let finger = node.ring.finger[index];
                    let first = node.ring.successors.min();
                    self.emit(origin, NodeEvent::FingerUpdated { index, finger });
                    if index == 1 {
                        self.emit(origin, NodeEvent::SuccessorChanged { successor: first });
                    }
                }
                Ok(())
            }
            QueryPurpose::Successor(position) => {
                let owner = resolution.owner;
                if owner != origin && !self.is_member(owner) {
                    self.emit(origin, NodeEvent::StaleReference { peer: owner });
                    return Ok(());
                }
                let node = self.node_mut(origin)?;
                let first = node.ring.successors.min();
                node.ring.apply_successor(position, owner);
                let new_first = node.ring.successors.min();
                if first != new_first {
                    self.emit(origin, NodeEvent::SuccessorChanged {
                        successor: new_first,
                    });
                }
                Ok(())
            }
        }
    }

    /// The first successor of a joining node is known, or could not be.
    fn complete_join(&mut self, did: Did, resolution: Resolution) -> Result<()> {
        let owner = resolution.owner;
        if resolution.is_failure() || owner == did || !self.is_member(owner) {
            return self.fail_join(did);
        }
        self.node_mut(did)?.ring.apply_finger(1, owner);
        self.emit(did, NodeEvent::SuccessorChanged { successor: owner });
        // the node turns active once its successor takes it as predecessor
        let delay = self.one_way();
        self.send_remote(
            owner,
            delay,
            Message::NotifiedPredecessor(NotifiedPredecessor { candidate: did }),
        );
        Ok(())
    }

    /// Give up joining: back to unsubscribed, every table cleared.
    pub(crate) fn fail_join(&mut self, did: Did) -> Result<()> {
        let node = self.node_mut(did)?;
        let from = node.transition(Transition::JoinFailed)?;
        node.ring.clear();
        self.emit(did, NodeEvent::JoinFailed);
        self.emit(did, NodeEvent::StateChanged {
            from,
            to: NodeState::Unsubscribed,
        });
        Ok(())
    }

    /// A joining node accepted as predecessor by its successor is a ring member from now on.
    pub(crate) fn admit(&mut self, did: Did) -> Result<()> {
        let node = self.node_mut(did)?;
        if node.state() != NodeState::Joining {
            return Ok(());
        }
        let from = node.transition(Transition::JoinCompleted)?;
        self.emit(did, NodeEvent::StateChanged {
            from,
            to: NodeState::Active,
        });
        Ok(())
    }

    /// Issue a tracked lookup of `key` from `did`.
    pub(crate) fn start_lookup(&mut self, did: Did, key: Did) -> Result<LookupId> {
        let key = self.space.did(key.value())?;
        let expected = self.first_not_crashed(key);
        let id = self.lookups.start(key, did, self.now(), expected);
        if key == did {
            let delay = self.one_way();
            self.send_remote(
                did,
                delay,
                Message::CompleteLookup(CompleteLookup {
                    lookup: id,
                    resolution: Resolution {
                        owner: did,
                        hops: 0,
                        timeouts: 0,
                        contacts: 0,
                    },
                }),
            );
        } else {
            self.find_successor(did, key, QueryPurpose::Lookup(id))?;
        }
        Ok(id)
    }
}

impl HandleMsg<FindSuccessorStep> for Network {
    fn handle(&mut self, _ctx: &MessageContext, msg: FindSuccessorStep) -> Result<()> {
        self.find_successor_step(msg.query, msg.target)
    }
}

impl HandleMsg<ProcessSuccResponse> for Network {
    fn handle(&mut self, ctx: &MessageContext, msg: ProcessSuccResponse) -> Result<()> {
        let ProcessSuccResponse {
            mut query,
            source,
            answer,
        } = msg;

        match answer {
            Some(SuccessorAnswer { next, owner: true }) => {
                let resolution = Resolution {
                    owner: next,
                    hops: query.hops + 1,
                    timeouts: query.timeouts,
                    contacts: query.contacts + 1,
                };
                self.set_result(ctx.did, query.key, query.purpose, resolution)
            }
            Some(SuccessorAnswer { next, owner: false }) => {
                query.path.push(source);
                query.hops += 1;
                query.contacts += 1;
                self.find_successor_step(query, next)
            }
            None => {
                query.timeouts += 1;
                let Some(last) = query.path.last().copied() else {
                    return Err(Error::InvariantViolation(format!(
                        "query of node {} has an empty path",
                        ctx.did
                    )));
                };
                match self.get_prev_successor(last, source, query.key) {
                    Some(next) => {
                        query.contacts += 2;
                        let delay = self.round_trip();
                        self.send_local(
                            ctx.did,
                            delay,
                            Message::FindSuccessorStep(FindSuccessorStep {
                                query,
                                target: next,
                            }),
                        )
                    }
                    None if query.path.len() <= 1 => {
                        let failed = Resolution::failed(ctx.did, query.timeouts);
                        self.set_result(ctx.did, query.key, query.purpose, failed)
                    }
                    None => {
                        // the previous hop is gone too, ask the one before it
                        query.path.pop();
                        query.hops -= 1;
                        query.contacts += 1;
                        let delay = self.timeout();
                        self.send_local(
                            ctx.did,
                            delay,
                            Message::ProcessSuccResponse(ProcessSuccResponse {
                                query,
                                source: last,
                                answer: None,
                            }),
                        )
                    }
                }
            }
        }
    }
}

impl HandleMsg<CompleteLookup> for Network {
    fn handle(&mut self, ctx: &MessageContext, msg: CompleteLookup) -> Result<()> {
        let resolution = msg.resolution;
        let key = self
            .lookups
            .get(msg.lookup)
            .ok_or(Error::LookupNotFound(msg.lookup))?
            .key;
        let observation = match self.nodes.get(&resolution.owner) {
            Some(owner) if !resolution.is_failure() => OwnerObservation {
                current_owner: self.first_not_crashed(key),
                key_present: owner.storage().contains_key(&key),
                owner_crashed: owner.state() == NodeState::Crashed,
            },
            _ => OwnerObservation::default(),
        };
        let succeeded = self
            .lookups
            .complete(msg.lookup, resolution, observation, ctx.now)?
            .succeeded();
        self.emit(ctx.did, NodeEvent::LookupCompleted {
            lookup: msg.lookup,
            succeeded,
        });
        Ok(())
    }
}
