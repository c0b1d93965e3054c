use crate::dht::belongs_to_interval;
use crate::dht::Chord;
use crate::dht::CorrectChord;
use crate::dht::Did;
use crate::dht::Notified;
use crate::dht::SuccessorReader;
use crate::error::Error;
use crate::error::Result;
use crate::message::types::Message;
use crate::message::types::NewData;
use crate::message::types::NotifiedPredecessor;
use crate::message::types::PredecessorTimeout;
use crate::message::types::ProcessStabResponse;
use crate::message::types::ResetPredecessor;
use crate::message::types::SetNewSuccessor;
use crate::message::types::Stabilize;
use crate::message::types::StabilizationStep;
use crate::message::HandleMsg;
use crate::message::MessageContext;
use crate::network::callback::NodeEvent;
use crate::network::Network;
use crate::node::NodeState;
use crate::storage::KvStorageInterface;

impl Network {
    /// Repair one successor slot or one finger, alternately, then check the predecessor.
    pub(crate) fn fix_data_structures(&mut self, did: Did) -> Result<()> {
        let node = self.node_mut(did)?;
        let act = if node.ring.stabilization_phase {
            node.ring.fix_fingers()
        } else {
            node.ring.fix_successors()
        };
        node.ring.stabilization_phase = !node.ring.stabilization_phase;
        self.handle_dht_events(did, act)?;
        self.check_predecessor(did)
    }

    /// A predecessor that does not answer is forgotten once the timeout elapsed.
    pub(crate) fn check_predecessor(&mut self, did: Did) -> Result<()> {
        let Some(predecessor) = self.node(did)?.ring.predecessor else {
            return Ok(());
        };
        if !self.is_reachable(predecessor) {
            let delay = self.timeout();
            self.send_local(
                did,
                delay,
                Message::PredecessorTimeout(PredecessorTimeout {
                    suspect: predecessor,
                }),
            )?;
        }
        Ok(())
    }

    /// Make `did` alone on its ring, keeping its predecessor.
    fn fall_back_to_singleton(&mut self, did: Did) -> Result<()> {
        self.node_mut(did)?.ring.reset_to_singleton();
        self.emit(did, NodeEvent::SingletonReset);
        Ok(())
    }
}

impl HandleMsg<Stabilize> for Network {
    fn handle(&mut self, ctx: &MessageContext, msg: Stabilize) -> Result<()> {
        let did = ctx.did;
        let node = self.node(did)?;
        let state = node.state();
        let predecessor = node.ring.predecessor;

        match node.ring.successors.get(msg.retry) {
            // a joining node whose every successor vanished starts over
            None if state == NodeState::Joining && msg.retry > 0 => self.fail_join(did),
            None => {
                // a joining node has no successor yet, it just waits for the next round
                if state == NodeState::Active {
                    tracing::warn!("node {}: every successor is unreachable", did);
                    self.fall_back_to_singleton(did)?;
                }
                self.schedule_stabilization(did)
            }
            Some(successor) if successor == did => self.handle(ctx, StabilizationStep {
                answering: did,
                predecessor,
            }),
            Some(successor) => {
                if let Some(peer) = self.nodes.get(&successor).filter(|n| n.is_active()) {
                    let step = StabilizationStep {
                        answering: successor,
                        predecessor: peer.ring.predecessor,
                    };
                    let delay = self.round_trip();
                    self.send_local(did, delay, Message::StabilizationStep(step))
                } else {
                    self.emit(did, NodeEvent::StabilizationTimeout { successor });
                    let delay = self.timeout();
                    self.send_local(
                        did,
                        delay,
                        Message::Stabilize(Stabilize {
                            retry: msg.retry + 1,
                        }),
                    )
                }
            }
        }
    }
}

impl HandleMsg<StabilizationStep> for Network {
    fn handle(&mut self, ctx: &MessageContext, msg: StabilizationStep) -> Result<()> {
        let did = ctx.did;
        if msg.answering != did && !self.is_member(msg.answering) {
            self.emit(did, NodeEvent::StaleReference {
                peer: msg.answering,
            });
            return self.schedule_stabilization(did);
        }
        let predecessor = msg
            .predecessor
            .filter(|p| *p == did || self.is_member(*p));

        let node = self.node_mut(did)?;
        let changed = node.ring.stabilize_with(msg.answering, predecessor);
        let successor = node.ring.successors.min();
        if changed {
            self.emit(did, NodeEvent::SuccessorChanged { successor });
        }

        if successor == did {
            self.fix_data_structures(did)?;
            return self.schedule_stabilization(did);
        }

        let peer_successors = match self.nodes.get(&successor) {
            Some(peer) if peer.is_active() => Some(peer.ring.successors.list()),
            _ => None,
        };
        match peer_successors {
            Some(successors) => {
                let req = self.one_way();
                let resp = self.one_way();
                self.send_remote(
                    successor,
                    req,
                    Message::NotifiedPredecessor(NotifiedPredecessor { candidate: did }),
                );
                self.send_local(
                    did,
                    req + resp,
                    Message::ProcessStabResponse(ProcessStabResponse {
                        responder: successor,
                        successors,
                    }),
                )?;
                self.schedule_stabilization(did)
            }
            None => {
                self.emit(did, NodeEvent::StabilizationTimeout { successor });
                if msg.answering != successor && msg.answering != did {
                    let delay = self.one_way();
                    self.send_remote(
                        msg.answering,
                        delay,
                        Message::ResetPredecessor(ResetPredecessor {
                            if_equal: Some(successor),
                        }),
                    );
                }
                let delay = self.timeout();
                self.send_local(did, delay, Message::Stabilize(Stabilize { retry: 1 }))
            }
        }
    }
}

impl HandleMsg<ProcessStabResponse> for Network {
    fn handle(&mut self, ctx: &MessageContext, msg: ProcessStabResponse) -> Result<()> {
        let did = ctx.did;
        if msg.responder == did {
            tracing::error!("node {} got a stabilization response from itself", did);
            return Err(Error::InvariantViolation(format!(
                "node {} answered its own stabilization request",
                did
            )));
        }
        if self.is_member(msg.responder) {
            let (kept, departed): (Vec<Did>, Vec<Did>) = msg
                .successors
                .iter()
                .partition(|s| **s == did || self.is_member(**s));
            for peer in departed {
                self.emit(did, NodeEvent::StaleReference { peer });
            }
            let node = self.node_mut(did)?;
            let first = node.ring.successors.min();
            node.ring.update_successors(msg.responder, &kept);
            let new_first = node.ring.successors.min();
            if first != new_first {
                self.emit(did, NodeEvent::SuccessorChanged {
                    successor: new_first,
                });
            }
        } else {
            self.emit(did, NodeEvent::StaleReference {
                peer: msg.responder,
            });
        }
        self.fix_data_structures(did)
    }
}

impl HandleMsg<PredecessorTimeout> for Network {
    fn handle(&mut self, ctx: &MessageContext, msg: PredecessorTimeout) -> Result<()> {
        let node = self.node_mut(ctx.did)?;
        if node.ring.predecessor == Some(msg.suspect) {
            node.ring.predecessor = None;
            self.emit(ctx.did, NodeEvent::PredecessorChanged { predecessor: None });
        }
        Ok(())
    }
}

impl HandleMsg<NotifiedPredecessor> for Network {
    fn handle(&mut self, ctx: &MessageContext, msg: NotifiedPredecessor) -> Result<()> {
        let did = ctx.did;
        let candidate = msg.candidate;
        if !self.is_member(candidate) {
            self.emit(did, NodeEvent::StaleReference { peer: candidate });
            return Ok(());
        }

        let node = self.node_mut(did)?;
        let previous = match node.ring.notify(candidate) {
            Notified::Accepted { previous } => previous,
            // a joining node this one already took as predecessor
            Notified::Rejected { current } if current == candidate => Some(candidate),
            Notified::Rejected { .. } => return Ok(()),
        };
        // push the keys the new predecessor owns now
        let data = node
            .storage
            .take_where(&|k| belongs_to_interval(*k, did, candidate));
        if previous != Some(candidate) {
            self.emit(did, NodeEvent::PredecessorChanged {
                predecessor: Some(candidate),
            });
        }
        self.admit(candidate)?;

        if !data.is_empty() {
            self.emit(did, NodeEvent::KeysTransferred {
                to: candidate,
                count: data.len(),
            });
            let delay = self.one_way();
            self.send_remote(candidate, delay, Message::NewData(NewData { data }));
        }
        if let Some(previous) = previous.filter(|p| *p != candidate) {
            let delay = self.one_way();
            self.send_remote(
                previous,
                delay,
                Message::SetNewSuccessor(SetNewSuccessor {
                    successor: candidate,
                }),
            );
        }
        Ok(())
    }
}

impl HandleMsg<SetNewSuccessor> for Network {
    fn handle(&mut self, ctx: &MessageContext, msg: SetNewSuccessor) -> Result<()> {
        let did = ctx.did;
        let successor = msg.successor;
        if successor == did {
            return Ok(());
        }
        if !self.is_member(successor) {
            self.emit(did, NodeEvent::StaleReference { peer: successor });
            return Ok(());
        }
        let current = self.node(did)?.ring.successors.min();
        // only a closer successor, or one replacing a departed successor, is adopted
        if current != did
            && self.is_member(current)
            && !belongs_to_interval(successor, did, current)
        {
            return Ok(());
        }
        let node = self.node_mut(did)?;
        if node.ring.stabilize_with(successor, None) {
            self.emit(did, NodeEvent::SuccessorChanged { successor });
        }
        Ok(())
    }
}

impl HandleMsg<ResetPredecessor> for Network {
    fn handle(&mut self, ctx: &MessageContext, msg: ResetPredecessor) -> Result<()> {
        let node = self.node_mut(ctx.did)?;
        let matches = match msg.if_equal {
            Some(expected) => node.ring.predecessor == Some(expected),
            None => node.ring.predecessor.is_some(),
        };
        if matches {
            node.ring.predecessor = None;
            self.emit(ctx.did, NodeEvent::PredecessorChanged { predecessor: None });
        }
        Ok(())
    }
}
