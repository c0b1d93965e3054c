#![warn(missing_docs)]
//! This module implemented message handlers of the simulated ring.
//!
//! Every handler is an `impl HandleMsg<T> for Network`. [Network::dispatch] checks that the
//! target may process the message, then calls the one handler of its type.

use crate::dht::Did;
use crate::dht::PeerRingAction;
use crate::dht::PeerRingRemoteAction;
use crate::error::Result;
use crate::message::types::Delivery;
use crate::message::types::Envelope;
use crate::message::types::Message;
use crate::message::types::QueryPurpose;
use crate::network::callback::NodeEvent;
use crate::network::Network;
use crate::node::NodeState;
use crate::sim::Timestamp;

/// Handlers of find-successor queries and lookups
pub mod dht;
/// Handlers of graceful leave and the lifecycle operations
pub mod membership;
/// Handlers of stabilization rounds
pub mod stabilization;
/// Handlers of key handoff
pub mod storage;

/// Node processing a message, and when.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageContext {
    /// Receiver of the message.
    pub did: Did,
    /// Delivery time.
    pub now: Timestamp,
}

/// Generic trait for handle message, inspired by Actor-Model.
pub trait HandleMsg<T> {
    /// Message handler.
    fn handle(&mut self, ctx: &MessageContext, msg: T) -> Result<()>;
}

impl Network {
    /// True if the target of `envelope` may process it now.
    fn accepts(&self, envelope: &Envelope) -> bool {
        let Some(node) = self.nodes.get(&envelope.target) else {
            return false;
        };
        match envelope.message.delivery() {
            Delivery::Local => {
                if envelope.incarnation != Some(node.incarnation()) {
                    return false;
                }
                match envelope.message {
                    Message::ClearAll(_) => node.state() == NodeState::Leaving,
                    _ => node.state().is_running(),
                }
            }
            Delivery::Remote => node.state().is_reachable(),
            Delivery::Storage => node.state().is_member() || node.state() == NodeState::Leaving,
            Delivery::Tracker => true,
        }
    }

    /// Hand a delivered message to its handler.
    pub(crate) fn dispatch(&mut self, envelope: Envelope) -> Result<()> {
        if !self.accepts(&envelope) {
            match envelope.message.delivery() {
                // a stale continuation of a crashed or restarted node is expected
                Delivery::Local => tracing::trace!(
                    "drop stale {} of node {}",
                    envelope.message.kind(),
                    envelope.target
                ),
                _ => self.emit(envelope.target, NodeEvent::MessageDropped {
                    kind: envelope.message.kind(),
                }),
            }
            return Ok(());
        }

        let ctx = MessageContext {
            did: envelope.target,
            now: self.now(),
        };
        tracing::trace!("node {} handles {}", ctx.did, envelope.message);

        match envelope.message {
            Message::FindSuccessorStep(msg) => self.handle(&ctx, msg),
            Message::ProcessSuccResponse(msg) => self.handle(&ctx, msg),
            Message::Stabilize(msg) => self.handle(&ctx, msg),
            Message::StabilizationStep(msg) => self.handle(&ctx, msg),
            Message::ProcessStabResponse(msg) => self.handle(&ctx, msg),
            Message::PredecessorTimeout(msg) => self.handle(&ctx, msg),
            Message::ClearAll(msg) => self.handle(&ctx, msg),
            Message::NotifiedPredecessor(msg) => self.handle(&ctx, msg),
            Message::SetNewSuccessor(msg) => self.handle(&ctx, msg),
            Message::NewData(msg) => self.handle(&ctx, msg),
            Message::ResetPredecessor(msg) => self.handle(&ctx, msg),
            Message::SetPredecessor(msg) => self.handle(&ctx, msg),
            Message::SetLastSuccessor(msg) => self.handle(&ctx, msg),
            Message::CompleteLookup(msg) => self.handle(&ctx, msg),
        }
    }

    /// Carry out the action a [PeerRing](crate::dht::PeerRing) of node `did` asked for.
    pub(crate) fn handle_dht_events(&mut self, did: Did, act: PeerRingAction) -> Result<()> {
        match act {
            // routing answers are consumed by the query that asked for them
            PeerRingAction::None
            | PeerRingAction::Some(_)
            | PeerRingAction::RemoteAction(_, PeerRingRemoteAction::FindSuccessor(_)) => Ok(()),
            PeerRingAction::RemoteAction(
                _,
                PeerRingRemoteAction::FindSuccessorForFix(index, start),
            ) => self.find_successor(did, start, QueryPurpose::Finger(index)),
            PeerRingAction::RemoteAction(
                _,
                PeerRingRemoteAction::FindSuccessorForSuccessorList(position, start),
            ) => self.find_successor(did, start, QueryPurpose::Successor(position)),
        }
    }
}
