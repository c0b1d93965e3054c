use crate::dht::SuccessorReader;
use crate::dht::SuccessorWriter;
use crate::error::Result;
use crate::message::types::ClearAll;
use crate::message::types::Message;
use crate::message::types::SetLastSuccessor;
use crate::message::types::SetNewSuccessor;
use crate::message::types::SetPredecessor;
use crate::message::HandleMsg;
use crate::message::MessageContext;
use crate::network::callback::NodeEvent;
use crate::network::Network;
use crate::node::NodeState;
use crate::node::Transition;
use crate::storage::KvStorageInterface;

/// The successor of a departing node takes over its predecessor.
impl HandleMsg<SetPredecessor> for Network {
    fn handle(&mut self, ctx: &MessageContext, msg: SetPredecessor) -> Result<()> {
        let did = ctx.did;
        let predecessor = Some(msg.predecessor)
            .filter(|p| *p != did)
            .filter(|p| self.is_member(*p));
        if predecessor.is_none() && msg.predecessor != did {
            self.emit(did, NodeEvent::StaleReference {
                peer: msg.predecessor,
            });
        }

        let node = self.node_mut(did)?;
        let changed = node.ring.predecessor != predecessor;
        node.ring.predecessor = predecessor;
        if changed {
            self.emit(did, NodeEvent::PredecessorChanged { predecessor });
        }

        if let Some(p) = predecessor {
            let delay = self.one_way();
            self.send_remote(
                p,
                delay,
                Message::SetNewSuccessor(SetNewSuccessor { successor: did }),
            );
        }
        Ok(())
    }
}

/// The predecessor of a departing node drops it and extends its successor list with the
/// departed node's tail.
impl HandleMsg<SetLastSuccessor> for Network {
    fn handle(&mut self, ctx: &MessageContext, msg: SetLastSuccessor) -> Result<()> {
        let did = ctx.did;
        let tail = msg
            .tail
            .filter(|t| *t != did && *t != msg.departed)
            .filter(|t| self.is_member(*t));

        let node = self.node_mut(did)?;
        let first = node.ring.successors.min();
        let pruned = node.ring.remove(msg.departed);
        if let Some(tail) = tail {
            if node.ring.successors.is_singleton() {
                node.ring.successors.set_first(tail);
            } else {
                node.ring.successors.push_back(tail);
            }
        }
        node.ring.mirror_successor();
        let new_first = node.ring.successors.min();

        if pruned {
            self.emit(did, NodeEvent::PeerPruned {
                peer: msg.departed,
            });
        }
        if first != new_first {
            self.emit(did, NodeEvent::SuccessorChanged {
                successor: new_first,
            });
        }
        Ok(())
    }
}

/// A departed node forgets everything once its handoffs had time to land.
impl HandleMsg<ClearAll> for Network {
    fn handle(&mut self, ctx: &MessageContext, _msg: ClearAll) -> Result<()> {
        let node = self.node_mut(ctx.did)?;
        node.ring.clear();
        node.storage.clear();
        let from = node.transition(Transition::Clear)?;
        self.emit(ctx.did, NodeEvent::StateChanged {
            from,
            to: NodeState::Cleared,
        });
        Ok(())
    }
}
