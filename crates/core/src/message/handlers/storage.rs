#![warn(missing_docs)]

use crate::dht::Did;
use crate::dht::SuccessorReader;
use crate::error::Error;
use crate::error::Result;
use crate::message::types::Message;
use crate::message::types::NewData;
use crate::message::HandleMsg;
use crate::message::MessageContext;
use crate::network::callback::NodeEvent;
use crate::network::Network;
use crate::node::NodeState;
use crate::storage::KvStorageInterface;

/// ChordStorageInterface places data on the ring and tells where it lives.
pub trait ChordStorageInterface {
    /// Put `value` directly in the store of the current owner of `key`.
    fn storage_store(&mut self, key: Did, value: String) -> Result<Did>;

    /// Hash the first `key_size` characters of `payload` to a key and store the payload there.
    /// Returns the key and its owner.
    fn storage_store_payload(&mut self, payload: &str, key_size: usize) -> Result<(Did, Did)>;

    /// Nodes, active or crashed, whose store holds `key`.
    fn storage_holders(&self, key: Did) -> Vec<Did>;
}

impl ChordStorageInterface for Network {
    fn storage_store(&mut self, key: Did, value: String) -> Result<Did> {
        let key = self.space.did(key.value())?;
        let owner = self.first_not_crashed(key).ok_or(Error::EmptyRing)?;
        self.node_mut(owner)?.storage.put(key, value);
        Ok(owner)
    }

    fn storage_store_payload(&mut self, payload: &str, key_size: usize) -> Result<(Did, Did)> {
        let prefix: String = payload.chars().take(key_size).collect();
        let key = self.space.hash(&prefix);
        let owner = self.storage_store(key, payload.to_string())?;
        Ok((key, owner))
    }

    fn storage_holders(&self, key: Did) -> Vec<Did> {
        self.nodes
            .values()
            .filter(|n| matches!(n.state(), NodeState::Active | NodeState::Crashed))
            .filter(|n| n.storage().contains_key(&key))
            .map(|n| n.did())
            .collect()
    }
}

impl HandleMsg<NewData> for Network {
    fn handle(&mut self, ctx: &MessageContext, msg: NewData) -> Result<()> {
        let node = self.node_mut(ctx.did)?;
        if node.state() == NodeState::Leaving {
            let successor = node.ring.successors.min();
            if successor == ctx.did {
                tracing::warn!("node {} left alone, {} keys are lost", ctx.did, msg.data.len());
                return Ok(());
            }
            self.emit(ctx.did, NodeEvent::KeysTransferred {
                to: successor,
                count: msg.data.len(),
            });
            let delay = self.one_way();
            self.send_remote(successor, delay, Message::NewData(msg));
            return Ok(());
        }
        let count = msg.data.len();
        for (key, value) in msg.data {
            node.storage.put(key, value);
        }
        tracing::debug!("node {} received {} keys", ctx.did, count);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::membership::Membership;
    use crate::tests::default::preloaded;

    #[test]
    fn test_store_at_first_active_node() -> Result<()> {
        let mut net = preloaded(&[2, 7, 12], 4)?;
        assert_eq!(net.storage_store(Did::from(5u64), "a".into())?, Did::from(7u64));
        assert_eq!(net.storage_store(Did::from(7u64), "b".into())?, Did::from(7u64));
        assert_eq!(net.storage_store(Did::from(13u64), "c".into())?, Did::from(2u64));
        assert_eq!(net.storage_holders(Did::from(13u64)), vec![Did::from(2u64)]);

        net.crash(Did::from(7u64))?;
        assert_eq!(net.storage_store(Did::from(6u64), "d".into())?, Did::from(12u64));
        println!("a crashed node still holds its keys");
        assert_eq!(net.storage_holders(Did::from(5u64)), vec![Did::from(7u64)]);

        assert!(matches!(
            net.storage_store(Did::from(16u64), "e".into()),
            Err(Error::DidOutOfRange(16, 4))
        ));
        Ok(())
    }

    #[test]
    fn test_store_payload_hashes_its_prefix() -> Result<()> {
        let mut net = preloaded(&[2, 7, 12], 4)?;
        // "hello" hashes to 13 on a 4-bit ring
        let (key, owner) = net.storage_store_payload("hello world", 5)?;
        assert_eq!(key, Did::from(13u64));
        assert_eq!(owner, Did::from(2u64));
        Ok(())
    }
}
