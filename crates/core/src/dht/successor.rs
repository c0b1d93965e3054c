//! Successor for PeerRing
use serde::Deserialize;
use serde::Serialize;

use crate::dht::did::belongs_to_interval;
use crate::dht::Did;

/// A sequence of successors for a node on the ring.
/// It's necessary to have multiple successors to prevent a single point of failure.
/// Note the successors are in order of a clockwise distance from the node, they are distinct,
/// and the node itself only appears when it is alone on its ring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessorSeq {
    /// Node did
    did: Did,
    /// Max successor num
    max: usize,
    /// Successors
    successors: Vec<Did>,
}

pub trait SuccessorReader {
    fn is_empty(&self) -> bool;
    fn is_full(&self) -> bool;
    fn get(&self, index: usize) -> Option<Did>;
    fn len(&self) -> usize;
    fn min(&self) -> Did;
    fn max(&self) -> Did;
    fn list(&self) -> Vec<Did>;
    fn contains(&self, did: &Did) -> bool;
    fn position(&self, did: &Did) -> Option<usize>;
}

pub trait SuccessorWriter {
    /// Make `did` the first successor, dropping any other copy of it.
    fn set_first(&mut self, did: Did);
    /// Insert `did` in front of the list, dropping any other copy of it.
    fn push_front(&mut self, did: Did);
    /// Append `did` if there is room and it is not known yet.
    fn push_back(&mut self, did: Did) -> bool;
    /// Drop every entry in front of `did`, returns false if `did` is not in the list.
    fn drain_until(&mut self, did: Did) -> bool;
    /// Replace the list with `[peer] + peer_successors`, stopping where the peer's list comes
    /// back to this node.
    fn merge_from_peer_response(&mut self, peer: Did, peer_successors: &[Did]);
    /// Repair slot `position` with the resolved successor of slot `position - 1`.
    fn splice_in_order(&mut self, position: usize, successor: Did) -> bool;
    /// Delete `did` everywhere it appears.
    fn remove(&mut self, did: Did) -> bool;
    /// Keep the first `len` entries.
    fn truncate(&mut self, len: usize);
    /// Make the node its own and only successor.
    fn reset_to_self(&mut self);
    fn clear(&mut self);
}

impl SuccessorSeq {
    pub fn new(did: Did, max: usize) -> Self {
        Self {
            did,
            max,
            successors: vec![],
        }
    }

    /// Max length of the sequence.
    pub fn capacity(&self) -> usize {
        self.max
    }

    /// Node alone on its ring.
    pub fn is_singleton(&self) -> bool {
        self.successors == [self.did]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Did> {
        self.successors.iter()
    }
}

impl SuccessorReader for SuccessorSeq {
    fn contains(&self, did: &Did) -> bool {
        self.successors.contains(did)
    }

    fn position(&self, did: &Did) -> Option<usize> {
        self.successors.iter().position(|x| x == did)
    }

    fn is_empty(&self) -> bool {
        self.successors.is_empty()
    }

    fn is_full(&self) -> bool {
        self.successors.len() >= self.max
    }

    fn get(&self, index: usize) -> Option<Did> {
        self.successors.get(index).copied()
    }

    fn len(&self) -> usize {
        self.successors.len()
    }

    fn min(&self) -> Did {
        self.successors.first().copied().unwrap_or(self.did)
    }

    fn max(&self) -> Did {
        self.successors.last().copied().unwrap_or(self.did)
    }

    fn list(&self) -> Vec<Did> {
        self.successors.clone()
    }
}

impl SuccessorWriter for SuccessorSeq {
    fn set_first(&mut self, did: Did) {
        if did != self.did {
            self.successors.retain(|x| *x != self.did);
        }
        self.successors.retain(|x| *x != did);
        if self.successors.is_empty() {
            self.successors.push(did);
        } else {
            self.successors[0] = did;
        }
    }

    fn push_front(&mut self, did: Did) {
        if did == self.did {
            return;
        }
        self.successors.retain(|x| *x != did && *x != self.did);
        self.successors.insert(0, did);
        self.successors.truncate(self.max);
    }

    fn push_back(&mut self, did: Did) -> bool {
        if did == self.did || self.is_full() || self.contains(&did) {
            return false;
        }
        self.successors.retain(|x| *x != self.did);
        self.successors.push(did);
        true
    }

    fn drain_until(&mut self, did: Did) -> bool {
        match self.position(&did) {
            Some(index) => {
                self.successors.drain(..index);
                true
            }
            None => false,
        }
    }

    fn merge_from_peer_response(&mut self, peer: Did, peer_successors: &[Did]) {
        if peer == self.did {
            return;
        }
        let mut candidates = vec![peer];
        for s in peer_successors {
            // the peer's list wrapped around back to us
            if *s == self.did {
                break;
            }
            if candidates.contains(s) {
                continue;
            }
            candidates.push(*s);
        }
        candidates.truncate(self.max);
        self.successors = candidates;
    }

    fn splice_in_order(&mut self, position: usize, successor: Did) -> bool {
        if successor == self.did
            || position == 0
            || position >= self.max
            || position > self.successors.len()
        {
            return false;
        }
        let prev = self.successors[position - 1];
        if prev == successor || prev == self.did {
            return false;
        }

        if let Some(existing) = self.position(&successor) {
            if existing == position {
                return false;
            }
            if existing > position {
                // the entries in between were skipped by the resolution
                self.successors.drain(position..existing);
                return true;
            }
            // a copy sits in front of prev, so the list is out of order there
            self.successors.remove(existing);
            return self.splice_in_order(position - 1, successor);
        }

        if position == self.successors.len() {
            self.successors.push(successor);
            return true;
        }

        let current = self.successors[position];
        if belongs_to_interval(successor, prev, current) {
            self.successors.insert(position, successor);
        } else {
            self.successors[position] = successor;
            let mut i = position + 1;
            while i < self.successors.len() {
                if belongs_to_interval(self.successors[i], prev, successor) {
                    self.successors.remove(i);
                } else {
                    i += 1;
                }
            }
        }
        self.successors.truncate(self.max);
        true
    }

    fn remove(&mut self, did: Did) -> bool {
        let len = self.successors.len();
        self.successors.retain(|&v| v != did);
        len != self.successors.len()
    }

    fn truncate(&mut self, len: usize) {
        self.successors.truncate(len);
    }

    fn reset_to_self(&mut self) {
        self.successors = vec![self.did];
    }

    fn clear(&mut self) {
        self.successors.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dids(v: &[u64]) -> Vec<Did> {
        v.iter().map(|x| Did::from(*x)).collect()
    }

    fn seq(did: u64, max: usize, list: &[u64]) -> SuccessorSeq {
        let mut succ = SuccessorSeq::new(Did::from(did), max);
        for s in dids(list) {
            succ.push_back(s);
        }
        succ
    }

    #[test]
    fn test_merge_from_peer_response() {
        let mut succ = seq(2, 3, &[5]);
        succ.merge_from_peer_response(Did::from(5u64), &dids(&[7, 9, 11]));
        assert_eq!(succ.list(), dids(&[5, 7, 9]));

        println!("stop where the peer list comes back to self");
        succ.merge_from_peer_response(Did::from(5u64), &dids(&[2, 5]));
        assert_eq!(succ.list(), dids(&[5]));

        println!("drop the duplicate at the boundary");
        succ.merge_from_peer_response(Did::from(5u64), &dids(&[5]));
        assert_eq!(succ.list(), dids(&[5]));

        println!("replace a singleton list");
        let mut succ = seq(2, 3, &[]);
        succ.reset_to_self();
        assert!(succ.is_singleton());
        succ.merge_from_peer_response(Did::from(9u64), &dids(&[14, 2]));
        assert_eq!(succ.list(), dids(&[9, 14]));
    }

    #[test]
    fn test_remove_and_drain() {
        let mut succ = seq(2, 4, &[5, 7, 9, 11]);
        assert!(succ.is_full());
        assert!(!succ.push_back(Did::from(13u64)));
        assert!(succ.remove(Did::from(7u64)));
        assert!(!succ.remove(Did::from(7u64)));
        assert_eq!(succ.list(), dids(&[5, 9, 11]));
        assert!(succ.drain_until(Did::from(9u64)));
        assert_eq!(succ.list(), dids(&[9, 11]));
        assert!(!succ.drain_until(Did::from(3u64)));
        assert_eq!(succ.min(), Did::from(9u64));
        assert_eq!(succ.max(), Did::from(11u64));
    }

    #[test]
    fn test_push_front_and_set_first() {
        let mut succ = seq(2, 3, &[5, 7, 9]);
        succ.push_front(Did::from(4u64));
        assert_eq!(succ.list(), dids(&[4, 5, 7]));
        succ.push_front(Did::from(7u64));
        assert_eq!(succ.list(), dids(&[7, 4, 5]));
        succ.set_first(Did::from(5u64));
        assert_eq!(succ.list(), dids(&[5, 4]));

        let mut succ = seq(2, 3, &[]);
        succ.reset_to_self();
        succ.set_first(Did::from(6u64));
        assert_eq!(succ.list(), dids(&[6]));
        succ.push_front(Did::from(2u64));
        assert_eq!(succ.list(), dids(&[6]));
    }

    #[test]
    fn test_splice_in_order() {
        println!("append at the tail");
        let mut succ = seq(2, 4, &[5, 7]);
        assert!(succ.splice_in_order(2, Did::from(9u64)));
        assert_eq!(succ.list(), dids(&[5, 7, 9]));

        println!("insert before the current slot");
        assert!(succ.splice_in_order(1, Did::from(6u64)));
        assert_eq!(succ.list(), dids(&[5, 6, 7, 9]));

        println!("overwrite and evict entries now out of order");
        let mut succ = seq(2, 4, &[5, 7, 8, 12]);
        assert!(succ.splice_in_order(1, Did::from(10u64)));
        assert_eq!(succ.list(), dids(&[5, 10, 12]));

        println!("skip entries when the resolution is further down the list");
        let mut succ = seq(2, 4, &[5, 7, 8, 12]);
        assert!(succ.splice_in_order(1, Did::from(12u64)));
        assert_eq!(succ.list(), dids(&[5, 12]));

        println!("no change when already in place");
        let mut succ = seq(2, 4, &[5, 7]);
        assert!(!succ.splice_in_order(1, Did::from(7u64)));
        assert!(!succ.splice_in_order(1, Did::from(2u64)));
        assert!(!succ.splice_in_order(0, Did::from(3u64)));
        assert!(!succ.splice_in_order(3, Did::from(9u64)));
        assert_eq!(succ.list(), dids(&[5, 7]));

        println!("wrap around zero");
        let mut succ = seq(12, 3, &[14, 1]);
        assert!(succ.splice_in_order(1, Did::from(15u64)));
        assert_eq!(succ.list(), dids(&[14, 15, 1]));
    }
}
