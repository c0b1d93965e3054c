//! Chord algorithm implement.
#![warn(missing_docs)]
use derivative::Derivative;

use super::did::belongs_to_interval;
use super::did::IdSpace;
use super::successor::SuccessorSeq;
use super::types::Chord;
use super::types::CorrectChord;
use super::FingerTable;
use crate::dht::Did;
use crate::dht::SuccessorReader;
use crate::dht::SuccessorWriter;

/// PeerRing is the routing state of one node of the ring.
/// All nodes form a clockwise ring in the order of Did.
/// This struct takes its name from that.
/// PeerRing implemented [Chord] algorithm.
///
/// Two rings are equal when their tables are equal, the repair cursors are ignored.
#[derive(Derivative, Clone)]
#[derivative(Debug, PartialEq)]
pub struct PeerRing {
    /// The did of current node.
    pub did: Did,
    /// The identifier space of the ring.
    pub space: IdSpace,
    /// [FingerTable] help node to find successor quickly.
    pub finger: FingerTable,
    /// The next nodes on the ring.
    /// The first one should be same as the first element in finger table.
    pub successors: SuccessorSeq,
    /// The did of previous node on the ring.
    pub predecessor: Option<Did>,
    /// Next finger index to repair.
    #[derivative(PartialEq = "ignore")]
    pub(crate) next_finger: u8,
    /// Next successor slot to use as base of a repair.
    #[derivative(PartialEq = "ignore")]
    pub(crate) next_successor: usize,
    /// Toggled every stabilization round, `false` repairs successors, `true` repairs fingers.
    #[derivative(PartialEq = "ignore")]
    pub(crate) stabilization_phase: bool,
}

/// Type alias is just for making the code easy to read.
type Target = Did;

/// `PeerRing` use this to describe the result of [Chord] algorithm. Sometimes it's a
/// direct result, sometimes it's an action that is continued externally.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PeerRingAction {
    /// No result, the whole manipulation is done internally.
    None,
    /// Found some node.
    Some(Did),
    /// Trigger a remote action.
    RemoteAction(Target, RemoteAction),
}

/// Some of the process needs to be done remotely. This enum is used to describe that.
/// Don't worry about leaving the context. The [Network](crate::network::Network) delivers
/// the action and invokes appropriate methods in `PeerRing` to continue the process.
///
/// To avoid ambiguity, in the following comments, `did_a` is the Did declared in
/// [PeerRingAction]. Other dids are the fields declared in this [RemoteAction].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RemoteAction {
    /// Need `did_a` to find `did_b`.
    FindSuccessor(Did),
    /// Need `did_a` to find `did_b` then place the answer at finger `index`.
    FindSuccessorForFix(u8, Did),
    /// Need `did_a` to find `did_b` then splice the answer into successor slot `position`.
    FindSuccessorForSuccessorList(usize, Did),
}

/// Outcome of [Chord::notify].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Notified {
    /// The candidate is the new predecessor, `previous` is the one it replaced.
    Accepted {
        /// Predecessor before the notification.
        previous: Option<Did>,
    },
    /// The current predecessor is closer.
    Rejected {
        /// Predecessor kept.
        current: Did,
    },
}

impl PeerRing {
    /// Create a new Chord ring.
    pub fn new(did: Did, space: IdSpace, succ_max: usize) -> Self {
        Self {
            did,
            space,
            finger: FingerTable::new(did, space.bits()),
            successors: SuccessorSeq::new(did, succ_max),
            predecessor: None,
            next_finger: 2,
            next_successor: 0,
            stabilization_phase: false,
        }
    }

    /// Return successor sequence.
    pub fn successors(&self) -> &SuccessorSeq {
        &self.successors
    }

    /// Keep finger 1 equal to the first successor.
    pub fn mirror_successor(&mut self) {
        if let Some(s) = self.successors.get(0) {
            self.finger.set(1, s);
        }
    }

    /// Make this node alone on its ring.
    pub fn reset_to_singleton(&mut self) {
        self.successors.reset_to_self();
        self.finger.clear();
        self.finger.set(1, self.did);
        self.next_finger = 2;
        self.next_successor = 0;
    }

    /// Drop every routing entry.
    pub fn clear(&mut self) {
        self.successors.clear();
        self.finger.clear();
        self.predecessor = None;
        self.next_finger = 2;
        self.next_successor = 0;
        self.stabilization_phase = false;
    }

    /// Remove a node from finger table.
    /// Also remove it from successor sequence.
    /// If successor_seq become empty, try setting the closest node to it.
    /// Returns true if anything was removed.
    pub fn remove(&mut self, did: Did) -> bool {
        if did == self.did {
            return false;
        }
        let removed = self.finger.remove_all(did) > 0;
        let removed = self.successors.remove(did) || removed;
        if self.successors.is_empty() {
            match self.finger.first() {
                Some(x) if x != self.did => {
                    self.successors.push_back(x);
                }
                _ => self.reset_to_singleton(),
            }
        }
        self.mirror_successor();
        removed
    }

    /// True if the node knows at least one other node.
    pub fn knows_peers(&self) -> bool {
        self.successors.iter().any(|x| *x != self.did)
            || self.finger.list().iter().flatten().any(|x| *x != self.did)
    }

    /// True if `key` falls in `(predecessor, did]`.
    /// Without predecessor the node trusts `asker`, the node that routed the key here, to
    /// precede the key. A singleton owns every key.
    pub fn is_responsible(&self, key: Did, asker: Did) -> bool {
        match self.predecessor.filter(|p| *p != self.did) {
            Some(p) => belongs_to_interval(key, p, self.did),
            None if self.successors.is_singleton() => true,
            None => asker != self.did && belongs_to_interval(key, asker, self.did),
        }
    }

    /// Put the resolution of finger `index` in place.
    /// A node resolving to itself means the ring is too small for that offset.
    pub fn apply_finger(&mut self, index: u8, resolved: Did) -> bool {
        if resolved == self.did {
            if index == 1 {
                return false;
            }
            // every larger offset resolves to self as well
            self.next_finger = 2;
            return self.finger.remove(index).is_some();
        }
        if self.finger[index] == Some(resolved) {
            return false;
        }
        self.finger.set(index, resolved);
        if index == 1 {
            self.successors.set_first(resolved);
        }
        true
    }

    /// Put the resolution of successor slot `position` in place.
    pub fn apply_successor(&mut self, position: usize, resolved: Did) -> bool {
        if resolved == self.did {
            // the ring ends before this slot
            let len = self.successors.len();
            self.successors.truncate(position.max(1));
            self.next_successor = 0;
            return len != self.successors.len();
        }
        let changed = self.successors.splice_in_order(position, resolved);
        self.mirror_successor();
        changed
    }
}

impl Chord<PeerRingAction> for PeerRing {
    /// Find the successor of a Did.
    /// May return a remote action for the successor is recorded in another node.
    fn find_successor(&self, did: Did) -> PeerRingAction {
        let succ = if self.successors.is_empty() {
            PeerRingAction::None
        } else if belongs_to_interval(did, self.did, self.successors.min()) {
            // If the did is closer to self than successor, return successor as the
            // successor of that did.
            PeerRingAction::Some(self.successors.min())
        } else {
            // Otherwise, find the closest preceding node and ask it to find the successor.
            PeerRingAction::RemoteAction(
                self.closest_preceding_node(did),
                RemoteAction::FindSuccessor(did),
            )
        };

        tracing::trace!(
            "find_successor: self: {}, did: {}, successors: {:?}, result: {:?}",
            self.did,
            did,
            self.successors,
            succ
        );

        succ
    }

    fn closest_preceding_node(&self, did: Did) -> Did {
        let is_candidate =
            |x: Did| x != did && x != self.did && belongs_to_interval(x, self.did, did);

        let best = self
            .finger
            .keys_descending()
            .into_iter()
            .filter_map(|i| self.finger[i])
            .find(|x| is_candidate(*x));

        // a successor between the finger and the target is closer still
        let lo = best.unwrap_or(self.did);
        let refined = self
            .successors
            .iter()
            .rev()
            .copied()
            .find(|x| is_candidate(*x) && belongs_to_interval(*x, lo, did));

        refined.or(best).unwrap_or(self.did)
    }

    fn notify(&mut self, did: Did) -> Notified {
        if did == self.did {
            return Notified::Rejected {
                current: self.predecessor.unwrap_or(self.did),
            };
        }
        match self.predecessor {
            Some(pre) if pre == did => Notified::Rejected { current: pre },
            Some(pre) => {
                // If the did is closer to self than predecessor, set it to the predecessor.
                // Otherwise tell the real predecessor back.
                if belongs_to_interval(did, pre, self.did) {
                    self.predecessor = Some(did);
                    Notified::Accepted { previous: Some(pre) }
                } else {
                    Notified::Rejected { current: pre }
                }
            }
            None => {
                self.predecessor = Some(did);
                Notified::Accepted { previous: None }
            }
        }
    }

    fn fix_fingers(&mut self) -> PeerRingAction {
        let m = self.space.bits();
        if self.next_finger < 1 || self.next_finger > m {
            self.next_finger = 2.min(m);
        }
        let index = self.next_finger.min(self.finger.first_missing_index());
        self.next_finger = index + 1;
        let start = self.space.finger_start(self.did, index);
        PeerRingAction::RemoteAction(self.did, RemoteAction::FindSuccessorForFix(index, start))
    }
}

impl CorrectChord<PeerRingAction> for PeerRing {
    fn fix_successors(&mut self) -> PeerRingAction {
        let len = self.successors.len();
        if self.successors.capacity() < 2 || len == 0 || self.successors.is_singleton() {
            return PeerRingAction::None;
        }
        let mut slot = self.next_successor;
        if slot >= len || slot >= self.successors.capacity() - 1 {
            slot = 0;
        }
        self.next_successor = slot + 1;
        let base = self.successors.get(slot).unwrap_or(self.did);
        PeerRingAction::RemoteAction(
            self.did,
            RemoteAction::FindSuccessorForSuccessorList(slot + 1, self.space.add(base, 1)),
        )
    }

    fn stabilize_with(&mut self, answering: Did, predecessor: Option<Did>) -> bool {
        let before = self.successors.get(0);
        if answering != self.did && !self.successors.drain_until(answering) {
            self.successors.push_front(answering);
        }
        if let Some(p) = predecessor {
            let first = self.successors.min();
            if p != self.did && p != first && belongs_to_interval(p, self.did, first) {
                self.successors.push_front(p);
            }
        }
        self.mirror_successor();
        before != self.successors.get(0)
    }

    fn update_successors(&mut self, peer: Did, successors: &[Did]) {
        self.successors.merge_from_peer_response(peer, successors);
        self.mirror_successor();
    }
}
