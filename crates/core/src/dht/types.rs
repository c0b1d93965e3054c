//! DHT traits of `PeerRing`.
#![warn(missing_docs)]

use super::chord::Notified;
use super::did::Did;

/// Chord is a distributed hash table (DHT) algorithm that is designed to efficiently
/// locate the node responsible for a key. You may want to browse its
/// [wiki](https://en.wikipedia.org/wiki/Chord_(peer-to-peer)) before you read this.
///
/// Each node keeps a successor list and a finger table of `m` entries, entry `i` pointing
/// near `did + 2^(i-1)`. A query for `key` either resolves locally, when the key lies between
/// the node and its first successor, or is forwarded to the farthest known node that does
/// not overshoot the key. It takes O(log n) hops to reach the owner.
///
/// Some methods return an `Action` which is used to tell outer the extra action to take
/// after handling data inside the struct. It's useful since the struct only holds the
/// routing state of one node and knows nothing about delivering messages.
pub trait Chord<Action> {
    /// Ask the node for the successor of `did`.
    /// May return a remote action for the successor is recorded in another node.
    fn find_successor(&self, did: Did) -> Action;

    /// The farthest known node strictly between this node and `did`, or the node itself.
    fn closest_preceding_node(&self, did: Did) -> Did;

    /// Handle a node claiming to be the predecessor of this node.
    /// It is accepted when no predecessor is known, or when it lies strictly between
    /// the current predecessor and this node.
    fn notify(&mut self, did: Did) -> Notified;

    /// Pick one finger to repair.
    /// According to the paper, only one finger should be fixed at a time.
    fn fix_fingers(&mut self) -> Action;
}

/// CorrectChord maintains the whole successor list instead of the first successor only,
/// so that a node survives the loss of several consecutive successors.
pub trait CorrectChord<Action>: Chord<Action> {
    /// Pick one successor slot to repair, following the one repaired last time.
    fn fix_successors(&mut self) -> Action;

    /// Apply what a successor told during stabilization: `answering` is the successor that
    /// replied, `predecessor` its predecessor. Returns true if the first successor changed.
    fn stabilize_with(&mut self, answering: Did, predecessor: Option<Did>) -> bool;

    /// Replace the successor list with the one of `peer`.
    fn update_successors(&mut self, peer: Did, successors: &[Did]);
}
