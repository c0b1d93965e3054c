#![warn(missing_docs)]
//! Implementation of the ring's DHT
//! which is based on CHORD, ref: <https://pdos.csail.mit.edu/papers/ton:chord/paper-ton.pdf>
//! With high probability, the number of nodes that must be contacted to find a successor in an N-node network is O(log N).

mod chord;
pub mod did;
/// Finger table of a node
pub mod finger;
#[allow(missing_docs)]
pub mod successor;
pub mod types;

pub use chord::Notified;
pub use chord::PeerRing;
pub use chord::PeerRingAction;
pub use chord::RemoteAction as PeerRingRemoteAction;
pub use did::belongs_to_interval;
pub use did::Did;
pub use did::IdSpace;
pub use finger::FingerTable;
pub use successor::SuccessorReader;
pub use successor::SuccessorSeq;
pub use successor::SuccessorWriter;
pub use types::Chord;
pub use types::CorrectChord;
