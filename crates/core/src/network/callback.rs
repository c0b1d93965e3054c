#![warn(missing_docs)]
//! Observability hook of a [Network](super::Network).

use std::sync::Arc;

use serde::Serialize;

use crate::dht::Did;
use crate::lookup::LookupId;
use crate::node::NodeState;

/// The [Network](super::Network) accepts a shared [NetworkCallback] trait object.
pub type SharedNetworkCallback = Arc<dyn NetworkCallback + Send + Sync>;

/// Something observable happened to a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[non_exhaustive]
pub enum NodeEvent {
    /// Lifecycle transition.
    StateChanged {
        /// State before.
        from: NodeState,
        /// State after.
        to: NodeState,
    },
    /// The first successor of a joining node could not be resolved.
    JoinFailed,
    /// The first successor changed.
    SuccessorChanged {
        /// New first successor.
        successor: Did,
    },
    /// The predecessor changed.
    PredecessorChanged {
        /// New predecessor.
        predecessor: Option<Did>,
    },
    /// A finger table entry changed.
    FingerUpdated {
        /// Finger index.
        index: u8,
        /// New entry.
        finger: Option<Did>,
    },
    /// An unresponsive peer was removed from the routing tables.
    PeerPruned {
        /// Removed peer.
        peer: Did,
    },
    /// Keys were handed to another node.
    KeysTransferred {
        /// Receiver.
        to: Did,
        /// Number of keys.
        count: usize,
    },
    /// A successor did not answer a stabilization round.
    StabilizationTimeout {
        /// Unresponsive successor.
        successor: Did,
    },
    /// The node lost every peer and is alone on its ring.
    SingletonReset,
    /// A message reached a node that could not process it.
    MessageDropped {
        /// Message kind.
        kind: &'static str,
    },
    /// A peer that left the ring was not committed into the routing tables.
    StaleReference {
        /// Departed peer.
        peer: Did,
    },
    /// A lookup issued by the node completed.
    LookupCompleted {
        /// Lookup.
        lookup: LookupId,
        /// Whether it satisfies the success predicate.
        succeeded: bool,
    },
}

/// Any object that implements this trait can be used as a callback for the network.
pub trait NetworkCallback {
    /// This method is invoked after the network handled a change of `did`.
    fn on_event(&self, _did: Did, _event: &NodeEvent) {}
}

/// Callback doing nothing, the default of a [NetworkBuilder](super::NetworkBuilder).
pub struct DefaultCallback;
impl NetworkCallback for DefaultCallback {}
