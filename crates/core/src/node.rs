//! One ring member: its lifecycle, routing state and local store.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::dht::Did;
use crate::dht::IdSpace;
use crate::dht::PeerRing;
use crate::error::Error;
use crate::error::Result;
use crate::storage::MemStorage;

/// Lifecycle of a node.
///
/// Only the transitions listed in [Transition] exist, any other request is rejected with
/// [Error::InvalidTransition].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeState {
    /// Not a ring member, never was or gave up joining.
    Unsubscribed,
    /// Resolving its first successor through a seed.
    Joining,
    Active,
    /// Unreachable, state retained.
    Crashed,
    /// Handed off its data, waiting for in-flight messages before clearing.
    Leaving,
    /// Left the ring, every structure is empty.
    Cleared,
}

impl NodeState {
    /// The node drives its own continuations (stabilization, queries).
    pub fn is_running(self) -> bool {
        matches!(self, NodeState::Joining | NodeState::Active)
    }

    /// Other nodes get an answer from it.
    pub fn is_reachable(self) -> bool {
        self == NodeState::Active
    }

    /// Still part of the ring, possibly only temporarily unreachable.
    pub fn is_member(self) -> bool {
        matches!(
            self,
            NodeState::Joining | NodeState::Active | NodeState::Crashed
        )
    }

    /// The first successor has been acquired.
    pub fn is_initialized(self) -> bool {
        matches!(
            self,
            NodeState::Active | NodeState::Crashed | NodeState::Leaving
        )
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Requested lifecycle changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Create,
    Join,
    JoinCompleted,
    JoinFailed,
    Crash,
    Recover,
    Leave,
    Clear,
}

impl Transition {
    pub fn name(self) -> &'static str {
        match self {
            Transition::Create => "create",
            Transition::Join => "join",
            Transition::JoinCompleted => "complete join",
            Transition::JoinFailed => "fail join",
            Transition::Crash => "crash",
            Transition::Recover => "recover",
            Transition::Leave => "leave",
            Transition::Clear => "clear",
        }
    }

    /// State reached from `from`, or None if the transition does not exist.
    pub fn apply(self, from: NodeState) -> Option<NodeState> {
        use NodeState::*;
        match (self, from) {
            (Transition::Create, Unsubscribed | Cleared) => Some(Active),
            (Transition::Join, Unsubscribed | Cleared) => Some(Joining),
            (Transition::JoinCompleted, Joining) => Some(Active),
            (Transition::JoinFailed, Joining) => Some(Unsubscribed),
            (Transition::Crash, Active) => Some(Crashed),
            (Transition::Recover, Crashed) => Some(Active),
            (Transition::Leave, Active) => Some(Leaving),
            (Transition::Clear, Leaving) => Some(Cleared),
            _ => None,
        }
    }

    /// Transitions that start a new stabilization loop.
    fn starts_incarnation(self) -> bool {
        matches!(
            self,
            Transition::Create | Transition::Join | Transition::Recover
        )
    }
}

/// A node of the ring as stored in the arena of a [Network](crate::network::Network).
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) state: NodeState,
    /// Bumped on every create, join and recover. Continuations scheduled by an older
    /// incarnation are ignored.
    pub(crate) incarnation: u64,
    pub(crate) ring: PeerRing,
    pub(crate) storage: MemStorage<Did, String>,
}

impl Node {
    pub fn new(did: Did, space: IdSpace, successors_size: usize) -> Self {
        Self {
            state: NodeState::Unsubscribed,
            incarnation: 0,
            ring: PeerRing::new(did, space, successors_size),
            storage: MemStorage::new(),
        }
    }

    pub fn did(&self) -> Did {
        self.ring.did
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    pub fn incarnation(&self) -> u64 {
        self.incarnation
    }

    pub fn ring(&self) -> &PeerRing {
        &self.ring
    }

    pub fn storage(&self) -> &MemStorage<Did, String> {
        &self.storage
    }

    pub fn is_active(&self) -> bool {
        self.state == NodeState::Active
    }

    pub fn is_initialized(&self) -> bool {
        self.state.is_initialized()
    }

    /// Move along the lifecycle, returning the previous state.
    pub(crate) fn transition(&mut self, t: Transition) -> Result<NodeState> {
        let from = self.state;
        let to = t.apply(from).ok_or(Error::InvalidTransition {
            did: self.did(),
            op: t.name(),
            state: from,
        })?;
        self.state = to;
        if t.starts_incarnation() {
            self.incarnation += 1;
        }
        Ok(from)
    }
}
