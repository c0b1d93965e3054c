#![warn(missing_docs)]
//! This module defines the messages exchanged by ring members.
//!
//! A message is either a continuation a node scheduled for itself (a step of a query it
//! runs, the next stabilization round), a one-way notification sent to a peer, or the answer
//! of a lookup reaching the tracker. [Message::delivery] tells them apart.

use serde::Deserialize;
use serde::Serialize;

use crate::dht::Did;
use crate::lookup::LookupId;
use crate::lookup::Resolution;

/// Where the answer of a find-successor query goes once resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryPurpose {
    /// First successor of a joining node.
    Init,
    /// Finger table entry at this index.
    Finger(u8),
    /// Successor list slot at this position.
    Successor(usize),
    /// A tracked lookup.
    Lookup(LookupId),
}

/// State of an iterative find-successor query, carried from one step to the next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessorQuery {
    /// Node running the query.
    pub origin: Did,
    /// Identifier whose successor is searched.
    pub key: Did,
    /// Destination of the answer.
    pub purpose: QueryPurpose,
    /// Nodes that forwarded the query, the origin first.
    pub path: Vec<Did>,
    /// Length of the query path.
    pub hops: i32,
    /// Nodes contacted, retries included.
    pub contacts: i32,
    /// Requests that got no answer.
    pub timeouts: u32,
}

impl SuccessorQuery {
    /// A query started by `origin`, which is the first node of the path.
    pub fn new(origin: Did, key: Did, purpose: QueryPurpose) -> Self {
        Self {
            origin,
            key,
            purpose,
            path: vec![origin],
            hops: 0,
            contacts: 0,
            timeouts: 0,
        }
    }
}

/// Answer of a node asked for the successor of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessorAnswer {
    /// The owner of the key, or a closer node to ask.
    pub next: Did,
    /// True if `next` owns the key.
    pub owner: bool,
}

/// Local continuation: ask `target` for the successor of `query.key`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindSuccessorStep {
    /// Query state.
    pub query: SuccessorQuery,
    /// Node to contact.
    pub target: Did,
}

/// Local continuation: the answer of `source`, None if it never came.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessSuccResponse {
    /// Query state.
    pub query: SuccessorQuery,
    /// Node that was contacted.
    pub source: Did,
    /// Its answer.
    pub answer: Option<SuccessorAnswer>,
}

/// Local continuation: a stabilization round contacting the successor at index `retry`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stabilize {
    /// Index in the successor list of the node to contact.
    pub retry: usize,
}

/// Local continuation: `answering` replied to a stabilization round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StabilizationStep {
    /// Successor that replied.
    pub answering: Did,
    /// Its predecessor when it replied.
    pub predecessor: Option<Did>,
}

/// Local continuation: the successor list of `responder`, which accepted a stabilization request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessStabResponse {
    /// First successor that answered.
    pub responder: Did,
    /// Its successor list when it answered.
    pub successors: Vec<Did>,
}

/// Local continuation: the predecessor did not answer a liveness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredecessorTimeout {
    /// Predecessor observed down.
    pub suspect: Did,
}

/// Local continuation of a leaving node: every handoff has landed, clear all structures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearAll;

/// Remote message: `candidate` claims to be the predecessor of the receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifiedPredecessor {
    /// Node claiming to precede the receiver.
    pub candidate: Did,
}

/// Remote message: the first successor of the receiver is now `successor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetNewSuccessor {
    /// New first successor.
    pub successor: Did,
}

/// Remote message: keys the receiver is now responsible for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewData {
    /// Transferred entries.
    pub data: Vec<(Did, String)>,
}

/// Remote message: forget the predecessor, only if it is `if_equal` when set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetPredecessor {
    /// Predecessor expected to be recorded.
    pub if_equal: Option<Did>,
}

/// Remote message from a leaving predecessor: `predecessor` precedes the receiver now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetPredecessor {
    /// New predecessor.
    pub predecessor: Did,
}

/// Remote message from a leaving successor: drop `departed` and learn its last successor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetLastSuccessor {
    /// Node leaving the ring.
    pub departed: Did,
    /// Last entry of its successor list.
    pub tail: Option<Did>,
}

/// Answer of a lookup reaching the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteLookup {
    /// Tracked lookup.
    pub lookup: LookupId,
    /// Answer of the routing machinery.
    pub resolution: Resolution,
}

/// Which nodes may process a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Own continuation, processed by the incarnation that scheduled it.
    Local,
    /// Sent to a peer, processed while the peer is active.
    Remote,
    /// Data handoff, kept by any ring member, a crashed one included.
    /// A leaving node passes it on to its successor.
    Storage,
    /// Processed by the lookup tracker whatever the state of the requester.
    Tracker,
}

/// A closed set of continuations and messages handled by [Network](crate::network::Network).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Message {
    /// Contact the next node of a query.
    FindSuccessorStep(FindSuccessorStep),
    /// Handle the answer of a query step.
    ProcessSuccResponse(ProcessSuccResponse),
    /// Start a stabilization round.
    Stabilize(Stabilize),
    /// Apply the answer of the first successor.
    StabilizationStep(StabilizationStep),
    /// Merge the successor list of the first successor.
    ProcessStabResponse(ProcessStabResponse),
    /// Predecessor liveness check timed out.
    PredecessorTimeout(PredecessorTimeout),
    /// End of a graceful leave.
    ClearAll(ClearAll),
    /// Stabilization request received by a successor.
    NotifiedPredecessor(NotifiedPredecessor),
    /// First successor handoff.
    SetNewSuccessor(SetNewSuccessor),
    /// Key range handoff.
    NewData(NewData),
    /// Predecessor reset.
    ResetPredecessor(ResetPredecessor),
    /// Predecessor handoff of a leaving node.
    SetPredecessor(SetPredecessor),
    /// Successor handoff of a leaving node.
    SetLastSuccessor(SetLastSuccessor),
    /// Lookup answer.
    CompleteLookup(CompleteLookup),
}

impl Message {
    /// Which nodes may process this message.
    pub fn delivery(&self) -> Delivery {
        match self {
            Message::FindSuccessorStep(_)
            | Message::ProcessSuccResponse(_)
            | Message::Stabilize(_)
            | Message::StabilizationStep(_)
            | Message::ProcessStabResponse(_)
            | Message::PredecessorTimeout(_)
            | Message::ClearAll(_) => Delivery::Local,
            Message::NotifiedPredecessor(_)
            | Message::SetNewSuccessor(_)
            | Message::ResetPredecessor(_)
            | Message::SetPredecessor(_)
            | Message::SetLastSuccessor(_) => Delivery::Remote,
            Message::NewData(_) => Delivery::Storage,
            Message::CompleteLookup(_) => Delivery::Tracker,
        }
    }

    /// Name of the message kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::FindSuccessorStep(_) => "FindSuccessorStep",
            Message::ProcessSuccResponse(_) => "ProcessSuccResponse",
            Message::Stabilize(_) => "Stabilize",
            Message::StabilizationStep(_) => "StabilizationStep",
            Message::ProcessStabResponse(_) => "ProcessStabResponse",
            Message::PredecessorTimeout(_) => "PredecessorTimeout",
            Message::ClearAll(_) => "ClearAll",
            Message::NotifiedPredecessor(_) => "NotifiedPredecessor",
            Message::SetNewSuccessor(_) => "SetNewSuccessor",
            Message::NewData(_) => "NewData",
            Message::ResetPredecessor(_) => "ResetPredecessor",
            Message::SetPredecessor(_) => "SetPredecessor",
            Message::SetLastSuccessor(_) => "SetLastSuccessor",
            Message::CompleteLookup(_) => "CompleteLookup",
        }
    }
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A message in flight, addressed to `target`.
/// Local continuations carry the incarnation of the node that scheduled them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Node processing the message.
    pub target: Did,
    /// Incarnation of `target` when the continuation was scheduled.
    pub incarnation: Option<u64>,
    /// Payload.
    pub message: Message,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_classes() {
        assert_eq!(
            Message::Stabilize(Stabilize { retry: 0 }).delivery(),
            Delivery::Local
        );
        assert_eq!(Message::ClearAll(ClearAll).delivery(), Delivery::Local);
        assert_eq!(
            Message::NotifiedPredecessor(NotifiedPredecessor {
                candidate: Did::from(3u64)
            })
            .delivery(),
            Delivery::Remote
        );
        assert_eq!(
            Message::NewData(NewData { data: vec![] }).delivery(),
            Delivery::Storage
        );
    }

    #[test]
    fn test_message_json_shape() {
        let msg = Message::SetLastSuccessor(SetLastSuccessor {
            departed: Did::from(5u64),
            tail: None,
        });
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"SetLastSuccessor":{"departed":5,"tail":null}}"#);
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }
}
