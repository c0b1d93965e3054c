//! Error of chordsim_core

use crate::dht::Did;
use crate::lookup::LookupId;
use crate::node::NodeState;

/// A wrap `Result` contains custom errors.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors collections in chordsim-core.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Did {0} is out of a ring of {1} bits")]
    DidOutOfRange(u64, u8),

    #[error("Node {0} not found")]
    NodeNotFound(Did),

    #[error("Node {0} already exists")]
    NodeAlreadyExists(Did),

    #[error("Node {did} cannot {op} while {state:?}")]
    InvalidTransition {
        did: Did,
        op: &'static str,
        state: NodeState,
    },

    #[error("Seed {0} is not an active ring member")]
    InvalidSeed(Did),

    #[error("Lookup {0} not found")]
    LookupNotFound(LookupId),

    #[error("Lookup {0} was already completed")]
    LookupAlreadyCompleted(LookupId),

    #[error("Ring has no active node")]
    EmptyRing,

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
}
