//! Chordsim: a Chord DHT protocol engine driven by virtual time.
//! --------------
//! - [Chord](crate::dht::PeerRing) holds the routing state of one ring member: finger table,
//!   successor list and predecessor.
//! - [Network](crate::network::Network) is an arena of nodes addressed by [Did](crate::dht::Did).
//!   Every cross-node interaction is a typed [Message](crate::message::Message) delivered by the
//!   [EventQueue](crate::sim::EventQueue) after a sampled delay.
//! - [LookupTracker](crate::lookup::LookupTracker) records every lookup end-to-end and classifies
//!   its outcome against the ground truth of the ring.
//! - [Membership](crate::membership::Membership) is the interface an external driver uses to make
//!   nodes create, join, leave, crash, recover and look up keys.
//!
//! # Messages
//!
//! A message is modeled in two halves. The response of the target is computed synchronously
//! against its state at send time, then the continuation of the caller is scheduled at
//! `now + delay`. When that continuation runs, the target may have changed again, so handlers
//! re-check membership before they commit a peer into routing tables.
//!
//! A peer that has crashed or left never answers. The caller only observes that the maximum
//! delay elapsed, which is indistinguishable from a slow link.
//!
//! # Lifecycle
//!
//! ```txt
//! Unsubscribed -> Joining -> Active <-> Crashed
//!                              |
//!                              v
//!                           Leaving -> Cleared
//! ```
//!
//! `create` bootstraps a ring (`Unsubscribed -> Active`), cleared nodes may join again.

pub mod config;
pub mod consts;
pub mod dht;
pub mod error;
pub mod inspect;
pub mod lookup;
pub mod membership;
pub mod message;
pub mod network;
pub mod node;
pub mod sim;
pub mod storage;

#[cfg(test)]
mod tests;

pub use config::ChordConfig;
pub use dht::Did;
pub use membership::Membership;
pub use network::Network;
pub use network::NetworkBuilder;
