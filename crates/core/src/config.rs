//! Protocol parameters shared by every node of a [Network](crate::network::Network).

use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::consts::*;
use crate::error::Error;
use crate::error::Result;

/// Parameters of the Chord protocol and of the simulated links.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ChordConfig {
    /// The ring has `2^hash_bits` identifiers.
    pub hash_bits: u8,
    /// Max length of every successor list.
    pub successors_size: usize,
    pub mean_packet_delay_ms: u64,
    pub max_packet_delay_ms: u64,
    pub stabilize_offset_ms: u64,
    pub stabilize_amplitude_ms: u64,
    /// Upper bound of nodes a single find-successor query may contact.
    pub max_lookup_contacts: u32,
}

impl Default for ChordConfig {
    fn default() -> Self {
        Self {
            hash_bits: DEFAULT_HASH_BITS,
            successors_size: DEFAULT_SUCCESSORS_SIZE,
            mean_packet_delay_ms: DEFAULT_MEAN_PACKET_DELAY_MS,
            max_packet_delay_ms: DEFAULT_MAX_PACKET_DELAY_MS,
            stabilize_offset_ms: DEFAULT_STABILIZE_OFFSET_MS,
            stabilize_amplitude_ms: DEFAULT_STABILIZE_AMPLITUDE_MS,
            max_lookup_contacts: DEFAULT_MAX_LOOKUP_CONTACTS,
        }
    }
}

impl ChordConfig {
    /// Reject parameters the protocol cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.hash_bits == 0 || self.hash_bits > MAX_HASH_BITS {
            return Err(Error::InvalidConfig(format!(
                "hash_bits must be in 1..={}, got {}",
                MAX_HASH_BITS, self.hash_bits
            )));
        }
        if self.successors_size == 0 {
            return Err(Error::InvalidConfig(
                "successors_size must be at least 1".to_string(),
            ));
        }
        if self.mean_packet_delay_ms == 0 || self.max_packet_delay_ms == 0 {
            return Err(Error::InvalidConfig(
                "packet delays must be positive".to_string(),
            ));
        }
        if self.mean_packet_delay_ms > self.max_packet_delay_ms {
            return Err(Error::InvalidConfig(format!(
                "mean_packet_delay_ms {} exceeds max_packet_delay_ms {}",
                self.mean_packet_delay_ms, self.max_packet_delay_ms
            )));
        }
        if self.max_packet_delay_ms >= self.stabilize_offset_ms {
            return Err(Error::InvalidConfig(format!(
                "max_packet_delay_ms {} must be smaller than stabilize_offset_ms {}",
                self.max_packet_delay_ms, self.stabilize_offset_ms
            )));
        }
        if self.max_lookup_contacts == 0 {
            return Err(Error::InvalidConfig(
                "max_lookup_contacts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn max_packet_delay(&self) -> Duration {
        Duration::from_millis(self.max_packet_delay_ms)
    }

    /// Longest time between two stabilization rounds of one node.
    pub fn stabilize_period(&self) -> Duration {
        Duration::from_millis(self.stabilize_offset_ms + self.stabilize_amplitude_ms)
    }
}
