//! Constant variables.

/// Bits of the identifier space, the ring has `2^m` slots.
pub const DEFAULT_HASH_BITS: u8 = 10;
/// Max length of a successor list.
pub const DEFAULT_SUCCESSORS_SIZE: usize = 4;
/// Mean of one-way packet delay in ms.
pub const DEFAULT_MEAN_PACKET_DELAY_MS: u64 = 50;
/// Upper bound of one-way packet delay in ms. A timeout costs exactly this.
pub const DEFAULT_MAX_PACKET_DELAY_MS: u64 = 500;
/// Fixed part of the stabilization period in ms.
pub const DEFAULT_STABILIZE_OFFSET_MS: u64 = 1000;
/// Random part of the stabilization period in ms, drawn from `0..=amplitude`.
pub const DEFAULT_STABILIZE_AMPLITUDE_MS: u64 = 2000;
/// A find-successor query gives up after contacting this many nodes.
pub const DEFAULT_MAX_LOOKUP_CONTACTS: u32 = 1024;
/// Largest supported ring.
pub const MAX_HASH_BITS: u8 = 32;
