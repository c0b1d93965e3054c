#![warn(missing_docs)]

//! Identifiers on the ring.
//!
//! A Chord ring of `m` bits holds the integers `[0, 2^m)` arranged on a circle. Both node ids
//! and keys live in that space, so a single [Did] type serves for both. Whether a value is
//! "after" another only makes sense relative to a starting point, hence every routing decision
//! goes through [belongs_to_interval], which walks clockwise from `lo` to `hi`.
//!
//! [IdSpace] carries the ring size and implements the arithmetic that needs it: wrapping
//! addition, finger starts, clockwise distance and SHA-1 key hashing.

use std::str::FromStr;

use num_bigint::BigUint;
use serde::Deserialize;
use serde::Serialize;
use sha1::Digest;
use sha1::Sha1;

use crate::error::Error;
use crate::error::Result;

/// Identifier of a node or a key on the ring.
#[derive(Copy, Clone, Eq, Ord, PartialEq, PartialOrd, Debug, Serialize, Deserialize, Hash)]
pub struct Did(u64);

impl std::fmt::Display for Did {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Did {
    fn from(id: u64) -> Did {
        Did(id)
    }
}

impl From<u32> for Did {
    fn from(id: u32) -> Did {
        Did(id as u64)
    }
}

impl From<Did> for u64 {
    fn from(did: Did) -> u64 {
        did.0
    }
}

impl FromStr for Did {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        s.parse::<u64>()
            .map(Did)
            .map_err(|e| Error::InvalidConfig(format!("bad did {s:?}: {e}")))
    }
}

impl Did {
    /// Raw value of the identifier.
    pub fn value(&self) -> u64 {
        self.0
    }

    /// Shorthand of [belongs_to_interval] with `self` as the value.
    pub fn in_range(&self, lo: Did, hi: Did) -> bool {
        belongs_to_interval(*self, lo, hi)
    }
}

/// Test if `v` lies in the clockwise interval `(lo, hi]`.
///
/// The interval wraps around zero when `lo > hi`. When `lo == hi` it covers the whole ring,
/// which is what a node alone on its ring needs: it owns every key.
pub fn belongs_to_interval(v: Did, lo: Did, hi: Did) -> bool {
    if lo < hi {
        lo < v && v <= hi
    } else if lo > hi {
        v > lo || v <= hi
    } else {
        true
    }
}

/// The ring `[0, 2^bits)`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdSpace {
    bits: u8,
}

impl IdSpace {
    /// Create a ring of `2^bits` identifiers.
    pub fn new(bits: u8) -> Self {
        Self { bits }
    }

    /// Bits of the ring, also the number of finger table entries.
    pub fn bits(&self) -> u8 {
        self.bits
    }

    /// Number of identifiers on the ring.
    pub fn size(&self) -> u64 {
        1u64 << self.bits
    }

    /// Check that a raw value is a valid identifier and wrap it into a [Did].
    pub fn did(&self, value: u64) -> Result<Did> {
        if value < self.size() {
            Ok(Did(value))
        } else {
            Err(Error::DidOutOfRange(value, self.bits))
        }
    }

    /// `(did + offset) mod 2^m`.
    pub fn add(&self, did: Did, offset: u64) -> Did {
        Did((did.0 + offset % self.size()) % self.size())
    }

    /// Start of finger `index` of `did`, that is `did + 2^(index-1) mod 2^m`.
    pub fn finger_start(&self, did: Did, index: u8) -> Did {
        debug_assert!(index >= 1 && index <= self.bits);
        self.add(did, 1u64 << (index - 1))
    }

    /// Clockwise distance walking from `from` to `to`.
    pub fn distance(&self, from: Did, to: Did) -> u64 {
        (to.0 + self.size() - from.0) % self.size()
    }

    /// Hash an arbitrary key onto the ring: SHA-1 of its UTF-8 bytes, modulo `2^m`.
    pub fn hash(&self, key: &str) -> Did {
        let digest = Sha1::digest(key.as_bytes());
        let v = BigUint::from_bytes_be(&digest) % BigUint::from(self.size());
        Did(v.to_u64_digits().first().copied().unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(v: u64) -> Did {
        Did::from(v)
    }

    /// Membership by walking the ring one step at a time.
    fn walk(v: u64, lo: u64, hi: u64, size: u64) -> bool {
        let mut x = (lo + 1) % size;
        loop {
            if x == v {
                return true;
            }
            if x == hi {
                return false;
            }
            x = (x + 1) % size;
        }
    }

    #[test]
    fn test_belongs_to_interval() {
        // (value, lo, hi, expected) on a 4-bit ring
        let table = [
            (2, 14, 3, true),
            (14, 14, 3, false),
            (3, 14, 3, true),
            (15, 14, 3, true),
            (0, 14, 3, true),
            (4, 14, 3, false),
            (5, 3, 8, true),
            (3, 3, 8, false),
            (8, 3, 8, true),
            (9, 3, 8, false),
            (7, 7, 7, true),
            (0, 7, 7, true),
        ];
        for (v, lo, hi, expected) in table {
            assert_eq!(
                belongs_to_interval(d(v), d(lo), d(hi)),
                expected,
                "expect belongs_to_interval({v}, {lo}, {hi}) == {expected}"
            );
        }
    }

    #[test]
    fn test_belongs_to_interval_matches_walk() {
        let size = 16;
        for lo in 0..size {
            for hi in 0..size {
                if lo == hi {
                    continue;
                }
                for v in 0..size {
                    assert_eq!(
                        belongs_to_interval(d(v), d(lo), d(hi)),
                        walk(v, lo, hi, size),
                        "mismatch on ({v}, {lo}, {hi})"
                    );
                }
            }
        }
    }

    #[test]
    fn test_id_space_arithmetic() {
        let space = IdSpace::new(4);
        assert_eq!(space.size(), 16);
        assert_eq!(space.add(d(15), 1), d(0));
        assert_eq!(space.add(d(3), 33), d(4));
        assert_eq!(space.finger_start(d(14), 1), d(15));
        assert_eq!(space.finger_start(d(14), 3), d(2));
        assert_eq!(space.finger_start(d(14), 4), d(6));
        assert_eq!(space.distance(d(14), d(2)), 4);
        assert_eq!(space.distance(d(2), d(14)), 12);
        assert!(space.did(15).is_ok());
        assert!(matches!(space.did(16), Err(Error::DidOutOfRange(16, 4))));
    }

    #[test]
    fn test_hash() {
        assert_eq!(IdSpace::new(4).hash("hello"), d(13));
        assert_eq!(IdSpace::new(10).hash("hello"), d(845));
        assert_eq!(IdSpace::new(10).hash("chord"), d(261));
        assert_eq!(IdSpace::new(8).hash(""), d(9));
    }
}
