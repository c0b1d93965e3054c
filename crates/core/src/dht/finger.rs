#![warn(missing_docs)]
use std::ops::Index;

use serde::Deserialize;
use serde::Serialize;

use crate::dht::Did;

/// Finger table of Chord DHT.
/// Entry `i` (for `1 <= i <= m`) points to the first node at or after `did + 2^(i-1)`.
/// Entry 1 mirrors the first successor of the node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerTable {
    did: Did,
    size: u8,
    finger: Vec<Option<Did>>,
}

impl FingerTable {
    /// builder
    pub fn new(did: Did, size: u8) -> Self {
        Self {
            did,
            size,
            finger: vec![None; size as usize],
        }
    }

    /// is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the entry with the lowest index.
    pub fn first(&self) -> Option<Did> {
        self.finger.iter().flatten().next().copied()
    }

    /// getter, index starts from 1
    pub fn get(&self, index: u8) -> &Option<Did> {
        if index == 0 || index > self.size {
            return &None;
        }
        &self.finger[index as usize - 1]
    }

    /// setter, refuses indices outside `1..=m`
    pub fn set(&mut self, index: u8, did: Did) -> bool {
        if index == 0 || index > self.size {
            return false;
        }
        self.finger[index as usize - 1] = Some(did);
        true
    }

    /// Clear one entry and return what it held.
    pub fn remove(&mut self, index: u8) -> Option<Did> {
        if index == 0 || index > self.size {
            return None;
        }
        self.finger[index as usize - 1].take()
    }

    /// Clear every entry pointing to `did`, returns how many were cleared.
    pub fn remove_all(&mut self, did: Did) -> usize {
        let mut count = 0;
        for item in self.finger.iter_mut() {
            if *item == Some(did) {
                *item = None;
                count += 1;
            }
        }
        count
    }

    /// Clear the whole table.
    pub fn clear(&mut self) {
        self.finger.iter_mut().for_each(|x| *x = None);
    }

    /// Indices holding an entry, lowest first.
    pub fn keys_ascending(&self) -> Vec<u8> {
        (1..=self.size).filter(|i| self.get(*i).is_some()).collect()
    }

    /// Indices holding an entry, highest first.
    pub fn keys_descending(&self) -> Vec<u8> {
        (1..=self.size)
            .rev()
            .filter(|i| self.get(*i).is_some())
            .collect()
    }

    /// Smallest unset index, or `m + 1` when the table is full.
    pub fn first_missing_index(&self) -> u8 {
        (1..=self.size)
            .find(|i| self.get(*i).is_none())
            .unwrap_or(self.size + 1)
    }

    /// Check finger is contains some node
    pub fn contains(&self, did: Did) -> bool {
        self.finger.contains(&Some(did))
    }

    /// The did owning this table.
    pub fn did(&self) -> Did {
        self.did
    }

    /// Number of entries the table can hold, which is `m`.
    pub fn size(&self) -> u8 {
        self.size
    }

    /// get length of finger
    pub fn len(&self) -> usize {
        self.finger.iter().flatten().count()
    }

    /// get finger list, position `i` holds index `i + 1`
    pub fn list(&self) -> &Vec<Option<Did>> {
        &self.finger
    }
}

impl Index<u8> for FingerTable {
    type Output = Option<Did>;
    fn index(&self, index: u8) -> &Self::Output {
        self.get(index)
    }
}
