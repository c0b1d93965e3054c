//! End-to-end record of every lookup, classified against the ground truth of the ring.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::dht::Did;
use crate::error::Error;
use crate::error::Result;
use crate::sim::Timestamp;

/// Index of a lookup in its [LookupTracker].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LookupId(u64);

impl LookupId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for LookupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What the routing machinery answered. Negative `hops` or `contacts` mean the query
/// exhausted its path and found nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub owner: Did,
    pub hops: i32,
    pub timeouts: u32,
    pub contacts: i32,
}

impl Resolution {
    pub fn failed(origin: Did, timeouts: u32) -> Self {
        Self {
            owner: origin,
            hops: -1,
            timeouts,
            contacts: -1,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.hops < 0 || self.contacts < 0
    }
}

/// State of the resolved owner when the answer reached the requester.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OwnerObservation {
    /// First active node at or after the key, at completion time.
    pub current_owner: Option<Did>,
    pub key_present: bool,
    pub owner_crashed: bool,
}

/// Filled in once, when the lookup completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupOutcome {
    pub resolution: Resolution,
    pub completed_at: Timestamp,
    pub owner_correct: bool,
    pub key_present: bool,
    pub owner_crashed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lookup {
    pub id: LookupId,
    pub requester: Did,
    pub key: Did,
    /// Ground truth at issue time.
    pub expected_owner: Option<Did>,
    pub issued_at: Timestamp,
    pub outcome: Option<LookupOutcome>,
}

impl Lookup {
    pub fn is_complete(&self) -> bool {
        self.outcome.is_some()
    }

    /// A right owner, or a crashed owner that still holds the key.
    pub fn succeeded(&self) -> bool {
        self.outcome
            .as_ref()
            .map(|o| o.owner_correct || (o.key_present && o.owner_crashed))
            .unwrap_or(false)
    }

    pub fn report(&self) -> LookupReport {
        match &self.outcome {
            Some(o) => LookupReport {
                completed: true,
                duration_ms: o
                    .completed_at
                    .as_millis()
                    .saturating_sub(self.issued_at.as_millis()),
                owner_correct: o.owner_correct,
                key_present: o.key_present,
                owner_crashed: o.owner_crashed,
                hop_count: o.resolution.hops,
                timeout_count: o.resolution.timeouts,
                contact_count: o.resolution.contacts,
            },
            None => LookupReport::default(),
        }
    }
}

/// One exported row per lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LookupReport {
    pub completed: bool,
    pub duration_ms: u64,
    pub owner_correct: bool,
    pub key_present: bool,
    pub owner_crashed: bool,
    pub hop_count: i32,
    pub timeout_count: u32,
    pub contact_count: i32,
}

/// Aggregate view of a set of lookups.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LookupSummary {
    pub issued: usize,
    pub completed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub mean_hops: f64,
    pub mean_duration_ms: f64,
}

/// Append-only log of lookups. A record is never changed after completion.
#[derive(Debug, Clone, Default)]
pub struct LookupTracker {
    lookups: Vec<Lookup>,
}

impl LookupTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(
        &mut self,
        key: Did,
        requester: Did,
        issued_at: Timestamp,
        expected_owner: Option<Did>,
    ) -> LookupId {
        let id = LookupId(self.lookups.len() as u64);
        self.lookups.push(Lookup {
            id,
            requester,
            key,
            expected_owner,
            issued_at,
            outcome: None,
        });
        id
    }

    pub fn complete(
        &mut self,
        id: LookupId,
        resolution: Resolution,
        observation: OwnerObservation,
        completed_at: Timestamp,
    ) -> Result<&Lookup> {
        let lookup = self
            .lookups
            .get_mut(id.0 as usize)
            .ok_or(Error::LookupNotFound(id))?;
        if lookup.outcome.is_some() {
            return Err(Error::LookupAlreadyCompleted(id));
        }
        let outcome = if resolution.is_failure() {
            LookupOutcome {
                resolution,
                completed_at,
                owner_correct: false,
                key_present: false,
                owner_crashed: false,
            }
        } else {
            LookupOutcome {
                resolution,
                completed_at,
                owner_correct: lookup.expected_owner == Some(resolution.owner)
                    || observation.current_owner == Some(resolution.owner),
                key_present: observation.key_present,
                owner_crashed: observation.owner_crashed,
            }
        };
        lookup.outcome = Some(outcome);
        Ok(lookup)
    }

    pub fn get(&self, id: LookupId) -> Option<&Lookup> {
        self.lookups.get(id.0 as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Lookup> {
        self.lookups.iter()
    }

    pub fn len(&self) -> usize {
        self.lookups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lookups.is_empty()
    }

    pub fn pending(&self) -> usize {
        self.lookups.iter().filter(|l| !l.is_complete()).count()
    }

    pub fn summary(&self) -> LookupSummary {
        let completed: Vec<&Lookup> = self.lookups.iter().filter(|l| l.is_complete()).collect();
        let resolved: Vec<LookupReport> = completed
            .iter()
            .map(|l| l.report())
            .filter(|r| r.hop_count >= 0)
            .collect();
        let mean = |total: f64| {
            if resolved.is_empty() {
                0.0
            } else {
                total / resolved.len() as f64
            }
        };
        LookupSummary {
            issued: self.lookups.len(),
            completed: completed.len(),
            succeeded: completed.iter().filter(|l| l.succeeded()).count(),
            failed: completed.len() - resolved.len(),
            mean_hops: mean(resolved.iter().map(|r| r.hop_count as f64).sum()),
            mean_duration_ms: mean(resolved.iter().map(|r| r.duration_ms as f64).sum()),
        }
    }
}
