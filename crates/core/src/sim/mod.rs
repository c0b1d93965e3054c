//! Virtual time and the collaborators that deliver delayed continuations.
//!
//! Nothing here knows about Chord. [EventQueue] orders opaque items by virtual time and
//! [DelayModel] samples link latencies, the [Network](crate::network::Network) wires both
//! together.

pub mod delay;
pub mod event;

use std::fmt;
use std::ops::Add;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

pub use self::delay::ConstantDelay;
pub use self::delay::DelayModel;
pub use self::delay::ExponentialDelay;
pub use self::event::EventQueue;
pub use self::event::TieBreak;

/// A point of virtual time, in milliseconds since the simulation started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Start of the simulation.
    pub const ZERO: Timestamp = Timestamp(0);

    #[inline]
    pub const fn from_millis(ms: u64) -> Self {
        Timestamp(ms)
    }

    #[inline]
    pub const fn as_millis(self) -> u64 {
        self.0
    }

    /// Time elapsed since `earlier`, zero if `earlier` is in the future.
    pub fn saturating_since(self, earlier: Timestamp) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }
}

impl Add<Duration> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: Duration) -> Timestamp {
        let ms = u64::try_from(rhs.as_millis()).unwrap_or(u64::MAX);
        Timestamp(self.0.saturating_add(ms))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// The clock and the delayed delivery of continuations.
/// A scheduled item fires exactly once, there is no cancellation.
pub trait Scheduler<T> {
    /// Current virtual time.
    fn now(&self) -> Timestamp;

    /// Deliver `item` once `delay` has elapsed.
    fn schedule_after(&mut self, delay: Duration, item: T);

    /// Advance the clock to the earliest pending item and return it.
    fn pop(&mut self) -> Option<(Timestamp, T)>;

    /// Time of the earliest pending item.
    fn peek_time(&self) -> Option<Timestamp>;

    /// Number of pending items.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_arithmetic() {
        let t = Timestamp::from_millis(100);
        assert_eq!(t + Duration::from_millis(50), Timestamp::from_millis(150));
        assert_eq!(
            Timestamp::from_millis(150).saturating_since(t),
            Duration::from_millis(50)
        );
        assert_eq!(t.saturating_since(Timestamp::from_millis(150)), Duration::ZERO);
        assert_eq!(
            Timestamp::from_millis(u64::MAX) + Duration::from_millis(1),
            Timestamp::from_millis(u64::MAX)
        );
        assert_eq!(t.to_string(), "100ms");
    }
}
