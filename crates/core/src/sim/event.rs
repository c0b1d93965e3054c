//! A min-heap of items keyed by virtual time.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::Duration;

use rand::Rng;
use rand::SeedableRng;
use rand_hc::Hc128Rng;
use serde::Deserialize;
use serde::Serialize;

use super::Scheduler;
use super::Timestamp;

/// Order of items scheduled for the same timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// First scheduled, first delivered.
    #[default]
    Fifo,
    /// Last scheduled, first delivered.
    Lifo,
    /// Seeded random order.
    Shuffled(u64),
}

/// Monotonic counter breaking ties among items of equal time and key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct SequenceNumber(u64);

impl SequenceNumber {
    fn next(&mut self) -> SequenceNumber {
        let current = *self;
        self.0 += 1;
        current
    }
}

/// An item waiting in the queue.
#[derive(Debug)]
pub struct ScheduledEvent<T> {
    pub time: Timestamp,
    key: u64,
    seq: SequenceNumber,
    pub item: T,
}

impl<T> PartialEq for ScheduledEvent<T> {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.key == other.key && self.seq == other.seq
    }
}

impl<T> Eq for ScheduledEvent<T> {}

impl<T> PartialOrd for ScheduledEvent<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for ScheduledEvent<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap, the earliest item must compare greatest.
        (other.time, other.key, other.seq).cmp(&(self.time, self.key, self.seq))
    }
}

/// Discrete-event queue, the [Scheduler] of a [Network](crate::network::Network).
#[derive(Debug)]
pub struct EventQueue<T> {
    now: Timestamp,
    heap: BinaryHeap<ScheduledEvent<T>>,
    seq: SequenceNumber,
    tie_break: TieBreak,
    rng: Option<Hc128Rng>,
}

impl<T> Default for EventQueue<T> {
    fn default() -> Self {
        Self::new(TieBreak::default())
    }
}

impl<T> EventQueue<T> {
    pub fn new(tie_break: TieBreak) -> Self {
        let rng = match tie_break {
            TieBreak::Shuffled(seed) => Some(Hc128Rng::seed_from_u64(seed)),
            _ => None,
        };
        Self {
            now: Timestamp::ZERO,
            heap: BinaryHeap::new(),
            seq: SequenceNumber::default(),
            tie_break,
            rng,
        }
    }

    pub fn tie_break(&self) -> TieBreak {
        self.tie_break
    }

    /// Deliver `item` at the absolute time `at`, never earlier than now.
    pub fn schedule_at(&mut self, at: Timestamp, item: T) {
        let time = at.max(self.now);
        let seq = self.seq.next();
        let key = match (self.tie_break, self.rng.as_mut()) {
            (TieBreak::Lifo, _) => u64::MAX - seq.0,
            (TieBreak::Shuffled(_), Some(rng)) => rng.gen(),
            _ => seq.0,
        };
        self.heap.push(ScheduledEvent {
            time,
            key,
            seq,
            item,
        });
    }

    /// Move the clock forward to `at` without delivering anything.
    /// Pending items earlier than `at` keep their time and fire next.
    pub fn advance_to(&mut self, at: Timestamp) {
        let limit = self.peek_time().map(|t| t.min(at)).unwrap_or(at);
        self.now = self.now.max(limit);
    }

    /// Drop every pending item, the clock is kept.
    pub fn clear(&mut self) {
        self.heap.clear();
    }
}

impl<T> Scheduler<T> for EventQueue<T> {
    fn now(&self) -> Timestamp {
        self.now
    }

    fn schedule_after(&mut self, delay: Duration, item: T) {
        let at = self.now + delay;
        self.schedule_at(at, item);
    }

    fn pop(&mut self) -> Option<(Timestamp, T)> {
        let ev = self.heap.pop()?;
        self.now = ev.time;
        Some((ev.time, ev.item))
    }

    fn peek_time(&self) -> Option<Timestamp> {
        self.heap.peek().map(|ev| ev.time)
    }

    fn len(&self) -> usize {
        self.heap.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn drain(queue: &mut EventQueue<&'static str>) -> Vec<&'static str> {
        let mut out = vec![];
        while let Some((_, item)) = queue.pop() {
            out.push(item);
        }
        out
    }

    #[test]
    fn test_earliest_first() {
        let mut queue = EventQueue::default();
        queue.schedule_after(ms(10), "c");
        queue.schedule_after(ms(5), "b");
        queue.schedule_after(ms(1), "a");
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.peek_time(), Some(Timestamp::from_millis(1)));
        assert_eq!(queue.pop(), Some((Timestamp::from_millis(1), "a")));
        assert_eq!(queue.now(), Timestamp::from_millis(1));

        println!("delays are relative to the advanced clock");
        queue.schedule_after(ms(2), "a2");
        assert_eq!(drain(&mut queue), vec!["a2", "b", "c"]);
        assert_eq!(queue.now(), Timestamp::from_millis(10));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_same_time_order() {
        let mut queue = EventQueue::new(TieBreak::Fifo);
        for item in ["a", "b", "c"] {
            queue.schedule_after(ms(5), item);
        }
        assert_eq!(drain(&mut queue), vec!["a", "b", "c"]);

        let mut queue = EventQueue::new(TieBreak::Lifo);
        for item in ["a", "b", "c"] {
            queue.schedule_after(ms(5), item);
        }
        queue.schedule_after(ms(1), "first");
        assert_eq!(drain(&mut queue), vec!["first", "c", "b", "a"]);
    }

    #[test]
    fn test_shuffled_is_reproducible() {
        let items = ["a", "b", "c", "d", "e", "f", "g", "h"];
        let run = |seed| {
            let mut queue = EventQueue::new(TieBreak::Shuffled(seed));
            for item in items {
                queue.schedule_after(ms(7), item);
            }
            queue.schedule_after(ms(3), "early");
            drain(&mut queue)
        };
        let first = run(42);
        assert_eq!(first, run(42));
        assert_eq!(first[0], "early");
        let mut sorted = first[1..].to_vec();
        sorted.sort();
        assert_eq!(sorted, items.to_vec());
    }

    #[test]
    fn test_advance_to_never_skips_pending_items() {
        let mut queue = EventQueue::default();
        queue.advance_to(Timestamp::from_millis(40));
        assert_eq!(queue.now(), Timestamp::from_millis(40));
        queue.schedule_after(ms(10), "a");
        queue.advance_to(Timestamp::from_millis(100));
        assert_eq!(queue.now(), Timestamp::from_millis(50));
        assert_eq!(queue.pop(), Some((Timestamp::from_millis(50), "a")));
    }

    #[test]
    fn test_schedule_in_the_past_fires_now() {
        let mut queue = EventQueue::default();
        queue.schedule_after(ms(10), "a");
        queue.pop();
        queue.schedule_at(Timestamp::from_millis(3), "late");
        assert_eq!(queue.pop(), Some((Timestamp::from_millis(10), "late")));
    }
}
