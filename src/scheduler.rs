//! Cooperative, single-threaded scheduling of delayed continuations.
//!
//! A `Scheduler` holds payloads that should run after a delay. It never runs
//! anything itself: the owner pulls due payloads with `pop_due` and executes
//! them on its own thread, so continuations can never overlap each other or a
//! direct input handler.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Handle returned by `Scheduler::schedule_after`, used to cancel one entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

/// A queue of delayed continuations driven by an explicit clock.
pub trait Scheduler<T> {
    /// Current clock value in milliseconds.
    fn now_ms(&self) -> u64;

    /// Queues `payload` to become due `delay_ms` after the current clock.
    fn schedule_after(&mut self, delay_ms: u64, payload: T) -> TimerHandle;

    /// Drops one pending entry. Returns false if it already ran or was cancelled.
    fn cancel(&mut self, handle: TimerHandle) -> bool;

    /// Drops every pending entry.
    fn cancel_all(&mut self);

    /// Number of entries still waiting.
    fn pending(&self) -> usize;

    /// Milliseconds until the earliest pending entry is due, if any.
    fn next_due_in(&self) -> Option<u64>;

    /// Removes and returns the earliest entry due at or before `until_ms`,
    /// moving the clock forward to its due time. Entries with equal due times
    /// come out in the order they were scheduled.
    fn pop_due(&mut self, until_ms: u64) -> Option<T>;

    /// Moves the clock forward to `until_ms`. Never moves it backwards.
    fn advance_to(&mut self, until_ms: u64);
}

struct Entry<T> {
    due_ms: u64,
    seq: u64,
    payload: T,
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.due_ms == other.due_ms && self.seq == other.seq
    }
}

impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Entry<T> {
    // Reversed so the max-heap yields the earliest (due, seq) first.
    fn cmp(&self, other: &Self) -> Ordering {
        (other.due_ms, other.seq).cmp(&(self.due_ms, self.seq))
    }
}

/// A deterministic scheduler whose clock only moves when told to.
///
/// Used directly by tests and simulations; an interactive front-end sleeps
/// for `next_due_in` of real time and then advances the clock by the same
/// amount.
pub struct VirtualScheduler<T> {
    now_ms: u64,
    next_seq: u64,
    queue: BinaryHeap<Entry<T>>,
}

impl<T> VirtualScheduler<T> {
    pub fn new() -> Self {
        VirtualScheduler {
            now_ms: 0,
            next_seq: 0,
            queue: BinaryHeap::new(),
        }
    }
}

impl<T> Default for VirtualScheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Scheduler<T> for VirtualScheduler<T> {
    fn now_ms(&self) -> u64 {
        self.now_ms
    }

    fn schedule_after(&mut self, delay_ms: u64, payload: T) -> TimerHandle {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(Entry {
            due_ms: self.now_ms + delay_ms,
            seq,
            payload,
        });
        TimerHandle(seq)
    }

    fn cancel(&mut self, handle: TimerHandle) -> bool {
        let before = self.queue.len();
        self.queue.retain(|entry| entry.seq != handle.0);
        self.queue.len() != before
    }

    fn cancel_all(&mut self) {
        self.queue.clear();
    }

    fn pending(&self) -> usize {
        self.queue.len()
    }

    fn next_due_in(&self) -> Option<u64> {
        self.queue
            .peek()
            .map(|entry| entry.due_ms.saturating_sub(self.now_ms))
    }

    fn pop_due(&mut self, until_ms: u64) -> Option<T> {
        if self.queue.peek()?.due_ms > until_ms {
            return None;
        }
        let entry = self.queue.pop()?;
        self.now_ms = self.now_ms.max(entry.due_ms);
        Some(entry.payload)
    }

    fn advance_to(&mut self, until_ms: u64) {
        self.now_ms = self.now_ms.max(until_ms);
    }
}
