//! Simulated time and cancellable deferred callbacks.
//!
//! Every timer-driven subsystem owns one [`Scheduler`]. The scheduler is the
//! only place a pending timer lives, so tearing a subsystem down is a single
//! [`Scheduler::cancel_all`] call and nothing can fire afterwards.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Milliseconds of simulated show time.
pub type Millis = u64;

/// Monotonic simulated clock shared by every subsystem of a show.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackClock {
    now_ms: Millis,
}

impl PlaybackClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Millis {
        self.now_ms
    }

    pub fn reset(&mut self) {
        self.now_ms = 0;
    }

    pub fn advance(&mut self, delta: Millis) {
        self.now_ms = self.now_ms.saturating_add(delta);
    }

    /// Moves the clock forward to `target`. Earlier targets are ignored.
    pub fn advance_to(&mut self, target: Millis) {
        self.now_ms = self.now_ms.max(target);
    }
}

/// Identity of a scheduled timer. Ids are never reused within a scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimerId(u64);

/// A timer that came due and was removed from its scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledEvent<T> {
    pub id: TimerId,
    pub due_ms: Millis,
    pub payload: T,
}

/// Registry of pending deferred callbacks for one subsystem.
///
/// Entries are ordered by due time and then by id, so timers that share a
/// due time fire in the order they were scheduled.
#[derive(Debug)]
pub struct Scheduler<T> {
    pending: BTreeMap<(Millis, TimerId), T>,
    next_id: u64,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self {
            pending: BTreeMap::new(),
            next_id: 0,
        }
    }
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `payload` to fire at `now + delay`.
    pub fn schedule(&mut self, now: Millis, delay: Millis, payload: T) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.pending.insert((now.saturating_add(delay), id), payload);
        id
    }

    /// Defuses a single timer. Returns `false` when it already fired or was
    /// cancelled before.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        let key = self.pending.keys().find(|(_, candidate)| *candidate == id).copied();
        match key {
            Some(key) => self.pending.remove(&key).is_some(),
            None => false,
        }
    }

    /// Defuses every pending timer and returns how many were dropped.
    pub fn cancel_all(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        dropped
    }

    pub fn next_due(&self) -> Option<Millis> {
        self.pending.keys().next().map(|(due, _)| *due)
    }

    /// Removes and returns the earliest timer whose due time is `<= now`.
    pub fn pop_due(&mut self, now: Millis) -> Option<ScheduledEvent<T>> {
        let (due_ms, id) = *self.pending.keys().next()?;
        if due_ms > now {
            return None;
        }
        let payload = self.pending.remove(&(due_ms, id))?;
        Some(ScheduledEvent {
            id,
            due_ms,
            payload,
        })
    }

    pub fn is_scheduled(&self, id: TimerId) -> bool {
        self.pending.keys().any(|(_, candidate)| *candidate == id)
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_never_moves_backwards() {
        let mut clock = PlaybackClock::new();
        clock.advance(250);
        clock.advance_to(100);
        assert_eq!(clock.now(), 250);
        clock.advance_to(400);
        assert_eq!(clock.now(), 400);
        clock.reset();
        assert_eq!(clock.now(), 0);
    }

    #[test]
    fn pops_in_due_then_insertion_order() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule(0, 200, "late");
        scheduler.schedule(0, 100, "first");
        scheduler.schedule(0, 100, "second");

        assert_eq!(scheduler.next_due(), Some(100));
        assert!(scheduler.pop_due(99).is_none());
        assert_eq!(scheduler.pop_due(100).unwrap().payload, "first");
        assert_eq!(scheduler.pop_due(100).unwrap().payload, "second");
        assert!(scheduler.pop_due(150).is_none());
        let late = scheduler.pop_due(500).unwrap();
        assert_eq!(late.payload, "late");
        assert_eq!(late.due_ms, 200);
        assert!(scheduler.is_empty());
    }

    #[test]
    fn cancelled_timers_never_fire() {
        let mut scheduler = Scheduler::new();
        let keep = scheduler.schedule(0, 10, 1);
        let drop = scheduler.schedule(0, 5, 2);

        assert!(scheduler.cancel(drop));
        assert!(!scheduler.cancel(drop));
        assert!(scheduler.is_scheduled(keep));
        assert_eq!(scheduler.pop_due(100).unwrap().payload, 1);
        assert!(scheduler.pop_due(100).is_none());
    }

    #[test]
    fn cancel_all_leaves_nothing_pending() {
        let mut scheduler = Scheduler::new();
        for delay in 0..5 {
            scheduler.schedule(0, delay, ());
        }
        assert_eq!(scheduler.cancel_all(), 5);
        assert_eq!(scheduler.pending(), 0);
        assert!(scheduler.next_due().is_none());

        let id = scheduler.schedule(0, 1, ());
        assert_eq!(id, TimerId(5));
    }
}
