//! Cancellable Timer Scheduler
//!
//! Delayed effects (stage auto-advance, message expiry) are queued here and
//! drained in time order on the same timeline as input events. Every timer
//! belongs to a [`Generation`]; retiring a generation drops all of its
//! pending timers at once, so an effect from a finished session can never
//! fire into a newer one. Only open generations are tracked, so bookkeeping
//! stays bounded however many sessions come and go.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashSet};

use tracing::debug;

/// Epoch a timer belongs to (a quest session, a level run)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Generation(u64);

/// Handle for cancelling a single timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

#[derive(Debug)]
struct Entry<E> {
    due_ms: u64,
    id: TimerId,
    generation: Generation,
    effect: E,
}

// Ordering: (due_ms ASC, id ASC). Timers due at the same instant fire in
// the order they were scheduled.
impl<E> PartialEq for Entry<E> {
    fn eq(&self, other: &Self) -> bool {
        self.due_ms == other.due_ms && self.id == other.id
    }
}

impl<E> Eq for Entry<E> {}

impl<E> PartialOrd for Entry<E> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<E> Ord for Entry<E> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.due_ms
            .cmp(&other.due_ms)
            .then_with(|| self.id.0.cmp(&other.id.0))
    }
}

/// A timer that came due
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fired<E> {
    pub id: TimerId,
    pub generation: Generation,
    pub due_ms: u64,
    pub effect: E,
}

pub struct Scheduler<E> {
    queue: BinaryHeap<Reverse<Entry<E>>>,
    cancelled: HashSet<TimerId>,
    open: HashSet<Generation>,
    next_id: u64,
    next_generation: u64,
}

impl<E> Scheduler<E> {
    pub fn new() -> Self {
        Self {
            queue: BinaryHeap::new(),
            cancelled: HashSet::new(),
            open: HashSet::new(),
            next_id: 0,
            next_generation: 0,
        }
    }

    /// Open a fresh generation
    pub fn begin_generation(&mut self) -> Generation {
        self.next_generation += 1;
        let generation = Generation(self.next_generation);
        self.open.insert(generation);
        generation
    }

    /// Drop every pending timer of a generation. Later timers scheduled
    /// into it never fire.
    pub fn retire(&mut self, generation: Generation) {
        if !self.open.remove(&generation) {
            return;
        }
        let cancelled = &mut self.cancelled;
        self.queue.retain(|Reverse(entry)| {
            if entry.generation != generation {
                return true;
            }
            cancelled.remove(&entry.id);
            false
        });
        debug!("Retired timer generation {:?}", generation);
    }

    pub fn is_retired(&self, generation: Generation) -> bool {
        !self.open.contains(&generation)
    }

    /// Queue an effect to fire at `due_ms`. Into a retired generation this
    /// is a no-op that still hands out an id.
    pub fn schedule(&mut self, generation: Generation, due_ms: u64, effect: E) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        if self.is_retired(generation) {
            debug!("Ignoring timer {:?} for retired {:?}", id, generation);
            return id;
        }
        self.queue.push(Reverse(Entry {
            due_ms,
            id,
            generation,
            effect,
        }));
        id
    }

    /// Cancel one timer. Returns false if it already fired or was invalidated.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        let live = self
            .queue
            .iter()
            .any(|Reverse(entry)| entry.id == id && self.is_live(entry));
        if live {
            self.cancelled.insert(id);
        }
        live
    }

    fn is_live(&self, entry: &Entry<E>) -> bool {
        !self.cancelled.contains(&entry.id) && self.open.contains(&entry.generation)
    }

    /// Pop the next live timer due at or before `now_ms`
    pub fn pop_due(&mut self, now_ms: u64) -> Option<Fired<E>> {
        loop {
            let Reverse(next) = self.queue.peek()?;
            if next.due_ms > now_ms {
                return None;
            }
            let Reverse(entry) = self.queue.pop()?;
            if !self.is_live(&entry) {
                debug!("Dropping stale timer {:?} from {:?}", entry.id, entry.generation);
                self.cancelled.remove(&entry.id);
                continue;
            }
            return Some(Fired {
                id: entry.id,
                generation: entry.generation,
                due_ms: entry.due_ms,
                effect: entry.effect,
            });
        }
    }

    /// Due time of the earliest live timer
    pub fn next_due(&self) -> Option<u64> {
        self.queue
            .iter()
            .filter(|Reverse(entry)| self.is_live(entry))
            .map(|Reverse(entry)| entry.due_ms)
            .min()
    }

    /// Number of live pending timers
    pub fn pending(&self) -> usize {
        self.queue
            .iter()
            .filter(|Reverse(entry)| self.is_live(entry))
            .count()
    }
}

impl<E> Default for Scheduler<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(scheduler: &mut Scheduler<&'static str>, now: u64) -> Vec<&'static str> {
        let mut out = Vec::new();
        while let Some(fired) = scheduler.pop_due(now) {
            out.push(fired.effect);
        }
        out
    }

    #[test]
    fn test_fires_in_time_then_schedule_order() {
        let mut scheduler = Scheduler::new();
        let generation = scheduler.begin_generation();
        scheduler.schedule(generation, 300, "late");
        scheduler.schedule(generation, 100, "first");
        scheduler.schedule(generation, 100, "second");

        assert!(drain(&mut scheduler, 99).is_empty());
        assert_eq!(drain(&mut scheduler, 100), vec!["first", "second"]);
        assert_eq!(scheduler.next_due(), Some(300));
        assert_eq!(drain(&mut scheduler, 1000), vec!["late"]);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_cancelled_timer_never_fires() {
        let mut scheduler = Scheduler::new();
        let generation = scheduler.begin_generation();
        let id = scheduler.schedule(generation, 50, "expire");
        scheduler.schedule(generation, 60, "keep");
        assert!(scheduler.cancel(id));
        assert_eq!(scheduler.pending(), 1);
        assert_eq!(drain(&mut scheduler, 100), vec!["keep"]);
        assert!(!scheduler.cancel(id));
    }

    #[test]
    fn test_retired_generation_is_dropped() {
        let mut scheduler = Scheduler::new();
        let old = scheduler.begin_generation();
        scheduler.schedule(old, 2000, "twist-return");
        scheduler.retire(old);

        let current = scheduler.begin_generation();
        scheduler.schedule(current, 2500, "toast-expire");

        assert_ne!(old, current);
        assert!(scheduler.is_retired(old));
        assert_eq!(drain(&mut scheduler, 5000), vec!["toast-expire"]);
    }

    #[test]
    fn test_retiring_releases_bookkeeping() {
        let mut scheduler = Scheduler::new();
        for _ in 0..100 {
            let generation = scheduler.begin_generation();
            let id = scheduler.schedule(generation, 500, "expire");
            scheduler.schedule(generation, 900, "twist-return");
            scheduler.cancel(id);
            scheduler.retire(generation);
            assert!(scheduler.is_retired(generation));
        }
        assert_eq!(scheduler.queue.len(), 0);
        assert!(scheduler.cancelled.is_empty());
        assert!(scheduler.open.is_empty());

        let current = scheduler.begin_generation();
        scheduler.schedule(current, 100, "toast-expire");
        assert_eq!(scheduler.open.len(), 1);
        assert_eq!(drain(&mut scheduler, 100), vec!["toast-expire"]);
    }

    #[test]
    fn test_timer_scheduled_into_retired_generation_is_inert() {
        let mut scheduler = Scheduler::new();
        let generation = scheduler.begin_generation();
        scheduler.retire(generation);
        scheduler.schedule(generation, 10, "ghost");
        assert_eq!(scheduler.pending(), 0);
        assert_eq!(scheduler.next_due(), None);
        assert!(drain(&mut scheduler, 100).is_empty());
    }
}
