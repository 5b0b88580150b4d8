use std::time::Duration;

use crate::address::Address;
use crate::protocol::Width;

/// A memory cell that is read periodically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEntry {
    pub address: Address,
    pub width: Width,
    pub poll_interval: Duration,
    /// Time left until the next read is due.
    pub remaining: Duration,
}

/// A read the scheduler wants issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DueRead {
    pub address: Address,
    pub width: Width,
}

/// Outcome of [`WatchScheduler::set_watch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchChange {
    Enabled,
    /// An existing watch got a new width or interval.
    Replaced,
    Disabled,
}

/// No watch is active for {0}
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error, docsplay::Display)]
pub struct NotWatched(pub Address);

/// Keeps one timer per watched address.
///
/// Every address runs on its own interval. On each [`tick`](Self::tick) the
/// measured elapsed time is subtracted from every timer; timers that run out
/// fire once and restart at their nominal interval, so an overshoot is dropped
/// instead of being paid back with a burst of reads.
#[derive(Debug, Default)]
pub struct WatchScheduler {
    // Insertion ordered, so simultaneous expiries are emitted reproducibly.
    entries: Vec<WatchEntry>,
}

impl WatchScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables, replaces or disables the watch for `address`.
    ///
    /// A `poll_interval_ms` of zero or less disables the watch. Disabling an
    /// address that is not watched is an error.
    pub fn set_watch(
        &mut self,
        address: Address,
        width: Width,
        poll_interval_ms: i64,
    ) -> Result<WatchChange, NotWatched> {
        let position = self.entries.iter().position(|e| e.address == address);

        let Ok(interval_ms) = u64::try_from(poll_interval_ms) else {
            return self.remove(position).ok_or(NotWatched(address));
        };
        if interval_ms == 0 {
            return self.remove(position).ok_or(NotWatched(address));
        }

        let poll_interval = Duration::from_millis(interval_ms);
        let entry = WatchEntry {
            address,
            width,
            poll_interval,
            remaining: poll_interval,
        };

        match position {
            Some(index) => {
                self.entries[index] = entry;
                Ok(WatchChange::Replaced)
            }
            None => {
                self.entries.push(entry);
                Ok(WatchChange::Enabled)
            }
        }
    }

    fn remove(&mut self, position: Option<usize>) -> Option<WatchChange> {
        let index = position?;
        self.entries.remove(index);
        Some(WatchChange::Disabled)
    }

    /// Advances every timer by `elapsed` and returns the reads that are due,
    /// in insertion order.
    pub fn tick(&mut self, elapsed: Duration) -> Vec<DueRead> {
        let mut due = Vec::new();

        for entry in &mut self.entries {
            entry.remaining = entry.remaining.saturating_sub(elapsed);

            if entry.remaining.is_zero() {
                due.push(DueRead {
                    address: entry.address,
                    width: entry.width,
                });
                entry.remaining = entry.poll_interval;
            }
        }

        due
    }

    pub fn get(&self, address: Address) -> Option<&WatchEntry> {
        self.entries.iter().find(|e| e.address == address)
    }

    pub fn entries(&self) -> &[WatchEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    use super::*;

    const A: Address = Address::new(0x2000_0000);
    const B: Address = Address::new(0x2000_0004);

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn fired(scheduler: &mut WatchScheduler, ticks: &[u64]) -> usize {
        ticks
            .iter()
            .map(|&elapsed| scheduler.tick(ms(elapsed)).len())
            .sum()
    }

    #[test]
    fn fires_once_interval_has_elapsed() {
        let mut scheduler = WatchScheduler::new();
        scheduler.set_watch(A, 4, 100).unwrap();

        assert_eq!(scheduler.tick(ms(99)), vec![]);
        assert_eq!(
            scheduler.tick(ms(1)),
            vec![DueRead {
                address: A,
                width: 4
            }]
        );
        assert_eq!(scheduler.get(A).unwrap().remaining, ms(100));
    }

    #[test_case(&[60, 60], 1; "two ticks overshooting fire once")]
    #[test_case(&[250], 1; "large overshoot fires once")]
    #[test_case(&[50, 50, 50, 50], 2; "exact multiples")]
    #[test_case(&[10; 9], 0; "not yet due")]
    fn fire_counts(ticks: &[u64], expected: usize) {
        let mut scheduler = WatchScheduler::new();
        scheduler.set_watch(A, 4, 100).unwrap();

        assert_eq!(fired(&mut scheduler, ticks), expected);
    }

    #[test]
    fn overshoot_is_not_carried_over() {
        let mut scheduler = WatchScheduler::new();
        scheduler.set_watch(A, 4, 100).unwrap();

        assert_eq!(fired(&mut scheduler, &[60, 60]), 1);
        // Reset to the nominal interval: the 20 ms overshoot is dropped.
        assert_eq!(fired(&mut scheduler, &[80]), 0);
        assert_eq!(fired(&mut scheduler, &[20]), 1);
    }

    #[test]
    fn every_window_of_interval_plus_tick_contains_a_read() {
        let tick = 7;
        let interval = 100;
        let mut scheduler = WatchScheduler::new();
        scheduler.set_watch(A, 4, interval as i64).unwrap();

        let mut now = 0;
        let mut last_fire = 0;
        while now < 10_000 {
            now += tick;
            if !scheduler.tick(ms(tick)).is_empty() {
                assert!(now - last_fire <= interval + tick);
                last_fire = now;
            }
        }
        assert!(now - last_fire <= interval + tick);
    }

    #[test]
    fn independent_rates() {
        let mut scheduler = WatchScheduler::new();
        scheduler.set_watch(A, 4, 100).unwrap();
        scheduler.set_watch(B, 2, 30).unwrap();

        let mut reads = Vec::new();
        for _ in 0..10 {
            reads.extend(scheduler.tick(ms(10)));
        }

        let count = |address| reads.iter().filter(|r| r.address == address).count();
        assert_eq!(count(A), 1);
        assert_eq!(count(B), 3);
    }

    #[test]
    fn simultaneous_expiries_follow_insertion_order() {
        let mut scheduler = WatchScheduler::new();
        scheduler.set_watch(B, 4, 50).unwrap();
        scheduler.set_watch(A, 4, 50).unwrap();

        let due: Vec<_> = scheduler.tick(ms(50)).into_iter().map(|r| r.address).collect();

        assert_eq!(due, vec![B, A]);
    }

    #[test]
    fn replacing_keeps_position_and_restarts_timer() {
        let mut scheduler = WatchScheduler::new();
        scheduler.set_watch(A, 4, 100).unwrap();
        scheduler.set_watch(B, 4, 100).unwrap();
        scheduler.tick(ms(70));

        assert_eq!(scheduler.set_watch(A, 2, 40), Ok(WatchChange::Replaced));

        let entry = &scheduler.entries()[0];
        assert_eq!(entry.address, A);
        assert_eq!(entry.width, 2);
        assert_eq!(entry.remaining, ms(40));
        assert_eq!(scheduler.len(), 2);
    }

    #[test_case(0; "zero")]
    #[test_case(-1; "negative")]
    fn disable(poll_interval_ms: i64) {
        let mut scheduler = WatchScheduler::new();
        scheduler.set_watch(A, 4, 100).unwrap();

        assert_eq!(
            scheduler.set_watch(A, 4, poll_interval_ms),
            Ok(WatchChange::Disabled)
        );
        assert!(scheduler.is_empty());
        assert_eq!(scheduler.tick(ms(1000)), vec![]);
    }

    #[test]
    fn disabling_unknown_address_is_an_error() {
        let mut scheduler = WatchScheduler::new();
        scheduler.set_watch(B, 4, 100).unwrap();

        assert_eq!(scheduler.set_watch(A, 4, 0), Err(NotWatched(A)));
        assert_eq!(scheduler.len(), 1);
    }
}
