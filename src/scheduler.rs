//! Timer primitives driven by explicit instants
//!
//! Nothing in here sleeps. Owners ask for the next deadline, wait for it
//! however they like (a tokio sleep in the host loop, a jump in virtual time
//! in tests) and then collect whatever became due.

use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
struct Task {
    interval: Duration,
    next: Instant,
}

/// Cancellable repeating tasks, at most one per key.
///
/// Inserting under a key that already has a task replaces it, so a subject
/// can never end up with two timers.
#[derive(Debug)]
pub struct RepeatingTasks<K> {
    tasks: BTreeMap<K, Task>,
}

impl<K> Default for RepeatingTasks<K> {
    fn default() -> Self {
        Self {
            tasks: BTreeMap::new(),
        }
    }
}

impl<K: Ord + Copy> RepeatingTasks<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the task for `key`, first due at `first_due`
    pub fn insert(&mut self, key: K, interval: Duration, first_due: Instant) {
        let interval = interval.max(Duration::from_millis(1));
        self.tasks.insert(
            key,
            Task {
                interval,
                next: first_due,
            },
        );
    }

    /// Returns true if a task was registered
    pub fn cancel(&mut self, key: K) -> bool {
        self.tasks.remove(&key).is_some()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Keys whose deadline has passed. Each fires at most once per call; missed
    /// periods are skipped rather than replayed.
    pub fn due(&mut self, now: Instant) -> Vec<K> {
        let mut fired = Vec::new();
        for (key, task) in self.tasks.iter_mut() {
            if task.next > now {
                continue;
            }
            fired.push(*key);
            let behind = now.duration_since(task.next);
            let interval = task.interval.as_nanos();
            let advance = (behind.as_nanos() / interval + 1) * interval;
            task.next = u64::try_from(advance)
                .ok()
                .and_then(|nanos| task.next.checked_add(Duration::from_nanos(nanos)))
                .unwrap_or(now + task.interval);
        }
        fired
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.tasks.values().map(|task| task.next).min()
    }

    pub fn clear(&mut self) {
        self.tasks.clear();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edge {
    Trailing,
    Leading,
}

/// Debounced trigger.
///
/// A trailing debounce fires `delay` after the last trigger. A leading one
/// fires on the first trigger of a burst and once more `delay` after the last
/// trigger when the burst had follow-ups.
#[derive(Debug, Clone)]
pub struct Debounce {
    delay: Duration,
    edge: Edge,
    deadline: Option<Instant>,
    quiet_until: Option<Instant>,
}

impl Debounce {
    pub fn trailing(delay: Duration) -> Self {
        Self {
            delay,
            edge: Edge::Trailing,
            deadline: None,
            quiet_until: None,
        }
    }

    pub fn leading(delay: Duration) -> Self {
        Self {
            delay,
            edge: Edge::Leading,
            deadline: None,
            quiet_until: None,
        }
    }

    pub fn trigger(&mut self, now: Instant) {
        match self.edge {
            Edge::Trailing => {
                self.deadline = Some(now + self.delay);
            }
            Edge::Leading => {
                let quiet = self.quiet_until.map_or(true, |until| until <= now);
                self.quiet_until = Some(now + self.delay);
                if self.deadline.is_some_and(|deadline| deadline <= now) {
                    // leading fire not collected yet; it will see this trigger too
                    return;
                }
                self.deadline = Some(if quiet { now } else { now + self.delay });
            }
        }
    }

    /// Consume the pending fire if it is due
    pub fn take_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
        self.quiet_until = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn test_repeating_one_task_per_key() {
        let start = Instant::now();
        let mut tasks = RepeatingTasks::new();
        tasks.insert(1, ms(33), start);
        tasks.insert(1, ms(50), start + ms(10));
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks.next_deadline(), Some(start + ms(10)));

        assert!(tasks.due(start).is_empty());
        assert_eq!(tasks.due(start + ms(10)), vec![1]);
        assert_eq!(tasks.next_deadline(), Some(start + ms(60)));
    }

    #[test]
    fn test_repeating_skips_missed_periods() {
        let start = Instant::now();
        let mut tasks = RepeatingTasks::new();
        tasks.insert('a', ms(10), start);
        tasks.insert('b', ms(100), start + ms(100));

        assert_eq!(tasks.due(start + ms(35)), vec!['a']);
        assert_eq!(tasks.next_deadline(), Some(start + ms(40)));

        assert!(tasks.cancel('a'));
        assert!(!tasks.cancel('a'));
        assert_eq!(tasks.next_deadline(), Some(start + ms(100)));
        assert_eq!(tasks.due(start + ms(100)), vec!['b']);
    }

    #[test]
    fn test_repeating_catches_up_after_long_stall() {
        let start = Instant::now();
        let mut tasks = RepeatingTasks::new();
        tasks.insert(7, ms(1), start);

        // more missed periods than fit in a u32
        let stalled = start + Duration::from_secs(60 * 24 * 3600) + Duration::from_micros(500);
        assert_eq!(tasks.due(stalled), vec![7]);
        let next = tasks.next_deadline().unwrap();
        assert!(next > stalled);
        assert!(next <= stalled + ms(1));
        assert!(tasks.due(stalled).is_empty());
    }

    #[test]
    fn test_trailing_debounce_coalesces() {
        let start = Instant::now();
        let mut debounce = Debounce::trailing(ms(50));
        debounce.trigger(start);
        debounce.trigger(start + ms(20));
        debounce.trigger(start + ms(40));

        assert!(!debounce.take_due(start + ms(60)));
        assert_eq!(debounce.next_deadline(), Some(start + ms(90)));
        assert!(debounce.take_due(start + ms(90)));
        assert!(!debounce.take_due(start + ms(200)));
    }

    #[test]
    fn test_leading_debounce_fires_immediately_then_trails() {
        let start = Instant::now();
        let mut debounce = Debounce::leading(ms(1000));
        debounce.trigger(start);
        assert!(debounce.take_due(start));

        debounce.trigger(start + ms(100));
        assert!(!debounce.take_due(start + ms(100)));
        assert!(debounce.take_due(start + ms(1100)));

        // burst over: next trigger fires right away again
        debounce.trigger(start + ms(3000));
        assert!(debounce.take_due(start + ms(3000)));
    }

    #[test]
    fn test_leading_single_trigger_has_no_trailing_fire() {
        let start = Instant::now();
        let mut debounce = Debounce::leading(ms(1000));
        debounce.trigger(start);
        assert!(debounce.take_due(start));
        assert!(!debounce.is_pending());
        assert!(!debounce.take_due(start + ms(5000)));
    }
}
