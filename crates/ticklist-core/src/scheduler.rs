use std::collections::BTreeMap;
use std::time::Instant;

use tracing::{debug, trace};
use uuid::Uuid;

/// A mutation waiting for a transition to finish. The action doubles as its
/// key: scheduling the same action again moves its deadline instead of
/// queueing a second copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DeferredAction {
    Delete(Uuid),
    ClearCompleted,
    CloseReport,
    ResetReport,
}

#[derive(Debug, Default)]
pub struct Scheduler {
    entries: BTreeMap<DeferredAction, Instant>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when an earlier schedule for `action` was replaced.
    pub fn schedule(&mut self, action: DeferredAction, at: Instant) -> bool {
        let replaced = self.entries.insert(action, at).is_some();
        debug!(?action, replaced, "scheduled deferred action");
        replaced
    }

    pub fn cancel(&mut self, action: DeferredAction) -> bool {
        let removed = self.entries.remove(&action).is_some();
        if removed {
            debug!(?action, "cancelled deferred action");
        }
        removed
    }

    pub fn is_scheduled(&self, action: DeferredAction) -> bool {
        self.entries.contains_key(&action)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries.values().min().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes and returns every action due at `now`, earliest first.
    pub fn take_due(&mut self, now: Instant) -> Vec<DeferredAction> {
        let mut due: Vec<(Instant, DeferredAction)> = self
            .entries
            .iter()
            .filter(|(_, at)| **at <= now)
            .map(|(action, at)| (*at, *action))
            .collect();
        due.sort();

        for (_, action) in &due {
            self.entries.remove(action);
        }
        if !due.is_empty() {
            trace!(count = due.len(), "deferred actions due");
        }
        due.into_iter().map(|(_, action)| action).collect()
    }

    /// Removes every action regardless of deadline, earliest first.
    pub fn drain(&mut self) -> Vec<DeferredAction> {
        let mut all: Vec<(Instant, DeferredAction)> = std::mem::take(&mut self.entries)
            .into_iter()
            .map(|(action, at)| (at, action))
            .collect();
        all.sort();
        all.into_iter().map(|(_, action)| action).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use uuid::Uuid;

    use super::{DeferredAction, Scheduler};

    #[test]
    fn fires_in_deadline_order_once() {
        let start = Instant::now();
        let id = Uuid::new_v4();
        let mut scheduler = Scheduler::new();
        scheduler.schedule(DeferredAction::ClearCompleted, start + Duration::from_millis(400));
        scheduler.schedule(DeferredAction::Delete(id), start + Duration::from_millis(300));

        assert!(scheduler.take_due(start).is_empty());
        assert_eq!(scheduler.next_deadline(), Some(start + Duration::from_millis(300)));

        let due = scheduler.take_due(start + Duration::from_secs(1));
        assert_eq!(due, vec![DeferredAction::Delete(id), DeferredAction::ClearCompleted]);
        assert!(scheduler.is_empty());
        assert!(scheduler.take_due(start + Duration::from_secs(2)).is_empty());
    }

    #[test]
    fn rescheduling_replaces_instead_of_duplicating() {
        let start = Instant::now();
        let id = Uuid::new_v4();
        let mut scheduler = Scheduler::new();

        assert!(!scheduler.schedule(DeferredAction::Delete(id), start));
        assert!(scheduler.schedule(DeferredAction::Delete(id), start + Duration::from_millis(300)));
        assert_eq!(scheduler.len(), 1);
        assert!(scheduler.take_due(start).is_empty());
        assert_eq!(
            scheduler.take_due(start + Duration::from_millis(300)),
            vec![DeferredAction::Delete(id)]
        );
    }

    #[test]
    fn cancelled_actions_never_fire() {
        let start = Instant::now();
        let mut scheduler = Scheduler::new();
        scheduler.schedule(DeferredAction::ResetReport, start);

        assert!(scheduler.cancel(DeferredAction::ResetReport));
        assert!(!scheduler.cancel(DeferredAction::ResetReport));
        assert!(!scheduler.is_scheduled(DeferredAction::ResetReport));
        assert!(scheduler.take_due(start + Duration::from_secs(5)).is_empty());
    }
}
