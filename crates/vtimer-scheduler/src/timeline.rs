//! Pending timed events ordered by `(due_at, id)`.
//!
//! Ids are allocated monotonically, so among events sharing a due time the
//! lowest id was scheduled first; keying on the pair gives first-come,
//! first-served firing for simultaneous deadlines.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use vtimer_core::TimerId;

/// Shared callback of a recurring event; every re-armed instance points at
/// the same closure.
pub(crate) type RepeatFn = Rc<RefCell<Box<dyn FnMut()>>>;

/// What to run when a timed event fires.
pub(crate) enum EventAction {
    Once(Box<dyn FnOnce()>),
    Every(RepeatFn),
}

impl std::fmt::Debug for EventAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventAction::Once(_) => write!(f, "Once(..)"),
            EventAction::Every(_) => write!(f, "Every(..)"),
        }
    }
}

/// One pending timeout or interval occurrence.
#[derive(Debug)]
pub(crate) struct ScheduledEvent {
    pub id: TimerId,
    pub due_at: u64,
    pub period_ms: u64,
    pub action: EventAction,
}

impl ScheduledEvent {
    pub fn once(id: TimerId, due_at: u64, callback: Box<dyn FnOnce()>) -> Self {
        Self {
            id,
            due_at,
            period_ms: 0,
            action: EventAction::Once(callback),
        }
    }

    pub fn every(id: TimerId, due_at: u64, period_ms: u64, callback: RepeatFn) -> Self {
        Self {
            id,
            due_at,
            period_ms,
            action: EventAction::Every(callback),
        }
    }

    pub fn key(&self) -> (u64, TimerId) {
        (self.due_at, self.id)
    }

    /// Next occurrence of a recurring event, measured from this instance's
    /// due time rather than from "now" so that slippage never accumulates.
    /// `None` for one-shots.
    pub fn successor(&self) -> Option<ScheduledEvent> {
        match &self.action {
            EventAction::Every(callback) => Some(ScheduledEvent::every(
                self.id,
                self.due_at.saturating_add(self.period_ms),
                self.period_ms,
                Rc::clone(callback),
            )),
            EventAction::Once(_) => None,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct Timeline {
    events: BTreeMap<(u64, TimerId), ScheduledEvent>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, event: ScheduledEvent) {
        self.events.insert(event.key(), event);
    }

    /// Remove the entry at exactly `(due_at, id)`. Absent keys are a no-op.
    pub fn remove_exact(&mut self, due_at: u64, id: TimerId) -> Option<ScheduledEvent> {
        self.events.remove(&(due_at, id))
    }

    pub fn peek_min(&self) -> Option<(u64, TimerId)> {
        self.events.first_key_value().map(|(key, _)| *key)
    }

    pub fn pop_min(&mut self) -> Option<ScheduledEvent> {
        self.events.pop_first().map(|(_, event)| event)
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> Box<dyn FnOnce()> {
        Box::new(|| {})
    }

    fn repeat_noop() -> RepeatFn {
        let f: Box<dyn FnMut()> = Box::new(|| {});
        Rc::new(RefCell::new(f))
    }

    #[test]
    fn pops_in_due_time_order() {
        let mut tl = Timeline::new();
        let (a, b, c) = (TimerId::next(), TimerId::next(), TimerId::next());
        tl.insert(ScheduledEvent::once(a, 30, noop()));
        tl.insert(ScheduledEvent::once(b, 10, noop()));
        tl.insert(ScheduledEvent::once(c, 20, noop()));

        let order: Vec<u64> = std::iter::from_fn(|| tl.pop_min().map(|e| e.due_at)).collect();
        assert_eq!(order, vec![10, 20, 30]);
        assert!(tl.is_empty());
    }

    #[test]
    fn equal_due_times_pop_by_ascending_id() {
        let mut tl = Timeline::new();
        let first = TimerId::next();
        let second = TimerId::next();
        let third = TimerId::next();
        // Insert out of id order to make sure the key, not insertion, decides.
        tl.insert(ScheduledEvent::once(third, 10, noop()));
        tl.insert(ScheduledEvent::once(first, 10, noop()));
        tl.insert(ScheduledEvent::once(second, 10, noop()));

        assert_eq!(tl.pop_min().unwrap().id, first);
        assert_eq!(tl.pop_min().unwrap().id, second);
        assert_eq!(tl.pop_min().unwrap().id, third);
    }

    #[test]
    fn remove_exact_needs_matching_due_time() {
        let mut tl = Timeline::new();
        let id = TimerId::next();
        tl.insert(ScheduledEvent::once(id, 10, noop()));

        assert!(tl.remove_exact(11, id).is_none());
        assert_eq!(tl.len(), 1);
        assert!(tl.remove_exact(10, id).is_some());
        assert!(tl.remove_exact(10, id).is_none());
        assert!(tl.is_empty());
    }

    #[test]
    fn peek_does_not_remove() {
        let mut tl = Timeline::new();
        assert!(tl.peek_min().is_none());
        let id = TimerId::next();
        tl.insert(ScheduledEvent::once(id, 5, noop()));
        assert_eq!(tl.peek_min(), Some((5, id)));
        assert_eq!(tl.len(), 1);
    }

    #[test]
    fn successor_keeps_id_and_steps_from_due_time() {
        let id = TimerId::next();
        let event = ScheduledEvent::every(id, 100, 40, repeat_noop());
        let next = event.successor().unwrap();
        assert_eq!(next.id, id);
        assert_eq!(next.due_at, 140);
        assert!(matches!(next.action, EventAction::Every(_)));

        let once = ScheduledEvent::once(TimerId::next(), 0, noop());
        assert!(once.successor().is_none());
    }

    #[test]
    fn successor_saturates_at_max() {
        let event = ScheduledEvent::every(TimerId::next(), u64::MAX - 1, 10, repeat_noop());
        assert_eq!(event.successor().unwrap().due_at, u64::MAX);
    }
}
