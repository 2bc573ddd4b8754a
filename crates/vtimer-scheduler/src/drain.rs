//! The cooperative drain loop.
//!
//! While anything is pending, exactly one drain continuation is registered
//! with the host. Each run of that continuation performs one unit of work
//! (the oldest immediate, else the earliest timed event), then re-arms or
//! disarms. Container mutations always finish before a callback is invoked,
//! and no `RefCell` borrow is held across the call, so callbacks may freely
//! schedule or cancel work on the same engine.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use tracing::{error, trace};
use vtimer_core::TimerId;

use crate::clock::VirtualClock;
use crate::host::{DeferId, Host};
use crate::immediate::ImmediateQueue;
use crate::interval::IntervalIndex;
use crate::timeline::{EventAction, RepeatFn, Timeline};

/// Everything one engine owns.
#[derive(Debug)]
pub(crate) struct State {
    pub clock: VirtualClock,
    pub timeline: Timeline,
    pub immediates: ImmediateQueue,
    pub intervals: IntervalIndex,
    /// Registered, not yet started drain continuation.
    pub continuation: Option<DeferId>,
}

impl State {
    pub fn new(start_time: u64) -> Self {
        Self {
            clock: VirtualClock::starting_at(start_time),
            timeline: Timeline::new(),
            immediates: ImmediateQueue::new(),
            intervals: IntervalIndex::new(),
            continuation: None,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.timeline.is_empty() && self.immediates.is_empty()
    }

    /// Pop the next unit of work and apply every bookkeeping step that must
    /// precede its callback: re-arming a recurring event (and repointing the
    /// interval index at the successor) and advancing the clock.
    fn take_next_unit(&mut self) -> Option<Work> {
        if let Some(task) = self.immediates.dequeue() {
            return Some(Work::Immediate(task.id, task.callback));
        }

        let event = self.timeline.pop_min()?;
        if let Some(next) = event.successor() {
            debug_assert!(
                self.intervals.contains(event.id),
                "recurring event {} fired without an interval record",
                event.id
            );
            self.intervals.record(next.id, next.due_at);
            self.timeline.insert(next);
        }
        self.clock.advance_to(event.due_at);

        Some(match event.action {
            EventAction::Once(callback) => Work::Timeout(event.id, event.due_at, callback),
            EventAction::Every(callback) => Work::Interval(event.id, event.due_at, callback),
        })
    }
}

enum Work {
    Immediate(TimerId, Box<dyn FnOnce()>),
    Timeout(TimerId, u64, Box<dyn FnOnce()>),
    Interval(TimerId, u64, RepeatFn),
}

impl Work {
    fn run(self) {
        match self {
            Work::Immediate(id, callback) => {
                trace!(timer_id = %id, "firing immediate");
                callback();
            }
            Work::Timeout(id, due_at, callback) => {
                trace!(timer_id = %id, due_at, "firing timeout");
                callback();
            }
            Work::Interval(id, due_at, callback) => {
                trace!(timer_id = %id, due_at, "firing interval");
                let mut callback = callback.borrow_mut();
                (&mut *callback)();
            }
        }
    }
}

/// Engine state plus the host that runs its drain continuation.
pub(crate) struct Core {
    pub state: RefCell<State>,
    pub host: Rc<dyn Host>,
}

impl Core {
    pub fn new(host: Rc<dyn Host>, start_time: u64) -> Self {
        Self {
            state: RefCell::new(State::new(start_time)),
            host,
        }
    }
}

/// Make sure a drain continuation is registered iff work is pending.
///
/// Idempotent: with work pending and a continuation already registered this
/// does nothing.
pub(crate) fn ensure_armed(core: &Rc<Core>) {
    {
        let mut state = core.state.borrow_mut();
        if !state.is_idle() {
            if state.continuation.is_some() {
                return;
            }
        } else {
            let stale = state.continuation.take();
            drop(state);
            if let Some(id) = stale {
                trace!(defer_id = id.raw(), "nothing pending; drain disarmed");
                core.host.cancel(id);
            }
            return;
        }
    }

    let weak: Weak<Core> = Rc::downgrade(core);
    let id = core.host.defer(Box::new(move || {
        // A dropped engine leaves nothing to drain.
        if let Some(core) = weak.upgrade() {
            drain_step(&core);
        }
    }));
    core.state.borrow_mut().continuation = Some(id);
}

/// Cancel the registered continuation, if any.
pub(crate) fn disarm(core: &Rc<Core>) {
    let pending = core.state.borrow_mut().continuation.take();
    if let Some(id) = pending {
        core.host.cancel(id);
    }
}

/// Re-evaluates arming when dropped, including while unwinding out of a
/// panicking callback.
struct Rearm<'a>(&'a Rc<Core>);

impl Drop for Rearm<'_> {
    fn drop(&mut self) {
        ensure_armed(self.0);
    }
}

/// Body of the drain continuation: one unit of work, then re-arm.
pub(crate) fn drain_step(core: &Rc<Core>) {
    let work = {
        let mut state = core.state.borrow_mut();
        state.continuation = None;
        state.take_next_unit()
    };
    let _rearm = Rearm(core);

    match work {
        Some(work) => work.run(),
        None => {
            error!("drain step ran with nothing pending");
            debug_assert!(false, "drain step ran with nothing pending");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::ManualHost;
    use crate::immediate::ImmediateTask;
    use crate::timeline::ScheduledEvent;
    use std::cell::Cell;

    fn core_on(host: &ManualHost) -> Rc<Core> {
        Rc::new(Core::new(Rc::new(host.clone()), 0))
    }

    #[test]
    fn idle_engine_registers_nothing() {
        let host = ManualHost::new();
        let core = core_on(&host);
        ensure_armed(&core);
        assert_eq!(host.pending(), 0);
        assert!(core.state.borrow().continuation.is_none());
    }

    #[test]
    fn arming_is_idempotent() {
        let host = ManualHost::new();
        let core = core_on(&host);
        core.state.borrow_mut().immediates.enqueue(ImmediateTask {
            id: TimerId::next(),
            callback: Box::new(|| {}),
        });
        ensure_armed(&core);
        ensure_armed(&core);
        ensure_armed(&core);
        assert_eq!(host.pending(), 1);
    }

    #[test]
    fn emptied_engine_withdraws_its_continuation() {
        let host = ManualHost::new();
        let core = core_on(&host);
        let id = TimerId::next();
        core.state
            .borrow_mut()
            .timeline
            .insert(ScheduledEvent::once(id, 5, Box::new(|| {})));
        ensure_armed(&core);
        assert_eq!(host.pending(), 1);

        core.state.borrow_mut().timeline.remove_exact(5, id);
        ensure_armed(&core);
        assert_eq!(host.pending(), 0);
    }

    #[test]
    fn one_unit_per_step() {
        let host = ManualHost::new();
        let core = core_on(&host);
        let fired = Rc::new(Cell::new(0));
        for due in [10, 20] {
            let fired = Rc::clone(&fired);
            core.state.borrow_mut().timeline.insert(ScheduledEvent::once(
                TimerId::next(),
                due,
                Box::new(move || fired.set(fired.get() + 1)),
            ));
        }
        ensure_armed(&core);

        assert!(host.run_next());
        assert_eq!(fired.get(), 1);
        assert_eq!(core.state.borrow().clock.now(), 10);
        assert!(host.run_next());
        assert_eq!(fired.get(), 2);
        assert_eq!(core.state.borrow().clock.now(), 20);
        assert!(!host.run_next());
    }

    #[test]
    fn dropped_engine_turns_continuation_into_noop() {
        let host = ManualHost::new();
        let core = core_on(&host);
        core.state.borrow_mut().immediates.enqueue(ImmediateTask {
            id: TimerId::next(),
            callback: Box::new(|| panic!("must not run")),
        });
        ensure_armed(&core);
        drop(core);
        assert_eq!(host.run_until_idle(), 1);
    }
}
