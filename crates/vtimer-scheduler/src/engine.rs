use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, info};
use vtimer_core::{real_now_ms, validate_delay, Result, TimerHandle, TimerId, TimerKind};

use crate::drain::{disarm, ensure_armed, Core};
use crate::host::Host;
use crate::immediate::ImmediateTask;
use crate::timeline::ScheduledEvent;
use crate::timer::Timer;

/// Construction options for [`VirtualTimer`].
#[derive(Debug, Clone, Copy, Default)]
pub struct VirtualTimerOptions {
    /// Initial virtual time in ms; `None` means host real time.
    pub start_time: Option<u64>,
}

/// Deterministic timer on a virtual clock.
///
/// Time only moves when scheduled work fires: draining a 10 s timeout takes
/// no wall-clock time and leaves `now()` exactly 10 000 ms later. Clones
/// share one engine.
#[derive(Clone)]
pub struct VirtualTimer {
    core: Rc<Core>,
}

impl VirtualTimer {
    pub fn new(host: Rc<dyn Host>, options: VirtualTimerOptions) -> Self {
        let start_time = options.start_time.unwrap_or_else(real_now_ms);
        debug!(start_time, "virtual timer created");
        Self {
            core: Rc::new(Core::new(host, start_time)),
        }
    }

    /// Shorthand for a timer starting at `start_time`.
    pub fn starting_at(host: Rc<dyn Host>, start_time: u64) -> Self {
        Self::new(
            host,
            VirtualTimerOptions {
                start_time: Some(start_time),
            },
        )
    }

    /// Number of pending units of work (timed + immediate).
    pub fn pending(&self) -> usize {
        let state = self.core.state.borrow();
        state.timeline.len() + state.immediates.len()
    }

    pub fn is_idle(&self) -> bool {
        self.core.state.borrow().is_idle()
    }

    /// Due time of the earliest pending timed event.
    pub fn next_due(&self) -> Option<u64> {
        self.core.state.borrow().timeline.peek_min().map(|(due, _)| due)
    }

    fn cancel_timeout(&self, handle: &TimerHandle) {
        let Some(due_at) = handle.due_at() else {
            return;
        };
        let removed = self
            .core
            .state
            .borrow_mut()
            .timeline
            .remove_exact(due_at, handle.id());
        if removed.is_some() {
            debug!(timer_id = %handle.id(), "timeout cleared");
        }
        ensure_armed(&self.core);
    }

    fn cancel_interval(&self, handle: &TimerHandle) {
        let removed = {
            let mut state = self.core.state.borrow_mut();
            match state.intervals.remove(handle.id()) {
                Some(due_at) => state.timeline.remove_exact(due_at, handle.id()),
                None => None,
            }
        };
        if removed.is_some() {
            debug!(timer_id = %handle.id(), "interval cleared");
        }
        ensure_armed(&self.core);
    }

    fn cancel_timed(&self, handle: &TimerHandle) {
        match handle.kind() {
            TimerKind::Timeout => self.cancel_timeout(handle),
            TimerKind::Interval => self.cancel_interval(handle),
            TimerKind::Immediate => {}
        }
    }
}

impl Timer for VirtualTimer {
    fn now(&self) -> u64 {
        self.core.state.borrow().clock.now()
    }

    fn set_timeout(&self, callback: Box<dyn FnOnce()>, delay_ms: f64) -> Result<TimerHandle> {
        let delay = validate_delay(delay_ms)?;
        let id = TimerId::next();
        let due_at = {
            let mut state = self.core.state.borrow_mut();
            let due_at = state.clock.now().saturating_add(delay);
            state
                .timeline
                .insert(ScheduledEvent::once(id, due_at, callback));
            due_at
        };
        debug!(timer_id = %id, due_at, "timeout scheduled");
        ensure_armed(&self.core);
        Ok(TimerHandle::timeout(id, due_at))
    }

    fn clear_timeout(&self, handle: &TimerHandle) {
        self.cancel_timed(handle);
    }

    fn set_interval(&self, callback: Box<dyn FnMut()>, period_ms: f64) -> Result<TimerHandle> {
        let period = validate_delay(period_ms)?;
        let id = TimerId::next();
        let due_at = {
            let mut state = self.core.state.borrow_mut();
            let due_at = state.clock.now().saturating_add(period);
            let callback = Rc::new(RefCell::new(callback));
            state
                .timeline
                .insert(ScheduledEvent::every(id, due_at, period, callback));
            state.intervals.record(id, due_at);
            due_at
        };
        debug!(timer_id = %id, due_at, period, "interval scheduled");
        ensure_armed(&self.core);
        Ok(TimerHandle::interval(id, due_at, period))
    }

    fn clear_interval(&self, handle: &TimerHandle) {
        self.cancel_timed(handle);
    }

    fn set_immediate(&self, callback: Box<dyn FnOnce()>) -> TimerHandle {
        let id = TimerId::next();
        self.core
            .state
            .borrow_mut()
            .immediates
            .enqueue(ImmediateTask { id, callback });
        debug!(timer_id = %id, "immediate scheduled");
        ensure_armed(&self.core);
        TimerHandle::immediate(id)
    }

    fn clear_immediate(&self, handle: &TimerHandle) {
        if handle.kind() != TimerKind::Immediate {
            return;
        }
        let removed = self
            .core
            .state
            .borrow_mut()
            .immediates
            .remove(handle.id());
        if removed.is_some() {
            debug!(timer_id = %handle.id(), "immediate cleared");
        }
        ensure_armed(&self.core);
    }

    fn clear_all(&self) {
        // Dropped callbacks may own resources with their own Drop logic; keep
        // them out of the borrow.
        let discarded = {
            let mut state = self.core.state.borrow_mut();
            let pending = state.timeline.len() + state.immediates.len();
            let timeline = std::mem::take(&mut state.timeline);
            let immediates = std::mem::take(&mut state.immediates);
            state.intervals.clear();
            state.clock.resync(real_now_ms());
            (pending, timeline, immediates)
        };
        disarm(&self.core);
        info!(discarded = discarded.0, "virtual timer cleared");
    }
}

impl std::fmt::Debug for VirtualTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualTimer")
            .field("now", &self.now())
            .field("pending", &self.pending())
            .finish()
    }
}
