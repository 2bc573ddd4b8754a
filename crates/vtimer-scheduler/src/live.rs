//! Real-clock timer on the tokio runtime.
//!
//! Every scheduled unit is a `spawn_local` task, so the timer must be used
//! from inside a `tokio::task::LocalSet`. Pending tasks are tracked per kind
//! so clears can abort them.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};
use std::time::Duration;

use tokio::task::AbortHandle;
use tracing::{debug, info};
use vtimer_core::{
    real_now_ms, validate_delay, LiveConfig, Result, TimerHandle, TimerId, TimerKind,
};

use crate::timer::Timer;

#[derive(Default)]
struct Tasks {
    timeouts: BTreeMap<TimerId, AbortHandle>,
    intervals: BTreeMap<TimerId, AbortHandle>,
    immediates: BTreeMap<TimerId, AbortHandle>,
}

impl Tasks {
    fn of_kind(&mut self, kind: TimerKind) -> &mut BTreeMap<TimerId, AbortHandle> {
        match kind {
            TimerKind::Timeout => &mut self.timeouts,
            TimerKind::Interval => &mut self.intervals,
            TimerKind::Immediate => &mut self.immediates,
        }
    }

    fn len(&self) -> usize {
        self.timeouts.len() + self.intervals.len() + self.immediates.len()
    }
}

/// Drop a finished one-shot task's record.
fn forget(registry: &Weak<RefCell<Tasks>>, kind: TimerKind, id: TimerId) {
    if let Some(registry) = registry.upgrade() {
        registry.borrow_mut().of_kind(kind).remove(&id);
    }
}

/// Timer that waits for real. `now()` is the host clock.
#[derive(Clone, Default)]
pub struct LiveTimer {
    tasks: Rc<RefCell<Tasks>>,
    config: LiveConfig,
}

impl LiveTimer {
    pub fn new(config: LiveConfig) -> Self {
        Self {
            tasks: Rc::default(),
            config,
        }
    }

    /// Number of scheduled tasks that have not finished or been cleared.
    pub fn pending(&self) -> usize {
        self.tasks.borrow().len()
    }

    fn abort(&self, kind: TimerKind, id: TimerId) {
        let handle = self.tasks.borrow_mut().of_kind(kind).remove(&id);
        if let Some(handle) = handle {
            handle.abort();
            debug!(timer_id = %id, %kind, "live task aborted");
        }
    }

    fn abort_timed(&self, handle: &TimerHandle) {
        if handle.kind() != TimerKind::Immediate {
            self.abort(handle.kind(), handle.id());
        }
    }

    fn track(&self, kind: TimerKind, id: TimerId, handle: AbortHandle) {
        self.tasks.borrow_mut().of_kind(kind).insert(id, handle);
    }
}

impl Timer for LiveTimer {
    fn now(&self) -> u64 {
        real_now_ms()
    }

    fn set_timeout(&self, callback: Box<dyn FnOnce()>, delay_ms: f64) -> Result<TimerHandle> {
        let delay = validate_delay(delay_ms)?;
        let id = TimerId::next();
        let registry = Rc::downgrade(&self.tasks);
        let task = tokio::task::spawn_local(async move {
            tokio::time::sleep(Duration::from_millis(delay)).await;
            forget(&registry, TimerKind::Timeout, id);
            callback();
        });
        self.track(TimerKind::Timeout, id, task.abort_handle());
        debug!(timer_id = %id, delay, "live timeout scheduled");
        Ok(TimerHandle::timeout(id, real_now_ms().saturating_add(delay)))
    }

    fn clear_timeout(&self, handle: &TimerHandle) {
        self.abort_timed(handle);
    }

    fn set_interval(&self, mut callback: Box<dyn FnMut()>, period_ms: f64) -> Result<TimerHandle> {
        let period = validate_delay(period_ms)?;
        let step = Duration::from_millis(period.max(self.config.min_interval_ms).max(1));
        let id = TimerId::next();
        let task = tokio::task::spawn_local(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + step, step);
            loop {
                ticker.tick().await;
                callback();
            }
        });
        self.track(TimerKind::Interval, id, task.abort_handle());
        debug!(timer_id = %id, period, step_ms = step.as_millis() as u64, "live interval scheduled");
        Ok(TimerHandle::interval(id, real_now_ms().saturating_add(period), period))
    }

    fn clear_interval(&self, handle: &TimerHandle) {
        self.abort_timed(handle);
    }

    fn set_immediate(&self, callback: Box<dyn FnOnce()>) -> TimerHandle {
        let id = TimerId::next();
        let registry = Rc::downgrade(&self.tasks);
        let task = tokio::task::spawn_local(async move {
            forget(&registry, TimerKind::Immediate, id);
            callback();
        });
        self.track(TimerKind::Immediate, id, task.abort_handle());
        debug!(timer_id = %id, "live immediate scheduled");
        TimerHandle::immediate(id)
    }

    fn clear_immediate(&self, handle: &TimerHandle) {
        if handle.kind() == TimerKind::Immediate {
            self.abort(TimerKind::Immediate, handle.id());
        }
    }

    fn clear_all(&self) {
        let tasks = std::mem::take(&mut *self.tasks.borrow_mut());
        let discarded = tasks.len();
        for handle in tasks
            .timeouts
            .into_values()
            .chain(tasks.intervals.into_values())
            .chain(tasks.immediates.into_values())
        {
            handle.abort();
        }
        info!(discarded, "live timer cleared");
    }
}

impl std::fmt::Debug for LiveTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveTimer")
            .field("pending", &self.pending())
            .field("min_interval_ms", &self.config.min_interval_ms)
            .finish()
    }
}
