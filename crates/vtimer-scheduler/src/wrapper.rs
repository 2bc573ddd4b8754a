use std::cell::RefCell;
use std::rc::Rc;

use tracing::debug;
use vtimer_core::{Result, TimerConfig, TimerHandle, TimerMode};

use crate::factory::create_timer;
use crate::timer::Timer;

/// Forwards every call to whichever timer is currently installed.
///
/// Clones share the installed timer. Swapping with [`WrapperTimer::set_timer`]
/// clears the outgoing timer first, so none of its pending work can fire
/// against state that has moved on.
#[derive(Clone)]
pub struct WrapperTimer {
    inner: Rc<RefCell<Box<dyn Timer>>>,
}

impl WrapperTimer {
    pub fn new(timer: Box<dyn Timer>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(timer)),
        }
    }

    /// Clear the current timer and install `timer` in its place.
    pub fn set_timer(&self, timer: Box<dyn Timer>) {
        self.inner.borrow().clear_all();
        let outgoing = std::mem::replace(&mut *self.inner.borrow_mut(), timer);
        debug!("wrapped timer swapped");
        drop(outgoing);
    }
}

impl Default for WrapperTimer {
    /// Wraps a virtual timer starting at host real time.
    fn default() -> Self {
        Self::new(create_timer(TimerMode::Virtual, &TimerConfig::default()))
    }
}

impl Timer for WrapperTimer {
    fn now(&self) -> u64 {
        self.inner.borrow().now()
    }

    fn set_timeout(&self, callback: Box<dyn FnOnce()>, delay_ms: f64) -> Result<TimerHandle> {
        self.inner.borrow().set_timeout(callback, delay_ms)
    }

    fn clear_timeout(&self, handle: &TimerHandle) {
        self.inner.borrow().clear_timeout(handle)
    }

    fn set_interval(&self, callback: Box<dyn FnMut()>, period_ms: f64) -> Result<TimerHandle> {
        self.inner.borrow().set_interval(callback, period_ms)
    }

    fn clear_interval(&self, handle: &TimerHandle) {
        self.inner.borrow().clear_interval(handle)
    }

    fn set_immediate(&self, callback: Box<dyn FnOnce()>) -> TimerHandle {
        self.inner.borrow().set_immediate(callback)
    }

    fn clear_immediate(&self, handle: &TimerHandle) {
        self.inner.borrow().clear_immediate(handle)
    }

    fn clear_all(&self) {
        self.inner.borrow().clear_all()
    }
}

impl std::fmt::Debug for WrapperTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WrapperTimer")
            .field("now", &self.now())
            .finish_non_exhaustive()
    }
}
