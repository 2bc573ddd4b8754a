use vtimer_core::{Result, TimerHandle};

/// The timer surface shared by the virtual, live and forwarding engines.
///
/// Delays and periods are milliseconds as `f64` so that NaN, infinities and
/// negatives can be rejected with [`vtimer_core::TimerError::InvalidDelay`]
/// before anything is scheduled. Callbacks never run inside the call that
/// scheduled them. Every `clear_*` call is an idempotent no-op for handles
/// that already fired, were already cleared, or are unknown.
pub trait Timer {
    fn now(&self) -> u64;

    fn set_timeout(&self, callback: Box<dyn FnOnce()>, delay_ms: f64) -> Result<TimerHandle>;
    fn clear_timeout(&self, handle: &TimerHandle);

    fn set_interval(&self, callback: Box<dyn FnMut()>, period_ms: f64) -> Result<TimerHandle>;
    fn clear_interval(&self, handle: &TimerHandle);

    fn set_immediate(&self, callback: Box<dyn FnOnce()>) -> TimerHandle;
    fn clear_immediate(&self, handle: &TimerHandle);

    /// Drop every pending unit of work.
    fn clear_all(&self);
}

impl<T: Timer + ?Sized> Timer for Box<T> {
    fn now(&self) -> u64 {
        (**self).now()
    }

    fn set_timeout(&self, callback: Box<dyn FnOnce()>, delay_ms: f64) -> Result<TimerHandle> {
        (**self).set_timeout(callback, delay_ms)
    }

    fn clear_timeout(&self, handle: &TimerHandle) {
        (**self).clear_timeout(handle)
    }

    fn set_interval(&self, callback: Box<dyn FnMut()>, period_ms: f64) -> Result<TimerHandle> {
        (**self).set_interval(callback, period_ms)
    }

    fn clear_interval(&self, handle: &TimerHandle) {
        (**self).clear_interval(handle)
    }

    fn set_immediate(&self, callback: Box<dyn FnOnce()>) -> TimerHandle {
        (**self).set_immediate(callback)
    }

    fn clear_immediate(&self, handle: &TimerHandle) {
        (**self).clear_immediate(handle)
    }

    fn clear_all(&self) {
        (**self).clear_all()
    }
}

/// Generic conveniences that box the closure for the caller.
pub trait TimerExt: Timer {
    fn timeout<F>(&self, callback: F, delay_ms: f64) -> Result<TimerHandle>
    where
        F: FnOnce() + 'static,
    {
        self.set_timeout(Box::new(callback), delay_ms)
    }

    fn interval<F>(&self, callback: F, period_ms: f64) -> Result<TimerHandle>
    where
        F: FnMut() + 'static,
    {
        self.set_interval(Box::new(callback), period_ms)
    }

    fn immediate<F>(&self, callback: F) -> TimerHandle
    where
        F: FnOnce() + 'static,
    {
        self.set_immediate(Box::new(callback))
    }
}

impl<T: Timer + ?Sized> TimerExt for T {}
