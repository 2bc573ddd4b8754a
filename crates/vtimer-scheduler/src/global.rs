//! Per-thread convenience timer.
//!
//! Engines hold `Rc` state and never cross threads, so "global" means one
//! forwarding timer per thread. It starts out as a virtual timer at host
//! real time; swapping clears whatever was installed before.

use tracing::info;
use vtimer_core::{TimerConfig, TimerMode};

use crate::factory::create_timer;
use crate::timer::Timer;
use crate::wrapper::WrapperTimer;

thread_local! {
    static GLOBAL: WrapperTimer = WrapperTimer::default();
}

/// The calling thread's global timer. Clones share the installed engine.
pub fn global_timer() -> WrapperTimer {
    GLOBAL.with(WrapperTimer::clone)
}

/// Install a fresh timer of `mode` with default settings.
pub fn set_global_timer(mode: TimerMode) {
    info!(%mode, "replacing global timer");
    set_global_timer_with(create_timer(mode, &TimerConfig::default()));
}

/// Install a caller-built timer.
pub fn set_global_timer_with(timer: Box<dyn Timer>) {
    GLOBAL.with(|global| global.set_timer(timer));
}
