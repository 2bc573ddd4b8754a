use std::rc::Rc;

use tracing::debug;
use vtimer_core::{TimerConfig, TimerMode};

use crate::engine::{VirtualTimer, VirtualTimerOptions};
use crate::host::TokioHost;
use crate::live::LiveTimer;
use crate::timer::Timer;

/// Build a timer of the given mode.
///
/// Virtual timers run their drain loop on a [`TokioHost`] and start at
/// `config.start_time` (host real time when unset); live timers take
/// `config.live`. Either kind must be driven from inside a
/// `tokio::task::LocalSet`.
pub fn create_timer(mode: TimerMode, config: &TimerConfig) -> Box<dyn Timer> {
    debug!(%mode, start_time = ?config.start_time, "creating timer");
    match mode {
        TimerMode::Virtual => Box::new(VirtualTimer::new(
            Rc::new(TokioHost::new()),
            VirtualTimerOptions {
                start_time: config.start_time,
            },
        )),
        TimerMode::Live => Box::new(LiveTimer::new(config.live.clone())),
    }
}

/// Build a timer of `config.mode`.
pub fn timer_from_config(config: &TimerConfig) -> Box<dyn Timer> {
    create_timer(config.mode, config)
}
