//! `vtimer-scheduler`: deterministic stand-ins for timeouts, intervals and
//! immediates.
//!
//! # Overview
//!
//! A [`VirtualTimer`] keeps pending work on a virtual clock. Nothing runs
//! inside the call that scheduled it: the engine registers one drain
//! continuation with its [`Host`], and each run of that continuation fires
//! exactly one unit of work before re-arming. Time jumps straight to the due
//! time of whatever fired, so a test waiting on a ten-second timeout finishes
//! instantly with `now()` exactly ten seconds later.
//!
//! # Engines
//!
//! | Engine         | Clock          | Driven by                               |
//! |----------------|----------------|-----------------------------------------|
//! | `VirtualTimer` | virtual        | any [`Host`] (`ManualHost`, `TokioHost`)  |
//! | `LiveTimer`    | host real time | tokio `spawn_local` + `time`            |
//! | `WrapperTimer` | inner timer's  | forwards to a swappable inner timer     |
//!
//! # Ordering
//!
//! Immediates always run before timed work; timed work fires by due time,
//! then by scheduling order. Interval occurrences are spaced from the previous
//! due time, never from "now", so they do not drift.

mod clock;
mod drain;
pub mod engine;
pub mod factory;
pub mod global;
pub mod host;
mod immediate;
mod interval;
pub mod live;
pub mod sleep;
mod timeline;
pub mod timer;
pub mod wrapper;

pub use engine::{VirtualTimer, VirtualTimerOptions};
pub use factory::{create_timer, timer_from_config};
pub use global::{global_timer, set_global_timer, set_global_timer_with};
pub use host::{DeferId, Host, ManualHost, TokioHost};
pub use live::LiveTimer;
pub use sleep::{sleep, Sleep};
pub use timer::{Timer, TimerExt};
pub use wrapper::WrapperTimer;

pub use vtimer_core::{Result, TimerError, TimerHandle, TimerId, TimerKind, TimerMode};
