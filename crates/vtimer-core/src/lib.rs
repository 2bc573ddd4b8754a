//! `vtimer-core`: shared vocabulary for the vtimer engines.
//!
//! Ids, handles, modes, delay validation, the host real clock, the error
//! taxonomy and figment-backed configuration. The engines themselves live in
//! `vtimer-scheduler`.

pub mod clock;
pub mod config;
pub mod error;
pub mod types;

pub use clock::real_now_ms;
pub use config::{LiveConfig, TimerConfig};
pub use error::{Result, TimerError};
pub use types::{validate_delay, TimerHandle, TimerId, TimerKind, TimerMode};
