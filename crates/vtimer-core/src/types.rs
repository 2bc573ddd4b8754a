use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TimerError};

/// Process-wide counter behind [`TimerId::next`]. Starts at 1 so that a
/// zeroed id is never handed out.
static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier of one scheduled unit of work.
///
/// Ids are strictly increasing across every engine in the process, so two
/// units scheduled back-to-back on the same engine always compare in
/// creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimerId(u64);

impl TimerId {
    /// Allocate a fresh id.
    pub fn next() -> Self {
        TimerId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TimerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Which scheduling call produced a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerKind {
    Timeout,
    Interval,
    Immediate,
}

impl std::fmt::Display for TimerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TimerKind::Timeout => "timeout",
            TimerKind::Interval => "interval",
            TimerKind::Immediate => "immediate",
        };
        write!(f, "{s}")
    }
}

/// Opaque reference to scheduled work, only meaningful when passed back to a
/// clear call on the timer that issued it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerHandle {
    id: TimerId,
    kind: TimerKind,
    /// Due time at creation; `None` for immediates.
    due_at: Option<u64>,
    /// Floored period; only set for intervals.
    period_ms: Option<u64>,
}

impl TimerHandle {
    pub fn timeout(id: TimerId, due_at: u64) -> Self {
        Self {
            id,
            kind: TimerKind::Timeout,
            due_at: Some(due_at),
            period_ms: None,
        }
    }

    pub fn interval(id: TimerId, due_at: u64, period_ms: u64) -> Self {
        Self {
            id,
            kind: TimerKind::Interval,
            due_at: Some(due_at),
            period_ms: Some(period_ms),
        }
    }

    pub fn immediate(id: TimerId) -> Self {
        Self {
            id,
            kind: TimerKind::Immediate,
            due_at: None,
            period_ms: None,
        }
    }

    pub fn id(&self) -> TimerId {
        self.id
    }

    pub fn kind(&self) -> TimerKind {
        self.kind
    }

    pub fn due_at(&self) -> Option<u64> {
        self.due_at
    }

    pub fn period_ms(&self) -> Option<u64> {
        self.period_ms
    }
}

impl std::fmt::Display for TimerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.due_at, self.period_ms) {
            (Some(due), Some(period)) => {
                write!(f, "{}{} @{} every {}ms", self.kind, self.id, due, period)
            }
            (Some(due), None) => write!(f, "{}{} @{}", self.kind, self.id, due),
            _ => write!(f, "{}{}", self.kind, self.id),
        }
    }
}

/// Which engine a factory should build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerMode {
    /// Virtual clock advanced by fired work.
    #[default]
    Virtual,
    /// Real clock backed by the async runtime's timers.
    Live,
}

impl std::fmt::Display for TimerMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TimerMode::Virtual => "virtual",
            TimerMode::Live => "live",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for TimerMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "virtual" => Ok(TimerMode::Virtual),
            "live" => Ok(TimerMode::Live),
            other => Err(format!("unknown timer mode: {other}")),
        }
    }
}

/// Check a requested delay/period and convert it to whole milliseconds.
///
/// Fails with [`TimerError::InvalidDelay`] for NaN, infinities and negative
/// values. Fractions are floored; values beyond `u64::MAX` saturate.
pub fn validate_delay(ms: f64) -> Result<u64> {
    if !ms.is_finite() || ms < 0.0 {
        return Err(TimerError::InvalidDelay { ms });
    }
    // `as` saturates for out-of-range floats.
    Ok(ms.floor() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_strictly_increase() {
        let a = TimerId::next();
        let b = TimerId::next();
        let c = TimerId::next();
        assert!(a < b);
        assert!(b < c);
        assert!(a.raw() >= 1);
    }

    #[test]
    fn validate_rejects_non_finite_and_negative() {
        assert!(validate_delay(-1.0).is_err());
        assert!(validate_delay(-0.5).is_err());
        assert!(validate_delay(f64::INFINITY).is_err());
        assert!(validate_delay(f64::NEG_INFINITY).is_err());
        assert!(validate_delay(f64::NAN).is_err());
    }

    #[test]
    fn validate_floors_fractions() {
        assert_eq!(validate_delay(0.0).unwrap(), 0);
        assert_eq!(validate_delay(0.9).unwrap(), 0);
        assert_eq!(validate_delay(10.7).unwrap(), 10);
        assert_eq!(validate_delay(10_000.0).unwrap(), 10_000);
    }

    #[test]
    fn validate_saturates_huge_values() {
        assert_eq!(validate_delay(1e300).unwrap(), u64::MAX);
    }

    #[test]
    fn mode_round_trips_through_str() {
        assert_eq!("virtual".parse::<TimerMode>().unwrap(), TimerMode::Virtual);
        assert_eq!("live".parse::<TimerMode>().unwrap(), TimerMode::Live);
        assert!("fake".parse::<TimerMode>().is_err());
        assert_eq!(TimerMode::Live.to_string(), "live");
        assert_eq!(TimerMode::default(), TimerMode::Virtual);
    }

    #[test]
    fn handle_display() {
        let id = TimerId::next();
        let h = TimerHandle::interval(id, 100, 50);
        assert_eq!(h.to_string(), format!("interval{id} @100 every 50ms"));
        let h = TimerHandle::immediate(id);
        assert_eq!(h.to_string(), format!("immediate{id}"));
    }

    #[test]
    fn handle_serializes_kind_snake_case() {
        let h = TimerHandle::timeout(TimerId::next(), 10);
        let json = serde_json::to_string(&h).unwrap();
        assert!(json.contains(r#""kind":"timeout""#));
        assert!(json.contains(r#""due_at":10"#));
        assert!(json.contains(r#""period_ms":null"#));
    }
}
