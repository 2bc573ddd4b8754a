use thiserror::Error;

#[derive(Debug, Error)]
pub enum TimerError {
    /// A delay or period that is NaN, infinite or negative.
    #[error("Invalid delay: {ms} (must be a finite number >= 0)")]
    InvalidDelay { ms: f64 },

    #[error("Configuration error: {0}")]
    Config(String),

    /// The timer backing an awaited sleep was cleared before it fired.
    #[error("Timer cancelled before firing")]
    Cancelled,
}

impl TimerError {
    /// Short, stable error code for logs and CLI output.
    pub fn code(&self) -> &'static str {
        match self {
            TimerError::InvalidDelay { .. } => "INVALID_DELAY",
            TimerError::Config(_) => "CONFIG_ERROR",
            TimerError::Cancelled => "CANCELLED",
        }
    }
}

pub type Result<T> = std::result::Result<T, TimerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_delay_mentions_value() {
        let e = TimerError::InvalidDelay { ms: -1.0 };
        assert!(e.to_string().contains("-1"));
        assert_eq!(e.code(), "INVALID_DELAY");
    }

    #[test]
    fn codes_are_distinct() {
        let codes = [
            TimerError::InvalidDelay { ms: f64::NAN }.code(),
            TimerError::Config("x".into()).code(),
            TimerError::Cancelled.code(),
        ];
        assert_ne!(codes[0], codes[1]);
        assert_ne!(codes[1], codes[2]);
        assert_ne!(codes[0], codes[2]);
    }

    #[test]
    fn is_std_error() {
        let e: Box<dyn std::error::Error> = Box::new(TimerError::Cancelled);
        assert!(!e.to_string().is_empty());
    }
}
