use tracing::trace;

/// Current virtual time in ms.
///
/// Moves forward only to the due time of whatever just fired; the single
/// exception is [`VirtualClock::resync`], used by bulk clear.
#[derive(Debug, Clone, Copy)]
pub(crate) struct VirtualClock {
    now: u64,
}

impl VirtualClock {
    pub fn starting_at(now: u64) -> Self {
        Self { now }
    }

    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn advance_to(&mut self, due_at: u64) {
        debug_assert!(
            due_at >= self.now,
            "virtual clock moved backwards: {} -> {}",
            self.now,
            due_at
        );
        self.now = due_at;
    }

    /// Jump to an arbitrary time, discarding the simulated timeline.
    pub fn resync(&mut self, real_now: u64) {
        trace!(from = self.now, to = real_now, "virtual clock resynchronised");
        self.now = real_now;
    }
}
