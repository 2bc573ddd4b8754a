use std::collections::HashMap;

use vtimer_core::TimerId;

/// Maps a recurring event's stable id to the due time of its live Timeline
/// entry. The entry key is `(due_at, id)`, so the due time alone locates it.
#[derive(Debug, Default)]
pub(crate) struct IntervalIndex {
    live: HashMap<TimerId, u64>,
}

impl IntervalIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Point `id` at a newly armed occurrence.
    pub fn record(&mut self, id: TimerId, due_at: u64) {
        self.live.insert(id, due_at);
    }

    pub fn contains(&self, id: TimerId) -> bool {
        self.live.contains_key(&id)
    }

    pub fn remove(&mut self, id: TimerId) -> Option<u64> {
        self.live.remove(&id)
    }

    pub fn clear(&mut self) {
        self.live.clear();
    }
}
