use std::collections::BTreeMap;

use vtimer_core::TimerId;

/// A zero-delay deferred task.
pub(crate) struct ImmediateTask {
    pub id: TimerId,
    pub callback: Box<dyn FnOnce()>,
}

impl std::fmt::Debug for ImmediateTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImmediateTask").field("id", &self.id).finish()
    }
}

/// FIFO of immediates.
///
/// Keyed by id: ids are handed out in increasing order, so ascending key
/// order is enqueue order, and removal by id stays logarithmic.
#[derive(Debug, Default)]
pub(crate) struct ImmediateQueue {
    tasks: BTreeMap<TimerId, ImmediateTask>,
}

impl ImmediateQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, task: ImmediateTask) {
        self.tasks.insert(task.id, task);
    }

    pub fn dequeue(&mut self) -> Option<ImmediateTask> {
        self.tasks.pop_first().map(|(_, task)| task)
    }

    /// Drop a pending task; unknown or already-run ids are ignored.
    pub fn remove(&mut self, id: TimerId) -> Option<ImmediateTask> {
        self.tasks.remove(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: TimerId) -> ImmediateTask {
        ImmediateTask {
            id,
            callback: Box::new(|| {}),
        }
    }

    #[test]
    fn dequeues_in_fifo_order() {
        let mut q = ImmediateQueue::new();
        let ids: Vec<TimerId> = (0..4).map(|_| TimerId::next()).collect();
        for id in &ids {
            q.enqueue(task(*id));
        }
        let out: Vec<TimerId> = std::iter::from_fn(|| q.dequeue().map(|t| t.id)).collect();
        assert_eq!(out, ids);
    }

    #[test]
    fn remove_is_idempotent() {
        let mut q = ImmediateQueue::new();
        let a = TimerId::next();
        let b = TimerId::next();
        q.enqueue(task(a));
        q.enqueue(task(b));

        assert!(q.remove(a).is_some());
        assert!(q.remove(a).is_none());
        assert!(q.remove(TimerId::next()).is_none());
        assert_eq!(q.len(), 1);
        assert_eq!(q.dequeue().unwrap().id, b);
        assert!(q.dequeue().is_none());
    }
}
