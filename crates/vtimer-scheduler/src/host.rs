//! "Run after the current turn" primitives.
//!
//! A [`Host`] accepts a continuation and runs it once, strictly after the
//! submitter's synchronous code has unwound, and after every continuation
//! submitted before it. The virtual engine never runs a callback itself; it
//! only ever hands a drain continuation to its host.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use tokio::task::AbortHandle;
use tracing::trace;

/// Identifier of a submitted continuation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeferId(u64);

impl DeferId {
    pub fn raw(self) -> u64 {
        self.0
    }
}

pub trait Host {
    /// Submit `task` to run once after the current synchronous turn.
    fn defer(&self, task: Box<dyn FnOnce()>) -> DeferId;

    /// Withdraw a continuation that has not started yet. Unknown or already
    /// executed ids are ignored.
    fn cancel(&self, id: DeferId);
}

// --- ManualHost -------------------------------------------------------------

#[derive(Default)]
struct ManualQueue {
    next: u64,
    tasks: BTreeMap<DeferId, Box<dyn FnOnce()>>,
}

/// Host whose continuations run only when the owner pumps it.
///
/// Fully synchronous and deterministic; the natural host for unit tests.
/// Clones share one queue.
#[derive(Clone, Default)]
pub struct ManualHost {
    queue: Rc<RefCell<ManualQueue>>,
}

impl ManualHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the oldest pending continuation. Returns `false` when none is queued.
    pub fn run_next(&self) -> bool {
        // The borrow must end before the task runs: tasks defer more work.
        let next = self.queue.borrow_mut().tasks.pop_first();
        match next {
            Some((id, task)) => {
                trace!(defer_id = id.0, "running deferred task");
                task();
                true
            }
            None => false,
        }
    }

    /// Run continuations until the queue stays empty. Returns how many ran.
    ///
    /// Never returns while an uncancelled interval keeps re-arming; use
    /// [`ManualHost::run_steps`] to bound such scenarios.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        while self.run_next() {
            ran += 1;
        }
        ran
    }

    /// Run at most `limit` continuations. Returns how many ran.
    pub fn run_steps(&self, limit: usize) -> usize {
        let mut ran = 0;
        while ran < limit && self.run_next() {
            ran += 1;
        }
        ran
    }

    pub fn pending(&self) -> usize {
        self.queue.borrow().tasks.len()
    }
}

impl Host for ManualHost {
    fn defer(&self, task: Box<dyn FnOnce()>) -> DeferId {
        let mut queue = self.queue.borrow_mut();
        let id = DeferId(queue.next);
        queue.next += 1;
        queue.tasks.insert(id, task);
        id
    }

    fn cancel(&self, id: DeferId) {
        self.queue.borrow_mut().tasks.remove(&id);
    }
}

impl std::fmt::Debug for ManualHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualHost")
            .field("pending", &self.pending())
            .finish()
    }
}

// --- TokioHost --------------------------------------------------------------

#[derive(Default)]
struct Spawned {
    next: u64,
    tasks: HashMap<DeferId, AbortHandle>,
}

/// Host backed by `tokio::task::spawn_local`.
///
/// A spawned local task cannot run before the current task yields, which is
/// exactly the deferral contract. `defer` must be called from inside a
/// `tokio::task::LocalSet`.
#[derive(Clone, Default)]
pub struct TokioHost {
    spawned: Rc<RefCell<Spawned>>,
}

impl TokioHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.spawned.borrow().tasks.len()
    }
}

impl Host for TokioHost {
    fn defer(&self, task: Box<dyn FnOnce()>) -> DeferId {
        let id = {
            let mut spawned = self.spawned.borrow_mut();
            let id = DeferId(spawned.next);
            spawned.next += 1;
            id
        };
        let registry = Rc::downgrade(&self.spawned);
        let handle = tokio::task::spawn_local(async move {
            if let Some(registry) = registry.upgrade() {
                registry.borrow_mut().tasks.remove(&id);
            }
            task();
        });
        self.spawned
            .borrow_mut()
            .tasks
            .insert(id, handle.abort_handle());
        id
    }

    fn cancel(&self, id: DeferId) {
        let handle = self.spawned.borrow_mut().tasks.remove(&id);
        if let Some(handle) = handle {
            handle.abort();
        }
    }
}

impl std::fmt::Debug for TokioHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokioHost")
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn manual_host_runs_in_submission_order() {
        let host = ManualHost::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        for n in 0..3 {
            let log = Rc::clone(&log);
            host.defer(Box::new(move || log.borrow_mut().push(n)));
        }
        assert_eq!(host.pending(), 3);
        assert_eq!(host.run_until_idle(), 3);
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn manual_host_defers_nested_submissions() {
        let host = ManualHost::new();
        let ran = Rc::new(Cell::new(0));
        let inner_host = host.clone();
        let inner_ran = Rc::clone(&ran);
        host.defer(Box::new(move || {
            inner_ran.set(inner_ran.get() + 1);
            let again = Rc::clone(&inner_ran);
            inner_host.defer(Box::new(move || again.set(again.get() + 1)));
        }));

        assert!(host.run_next());
        // The nested task is queued, not run inline.
        assert_eq!(ran.get(), 1);
        assert_eq!(host.pending(), 1);
        assert!(host.run_next());
        assert_eq!(ran.get(), 2);
        assert!(!host.run_next());
    }

    #[test]
    fn manual_host_cancel_is_idempotent() {
        let host = ManualHost::new();
        let ran = Rc::new(Cell::new(false));
        let flag = Rc::clone(&ran);
        let id = host.defer(Box::new(move || flag.set(true)));
        host.cancel(id);
        host.cancel(id);
        assert_eq!(host.run_until_idle(), 0);
        assert!(!ran.get());
    }

    #[test]
    fn manual_host_run_steps_is_bounded() {
        let host = ManualHost::new();
        for _ in 0..5 {
            host.defer(Box::new(|| {}));
        }
        assert_eq!(host.run_steps(2), 2);
        assert_eq!(host.pending(), 3);
    }

    #[tokio::test]
    async fn tokio_host_runs_after_current_turn() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let host = TokioHost::new();
                let ran = Rc::new(Cell::new(false));
                let flag = Rc::clone(&ran);
                host.defer(Box::new(move || flag.set(true)));
                assert!(!ran.get());
                assert_eq!(host.pending(), 1);

                for _ in 0..3 {
                    tokio::task::yield_now().await;
                }
                assert!(ran.get());
                assert_eq!(host.pending(), 0);
            })
            .await;
    }

    #[tokio::test]
    async fn tokio_host_cancel_prevents_run() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let host = TokioHost::new();
                let ran = Rc::new(Cell::new(false));
                let flag = Rc::clone(&ran);
                let id = host.defer(Box::new(move || flag.set(true)));
                host.cancel(id);
                host.cancel(id);
                for _ in 0..3 {
                    tokio::task::yield_now().await;
                }
                assert!(!ran.get());
            })
            .await;
    }
}
