//! Waiter registration for transactional blocking.
//!
//! Blocking operations register the waiting task with the object they wait
//! on, then park on their own parker in a predicate-check loop. Mutations
//! that might satisfy a predicate call `notify_all`, which unparks every
//! registered task; each woken task re-evaluates its predicate and either
//! proceeds or parks again. Registration must precede the first predicate
//! check, otherwise a notification can fall between check and park and the
//! wake-up is lost.

use crate::cx::Cx;
use crate::error::Result;
use crate::task::state::TaskState;
use crate::types::TaskId;
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// A set of tasks parked on one object.
#[derive(Debug, Default)]
pub(crate) struct WaiterSet {
    inner: Mutex<Vec<(TaskId, Arc<TaskState>)>>,
}

impl WaiterSet {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Registers a task; the guard unregisters on drop.
    pub(crate) fn register<'a>(&'a self, state: &Arc<TaskState>) -> WaiterGuard<'a> {
        let id = state.id();
        self.inner
            .lock()
            .expect("lock poisoned")
            .push((id, Arc::clone(state)));
        WaiterGuard { set: self, id }
    }

    /// Unparks every registered task.
    pub(crate) fn notify_all(&self) {
        let waiters: Vec<Arc<TaskState>> = self
            .inner
            .lock()
            .expect("lock poisoned")
            .iter()
            .map(|(_, state)| Arc::clone(state))
            .collect();
        for waiter in waiters {
            waiter.parker().unpark();
        }
    }

    fn unregister(&self, id: TaskId) {
        let mut inner = self.inner.lock().expect("lock poisoned");
        if let Some(index) = inner.iter().position(|(waiter, _)| *waiter == id) {
            inner.swap_remove(index);
        }
    }
}

/// Registration handle; unregisters the task when dropped.
pub(crate) struct WaiterGuard<'a> {
    set: &'a WaiterSet,
    id: TaskId,
}

impl Drop for WaiterGuard<'_> {
    fn drop(&mut self) {
        self.set.unregister(self.id);
    }
}

/// Parks the calling task until `ready` holds, an interrupt is observed, or
/// the deadline passes.
///
/// Returns `Ok(true)` when the predicate held, `Ok(false)` on timeout, and
/// the interruption error otherwise. While the caller is masked, pending
/// interrupts stay queued and the wait continues; this is what makes the
/// scope's shutdown fence uninterruptible without extra machinery.
pub(crate) fn block_on(
    cx: &Cx,
    waiters: &WaiterSet,
    deadline: Option<Instant>,
    mut ready: impl FnMut() -> bool,
) -> Result<bool> {
    let _registration = waiters.register(cx.state());
    loop {
        if ready() {
            return Ok(true);
        }
        cx.checkpoint()?;
        match deadline {
            Some(deadline) => {
                if !cx.state().parker().park_deadline(deadline) {
                    return Ok(ready());
                }
            }
            None => cx.state().parker().park(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Interrupt;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[test]
    fn ready_predicate_returns_immediately() {
        let cx = Cx::for_thread();
        let waiters = WaiterSet::new();
        let done = block_on(&cx, &waiters, None, || true).expect("ready");
        assert!(done);
    }

    #[test]
    fn notification_wakes_the_waiter() {
        let cx = Cx::for_thread();
        let waiters = Arc::new(WaiterSet::new());
        let flag = Arc::new(AtomicBool::new(false));

        let remote_waiters = Arc::clone(&waiters);
        let remote_flag = Arc::clone(&flag);
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            remote_flag.store(true, Ordering::SeqCst);
            remote_waiters.notify_all();
        });

        let done = block_on(&cx, &waiters, None, || flag.load(Ordering::SeqCst)).expect("woken");
        assert!(done);
        handle.join().expect("thread panicked");
    }

    #[test]
    fn timeout_reports_not_ready() {
        let cx = Cx::for_thread();
        let waiters = WaiterSet::new();
        let deadline = Instant::now() + Duration::from_millis(10);
        let done = block_on(&cx, &waiters, Some(deadline), || false).expect("timed out");
        assert!(!done);
    }

    #[test]
    fn interrupt_aborts_the_wait() {
        let cx = Cx::for_thread();
        let waiters = WaiterSet::new();
        let task = cx.task();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            task.interrupt(Interrupt::foreign("stop waiting"));
        });
        let error = block_on(&cx, &waiters, None, || false).expect_err("interrupted");
        assert!(error.is_interrupt());
        handle.join().expect("thread panicked");
    }

    #[test]
    fn masked_wait_ignores_interrupts() {
        let cx = Cx::for_thread();
        let waiters = WaiterSet::new();
        cx.task().interrupt(Interrupt::foreign("deferred"));
        let deadline = Instant::now() + Duration::from_millis(20);
        let done = cx
            .masked(|| block_on(&cx, &waiters, Some(deadline), || false))
            .expect("masked wait completes by timeout");
        assert!(!done);
        // The interrupt is still pending for after the mask.
        assert!(cx.checkpoint().is_err());
    }

    #[test]
    fn guard_unregisters_on_drop() {
        let cx = Cx::for_thread();
        let waiters = WaiterSet::new();
        {
            let _guard = waiters.register(cx.state());
            assert_eq!(waiters.inner.lock().expect("lock poisoned").len(), 1);
        }
        assert!(waiters.inner.lock().expect("lock poisoned").is_empty());
    }
}
