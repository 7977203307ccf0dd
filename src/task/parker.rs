//! Permit-based parking for blocked tasks.
//!
//! Every task owns one parker. Blocking operations park on it; state
//! changes that might unblock the task (outcome publication, scope
//! bookkeeping transitions, interrupt delivery) unpark it. The permit makes
//! wake-ups level-triggered: an unpark that races ahead of the park is not
//! lost, and spurious wake-ups are absorbed by the caller's retry loop.

use std::sync::{Condvar, Mutex};
use std::time::Instant;

/// A one-permit parking primitive.
#[derive(Debug, Default)]
pub(crate) struct Parker {
    permit: Mutex<bool>,
    cvar: Condvar,
}

impl Parker {
    /// Creates a parker with no stored permit.
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Blocks until a permit is available, then consumes it.
    pub(crate) fn park(&self) {
        let mut permit = self.permit.lock().expect("lock poisoned");
        while !*permit {
            permit = self.cvar.wait(permit).expect("lock poisoned");
        }
        *permit = false;
    }

    /// Blocks until a permit is available or the deadline passes.
    ///
    /// Returns `true` if a permit was consumed, `false` on timeout.
    pub(crate) fn park_deadline(&self, deadline: Instant) -> bool {
        let mut permit = self.permit.lock().expect("lock poisoned");
        loop {
            if *permit {
                *permit = false;
                return true;
            }
            let now = Instant::now();
            let Some(remaining) = deadline.checked_duration_since(now).filter(|d| !d.is_zero())
            else {
                return false;
            };
            let (guard, _timed_out) = self
                .cvar
                .wait_timeout(permit, remaining)
                .expect("lock poisoned");
            permit = guard;
        }
    }

    /// Stores a permit and wakes the parked task, if any.
    pub(crate) fn unpark(&self) {
        let mut permit = self.permit.lock().expect("lock poisoned");
        *permit = true;
        self.cvar.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn unpark_before_park_is_not_lost() {
        let parker = Parker::new();
        parker.unpark();
        parker.park();
    }

    #[test]
    fn park_deadline_times_out() {
        let parker = Parker::new();
        let woke = parker.park_deadline(Instant::now() + Duration::from_millis(10));
        assert!(!woke);
    }

    #[test]
    fn park_deadline_consumes_permit() {
        let parker = Parker::new();
        parker.unpark();
        let woke = parker.park_deadline(Instant::now() + Duration::from_secs(1));
        assert!(woke);
        // Permit was consumed; the next timed park must time out.
        let woke = parker.park_deadline(Instant::now() + Duration::from_millis(10));
        assert!(!woke);
    }

    #[test]
    fn cross_thread_unpark_wakes_parked_task() {
        let parker = Arc::new(Parker::new());
        let remote = Arc::clone(&parker);
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            remote.unpark();
        });
        parker.park();
        handle.join().expect("thread panicked");
    }
}
