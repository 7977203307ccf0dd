//! The scope itself: opening, waiting, and the closing protocol.

use crate::cx::Cx;
use crate::error::{Error, Result};
use crate::scope::state::ScopeRecord;
use crate::sync::waiters::block_on;
use crate::task::spawn::Task;
use crate::tracing_compat::{debug, trace};
use crate::types::{Interrupt, PanicPayload, ScopeId};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A bounded interval during which child tasks may be forked.
///
/// A scope is opened by [`scoped`] and owned by the task that opened it.
/// Clones share the same record, so a clone captured past the body is
/// harmless: it observes the closed state and every fork on it fails.
///
/// No child outlives its scope: when the body returns or raises, the scope
/// interrupts every live child and blocks until all of them have
/// deregistered before control returns to the caller of [`scoped`].
#[derive(Clone)]
pub struct Scope {
    record: Arc<ScopeRecord>,
}

impl Scope {
    fn new(owner: Task) -> Self {
        Self {
            record: ScopeRecord::new(owner),
        }
    }

    pub(crate) fn record(&self) -> &Arc<ScopeRecord> {
        &self.record
    }

    /// Returns this scope's id.
    #[must_use]
    pub fn id(&self) -> ScopeId {
        self.record.id()
    }

    /// Returns the number of live children.
    #[must_use]
    pub fn child_count(&self) -> usize {
        self.record.child_count()
    }

    /// Returns true when no child is live and no admission is pending.
    ///
    /// This is the composable form of [`Scope::wait`]: it never blocks.
    #[must_use]
    pub fn is_quiescent(&self) -> bool {
        self.record.is_quiescent()
    }

    /// Blocks until the scope has no live children and no admission in
    /// flight. Idempotent: on a quiesced scope it returns immediately.
    ///
    /// # Errors
    ///
    /// `ErrorKind::Interrupted` if the caller observes an interrupt while
    /// waiting; with the propagating fork variants this is how a child
    /// failure reaches a parent parked here.
    pub fn wait(&self, cx: &Cx) -> Result<()> {
        block_on(cx, self.record.waiters(), None, || self.record.is_quiescent()).map(|_| ())
    }

    /// As [`Scope::wait`], returning `Ok(false)` when `timeout` elapses
    /// with children remaining. Timing out cancels nothing.
    ///
    /// # Errors
    ///
    /// As [`Scope::wait`].
    pub fn wait_for(&self, cx: &Cx, timeout: Duration) -> Result<bool> {
        block_on(cx, self.record.waiters(), Some(Instant::now() + timeout), || {
            self.record.is_quiescent()
        })
    }

    /// The closing protocol. Runs masked in the owning task.
    fn close<T>(&self, cx: &Cx, body_result: Result<T>) -> Result<T> {
        cx.masked(|| {
            // Step 1: wait out in-flight admissions, write the closed
            // sentinel, and snapshot the live set. The wait is bounded by
            // the admission protocol itself, which holds no locks across
            // anything slower than a thread spawn.
            let mut snapshot = Vec::new();
            let _ = block_on(cx, self.record.waiters(), None, || {
                self.record.try_begin_close().is_some_and(|children| {
                    snapshot = children;
                    true
                })
            });
            debug!(scope = %self.id(), children = snapshot.len(), "scope closing");

            // Step 2: interrupt every live child. Each delivery sits in a
            // brief unmasked window so a party interrupting the shutter is
            // not deadlocked against it; the first foreign interrupt taken
            // in a window is retained, and a child failure that surfaces
            // here is recorded for resolution.
            let mut child_failure: Option<Error> = None;
            let mut shutdown_interrupt: Option<Error> = None;
            for (_child, task) in &snapshot {
                if let Some(interrupt) = cx.unmasked_window(|| cx.state().take_pending()) {
                    classify(interrupt, &mut child_failure, &mut shutdown_interrupt);
                }
                trace!(scope = %self.id(), child = %_child, task = %task.id(), "interrupting child");
                task.interrupt(Interrupt::scope_close(self.id()));
            }

            // Step 3: the join fence. Uninterruptible; every child
            // deregisters after publishing its outcome, so once the fence
            // lifts every handle is readable.
            let _ = block_on(cx, self.record.waiters(), None, || self.record.is_drained());
            debug!(scope = %self.id(), "scope drained");

            // Step 4: resolve the surfaced outcome. Wrappers that arrived
            // while the fence was up are harvested from the mailbox so no
            // propagation wrapper ever escapes to user code.
            while let Some(wrapper) = cx.state().take_matching(Interrupt::is_child_failure) {
                classify(wrapper, &mut child_failure, &mut shutdown_interrupt);
            }
            // An interrupt that reached the shutter during the fence is
            // part of the close; consume one so it surfaces here (or is
            // discarded in favor of a failure) instead of leaking into the
            // caller's next checkpoint.
            let late = cx.state().take_matching(|i| !i.is_child_failure());
            if shutdown_interrupt.is_none() {
                shutdown_interrupt = late.map(Error::interrupted);
            }
            resolve(body_result, child_failure, shutdown_interrupt)
        })
    }
}

impl core::fmt::Debug for Scope {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.id())
            .field("children", &self.child_count())
            .field("closed", &self.record.is_closed())
            .finish()
    }
}

/// Sorts an interrupt taken by the shutter into the resolution slots,
/// keeping the first of each kind.
fn classify(
    interrupt: Interrupt,
    child_failure: &mut Option<Error>,
    shutdown_interrupt: &mut Option<Error>,
) {
    match interrupt.into_child_failure() {
        Ok((_, original)) => {
            if child_failure.is_none() {
                *child_failure = Some(original);
            }
        }
        Err(interrupt) => {
            if shutdown_interrupt.is_none() {
                *shutdown_interrupt = Some(Error::interrupted(interrupt));
            }
        }
    }
}

/// The surfaced-outcome precedence: the first unrecovered child failure,
/// else the body's own failure, else an interrupt the shutter received
/// while closing, else the body's value.
fn resolve<T>(
    body_result: Result<T>,
    child_failure: Option<Error>,
    shutdown_interrupt: Option<Error>,
) -> Result<T> {
    match body_result {
        Err(error) => match error.into_child_failure() {
            // The body observed a propagated child failure; surface the
            // child's original error, not the wrapper.
            Ok(original) => Err(original),
            Err(own) => Err(child_failure.unwrap_or(own)),
        },
        Ok(value) => match (child_failure, shutdown_interrupt) {
            (Some(failure), _) => Err(failure),
            (None, Some(interrupt)) => Err(interrupt),
            (None, None) => Ok(value),
        },
    }
}

/// Opens a scope, runs `body` with it, and joins every child before
/// returning.
///
/// Returns the body's value if the body and all propagating children
/// succeeded. Otherwise raises, in order of precedence: the first
/// unrecovered child failure (the child's original error, never the
/// internal propagation wrapper), the body's own failure (a panicking
/// body is captured as `ErrorKind::Panicked`), or the first foreign
/// interrupt the shutter received while closing.
///
/// On every exit path, all children are interrupted with the scope-closure
/// interrupt and joined before this function returns. A child that catches
/// and discards the closure interrupt without terminating blocks the join
/// fence indefinitely; correctness requires cooperation.
///
/// # Errors
///
/// See above; the error classification is on [`crate::ErrorKind`].
pub fn scoped<T>(cx: &Cx, body: impl FnOnce(&Scope) -> Result<T>) -> Result<T> {
    let scope = Scope::new(cx.task());
    debug!(scope = %scope.id(), task = %cx.task_id(), "scope opened");
    let body_result = match catch_unwind(AssertUnwindSafe(|| body(&scope))) {
        Ok(result) => result,
        Err(payload) => Err(Error::panicked(PanicPayload::from_unwind(payload))),
    };
    scope.close(cx, body_result)
}
