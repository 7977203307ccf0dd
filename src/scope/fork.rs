//! Fork variants and the child entry point.
//!
//! The variants are one mechanism under three policy axes:
//!
//! - **propagate vs. capture**: whether a child failure is raised in the
//!   parent ([`Scope::fork`]) or only recorded on the handle
//!   ([`Scope::fork_try`]),
//! - **handle returned or discarded** ([`Scope::fork_detached`]),
//! - **initial mask**: children start unmasked by default; the
//!   `*_with_unmask` variants start the child with the parent's fork-time
//!   mask and hand the action an [`Unmask`] capability.

use crate::cx::{Cx, Unmask};
use crate::error::{Error, Result};
use crate::scope::handle::{RawHandle, Thread, TryThread};
use crate::scope::scope::Scope;
use crate::scope::state::ScopeRecord;
use crate::sync::outcome_cell::{OutcomeCell, Publisher};
use crate::sync::waiters::block_on;
use crate::task::spawn::{spawn_thread, Task};
use crate::task::state::TaskState;
use crate::tracing_compat::trace;
use crate::types::{ChildId, Interrupt, Outcome, PanicPayload};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// What a completed child does with a raised error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FailurePolicy {
    /// Propagate every failure to the parent, except a scope-closure
    /// interrupt once the scope is closed.
    Raise,
    /// Record the outcome on the handle; propagate only asynchronous
    /// interrupts that did not come from this scope's own shutdown.
    Capture,
}

/// The interrupt mask a child starts with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChildMask {
    /// Observation enabled regardless of the parent's state at fork time.
    Unmasked,
    /// The parent's fork-time mask depth, reopened through [`Unmask`].
    Inherit,
}

impl Scope {
    /// Forks a child whose failure propagates to the parent.
    ///
    /// The returned [`Thread`] re-raises the child's error when joined;
    /// independently of the handle, any failure other than this scope's
    /// own closure interrupt is delivered to the parent asynchronously.
    ///
    /// # Errors
    ///
    /// `ErrorKind::ScopeClosed` if the scope has begun shutting down;
    /// `ErrorKind::Spawn` if the host could not start a thread. Neither
    /// leaves a child behind.
    pub fn fork<T, F>(&self, cx: &Cx, f: F) -> Result<Thread<T>>
    where
        T: Send + 'static,
        F: FnOnce(&Cx) -> Result<T> + Send + 'static,
    {
        self.fork_raw(cx, ChildMask::Unmasked, FailurePolicy::Raise, f)
            .map(|raw| Thread { raw })
    }

    /// As [`Scope::fork`], without exposing a handle.
    ///
    /// The child is still owned by the scope and joined at closure; only
    /// the handle is omitted.
    ///
    /// # Errors
    ///
    /// As [`Scope::fork`].
    pub fn fork_detached<F>(&self, cx: &Cx, f: F) -> Result<()>
    where
        F: FnOnce(&Cx) -> Result<()> + Send + 'static,
    {
        self.fork_raw(cx, ChildMask::Unmasked, FailurePolicy::Raise, f)
            .map(drop)
    }

    /// As [`Scope::fork`], starting the child with the parent's fork-time
    /// mask and passing the action an [`Unmask`] capability.
    ///
    /// # Errors
    ///
    /// As [`Scope::fork`].
    pub fn fork_with_unmask<T, F>(&self, cx: &Cx, f: F) -> Result<Thread<T>>
    where
        T: Send + 'static,
        F: FnOnce(&Cx, &Unmask) -> Result<T> + Send + 'static,
    {
        self.fork_raw(cx, ChildMask::Inherit, FailurePolicy::Raise, with_unmask(f))
            .map(|raw| Thread { raw })
    }

    /// As [`Scope::fork_with_unmask`], without exposing a handle.
    ///
    /// # Errors
    ///
    /// As [`Scope::fork`].
    pub fn fork_detached_with_unmask<F>(&self, cx: &Cx, f: F) -> Result<()>
    where
        F: FnOnce(&Cx, &Unmask) -> Result<()> + Send + 'static,
    {
        self.fork_raw(cx, ChildMask::Inherit, FailurePolicy::Raise, with_unmask(f))
            .map(drop)
    }

    /// Forks a child whose outcome is captured on the handle.
    ///
    /// The returned [`TryThread`] yields the child's [`Outcome`] verbatim.
    /// Synchronous failures and this scope's closure interrupt stay on the
    /// handle; a foreign asynchronous interrupt still propagates to the
    /// parent.
    ///
    /// # Errors
    ///
    /// As [`Scope::fork`].
    pub fn fork_try<T, F>(&self, cx: &Cx, f: F) -> Result<TryThread<T>>
    where
        T: Send + 'static,
        F: FnOnce(&Cx) -> Result<T> + Send + 'static,
    {
        self.fork_raw(cx, ChildMask::Unmasked, FailurePolicy::Capture, f)
            .map(|raw| TryThread { raw })
    }

    /// As [`Scope::fork_try`], starting the child with the parent's
    /// fork-time mask and passing the action an [`Unmask`] capability.
    ///
    /// # Errors
    ///
    /// As [`Scope::fork`].
    pub fn fork_try_with_unmask<T, F>(&self, cx: &Cx, f: F) -> Result<TryThread<T>>
    where
        T: Send + 'static,
        F: FnOnce(&Cx, &Unmask) -> Result<T> + Send + 'static,
    {
        self.fork_raw(cx, ChildMask::Inherit, FailurePolicy::Capture, with_unmask(f))
            .map(|raw| TryThread { raw })
    }

    /// The admission protocol shared by every variant.
    ///
    /// Runs masked so no interrupt can strike between counting the child
    /// as pending and committing it live; an interrupt in that window
    /// would leak an admission that never resolves.
    fn fork_raw<T, F>(
        &self,
        cx: &Cx,
        mask: ChildMask,
        policy: FailurePolicy,
        f: F,
    ) -> Result<RawHandle<T>>
    where
        T: Send + 'static,
        F: FnOnce(&Cx) -> Result<T> + Send + 'static,
    {
        let record = self.record();
        let fork_depth = cx.mask_depth();
        cx.masked(|| {
            let child = record.begin_admission()?;
            let name = format!("{}-{}", record.id(), child);
            let state = match mask {
                ChildMask::Unmasked => TaskState::new(name),
                ChildMask::Inherit => TaskState::new_masked(name, fork_depth),
            };
            let (cell, publisher) = OutcomeCell::channel();

            let entry_record = Arc::clone(record);
            let entry_state = Arc::clone(&state);
            let entry = move || child_entry(&entry_record, child, entry_state, publisher, policy, f);

            if let Err(error) = spawn_thread(&state, entry) {
                record.abort_admission();
                return Err(error);
            }

            let task = Task::from_state(state);
            trace!(scope = %record.id(), child = %child, task = %task.id(), "child admitted");
            record.commit_admission(child, task.clone());
            Ok(RawHandle { task, child, cell })
        })
    }
}

/// Adapts a two-argument unmask action to the plain entry signature.
fn with_unmask<T, F>(f: F) -> impl FnOnce(&Cx) -> Result<T> + Send + 'static
where
    T: Send + 'static,
    F: FnOnce(&Cx, &Unmask) -> Result<T> + Send + 'static,
{
    move |cx: &Cx| {
        let unmask = Unmask::new(Arc::clone(cx.state()));
        f(cx, &unmask)
    }
}

/// Everything a child does between being spawned and disappearing.
///
/// Order matters: the outcome is captured first, the failure policy runs
/// against the scope's state at that moment, publication precedes
/// deregistration (so `wait` returning implies every outcome is readable),
/// and deregistration is the final step.
fn child_entry<T, F>(
    record: &Arc<ScopeRecord>,
    child: ChildId,
    state: Arc<TaskState>,
    publisher: Publisher<Outcome<T>>,
    policy: FailurePolicy,
    f: F,
) where
    T: Send + 'static,
    F: FnOnce(&Cx) -> Result<T> + Send + 'static,
{
    let cx = Cx::from_state(state);
    let outcome = match catch_unwind(AssertUnwindSafe(|| f(&cx))) {
        Ok(Ok(value)) => Outcome::Value(value),
        Ok(Err(error)) => Outcome::Raised(error),
        Err(payload) => Outcome::Raised(Error::panicked(PanicPayload::from_unwind(payload))),
    };

    // The finalizer must not be aborted midway; interrupts delivered from
    // here on stay in the mailbox and die with the task.
    cx.state().push_mask();

    if let Outcome::Raised(error) = &outcome {
        // A closure interrupt while the scope is still open was not
        // produced by this scope's shutdown; it counts as foreign.
        let own_closure = error.is_scope_closure() && record.is_closed();
        let propagate = match policy {
            FailurePolicy::Raise => !own_closure,
            FailurePolicy::Capture => error.is_interrupt() && !own_closure,
        };
        if propagate {
            trace!(scope = %record.id(), child = %child, "propagating child failure");
            record
                .owner()
                .interrupt(Interrupt::child_failure(child, Box::new(error.clone())));
        }
    }

    publisher.publish(outcome);

    // Deregistration races the admission commit; wait the commit out
    // rather than leaving a ghost entry behind.
    loop {
        if record.try_deregister(child) {
            trace!(scope = %record.id(), child = %child, "child deregistered");
            break;
        }
        let _ = block_on(&cx, record.waiters(), None, || record.contains(child));
    }
}
