//! The capability context type.
//!
//! `Cx` is the token that grants a task access to the interrupt protocol:
//! observing interrupts, masking their observation, and interruptible
//! blocking. Every effectful operation in the crate flows through an
//! explicit `Cx`; there is no ambient "current task" state.
//!
//! # Masking
//!
//! Masking is a per-task depth counter. While the depth is non-zero,
//! delivered interrupts stay queued and [`Cx::checkpoint`] returns `Ok`.
//! [`Cx::masked`] increments the depth for the duration of a closure;
//! [`Unmask`] reopens observation inside a masked region.

use crate::error::{Error, Result};
use crate::task::spawn::Task;
use crate::task::state::TaskState;
use crate::types::TaskId;
use core::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Guard that restores the mask depth on drop.
struct MaskGuard<'a> {
    state: &'a TaskState,
}

impl Drop for MaskGuard<'_> {
    fn drop(&mut self) {
        self.state.pop_mask();
    }
}

/// The capability context for a task.
///
/// A `Cx` is handed to every forked child and created once per root thread
/// with [`Cx::for_thread`]. It is cheaply clonable; clones share the same
/// task record, so interrupts and mask changes are visible to all clones.
/// The semantic contract is that a `Cx` belongs to the thread it was
/// created on and is not sent across task boundaries.
#[derive(Clone)]
pub struct Cx {
    state: Arc<TaskState>,
}

impl Cx {
    /// Creates the capability context for the calling thread.
    ///
    /// This is the entry point for threads that were not forked by a scope
    /// (for example `main`). Forked children receive their `Cx` from the
    /// scope and must not create another one.
    #[must_use]
    pub fn for_thread() -> Self {
        let name = std::thread::current()
            .name()
            .map_or_else(|| "task".to_owned(), ToOwned::to_owned);
        Self {
            state: TaskState::new(name),
        }
    }

    pub(crate) fn from_state(state: Arc<TaskState>) -> Self {
        Self { state }
    }

    pub(crate) fn state(&self) -> &Arc<TaskState> {
        &self.state
    }

    /// Returns this task's id.
    #[must_use]
    pub fn task_id(&self) -> TaskId {
        self.state.id()
    }

    /// Returns a deliverable handle to this task.
    #[must_use]
    pub fn task(&self) -> Task {
        Task::from_state(Arc::clone(&self.state))
    }

    /// Observes a pending interrupt, if any.
    ///
    /// This is the explicit observation point: if an interrupt is pending
    /// and the task is unmasked, it is removed from the mailbox and
    /// returned as an error, convenient with the `?` operator. While
    /// masked, `checkpoint` returns `Ok(())` even when interrupts are
    /// pending; they stay queued until the mask is released.
    ///
    /// # Errors
    ///
    /// Returns `ErrorKind::Interrupted` carrying the observed interrupt.
    pub fn checkpoint(&self) -> Result<()> {
        match self.state.take_pending() {
            Some(interrupt) => Err(Error::interrupted(interrupt)),
            None => Ok(()),
        }
    }

    /// Returns true if an interrupt is pending, masked or not.
    ///
    /// Unlike [`Cx::checkpoint`] this does not consume the interrupt.
    #[must_use]
    pub fn is_interrupt_pending(&self) -> bool {
        self.state.has_pending()
    }

    /// Executes a closure with interrupt observation masked.
    ///
    /// Masking nests; observation resumes when every mask is released.
    /// Use sparingly: a long-masked section defeats prompt cancellation.
    pub fn masked<R>(&self, f: impl FnOnce() -> R) -> R {
        self.state.push_mask();
        let _guard = MaskGuard { state: &self.state };
        f()
    }

    /// Returns the current mask depth.
    pub(crate) fn mask_depth(&self) -> u32 {
        self.state.mask_depth()
    }

    /// Runs a closure with the mask fully lifted, restoring it afterwards.
    ///
    /// Shutdown uses this for its delivery windows; it is not part of the
    /// public surface because arbitrary unmasking from library code would
    /// defeat the caller's critical sections.
    pub(crate) fn unmasked_window<R>(&self, f: impl FnOnce() -> R) -> R {
        let saved = self.state.swap_mask_depth(0);
        let result = f();
        let _ = self.state.swap_mask_depth(saved);
        result
    }

    /// Sleeps for `duration`, observing interrupts.
    ///
    /// # Errors
    ///
    /// Returns `ErrorKind::Interrupted` if an interrupt is delivered before
    /// the duration elapses and the task is unmasked.
    pub fn sleep(&self, duration: Duration) -> Result<()> {
        let deadline = Instant::now() + duration;
        loop {
            self.checkpoint()?;
            if !self.state.parker().park_deadline(deadline) {
                // Deadline passed; one final observation so an interrupt
                // that raced the timeout is not silently dropped.
                self.checkpoint()?;
                return Ok(());
            }
        }
    }

    /// Blocks until an interrupt is delivered, then returns it as an error.
    ///
    /// This is the idiomatic "block forever" body for children that only
    /// exist to be cancelled by scope closure.
    pub fn park(&self) -> Error {
        loop {
            if let Err(error) = self.checkpoint() {
                return error;
            }
            self.state.parker().park();
        }
    }
}

impl fmt::Debug for Cx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cx").field("task", &self.task_id()).finish()
    }
}

/// Capability to reopen interrupt observation inside a masked region.
///
/// Passed to the action of the `*_with_unmask` fork variants. `run`
/// executes a sub-action with the mask fully lifted and restores the
/// previous depth afterwards, so a child started masked can open windows
/// in which scope closure can reach it.
pub struct Unmask {
    state: Arc<TaskState>,
}

impl Unmask {
    pub(crate) fn new(state: Arc<TaskState>) -> Self {
        Self { state }
    }

    /// Runs `f` with interrupts observable, restoring the mask afterwards.
    pub fn run<R>(&self, f: impl FnOnce() -> R) -> R {
        let saved = self.state.swap_mask_depth(0);
        let result = f();
        let _ = self.state.swap_mask_depth(saved);
        result
    }
}

impl fmt::Debug for Unmask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unmask").finish_non_exhaustive()
    }
}
