//! Per-task state: interrupt mailbox and mask depth.
//!
//! Interrupt delivery is cooperative: `deliver` enqueues the interrupt and
//! unparks the target; the target observes it at its next blocking point or
//! explicit checkpoint, provided its mask depth is zero. Masked tasks keep
//! delivered interrupts queued until they unmask.

use crate::task::parker::Parker;
use crate::tracing_compat::trace;
use crate::types::{Interrupt, TaskId};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct TaskInner {
    /// Delivered-but-unobserved interrupts, in arrival order.
    pending: VecDeque<Interrupt>,
    /// Interrupts are observable only at depth zero.
    mask_depth: u32,
}

/// The shared record backing one task.
#[derive(Debug)]
pub(crate) struct TaskState {
    id: TaskId,
    name: String,
    inner: Mutex<TaskInner>,
    parker: Parker,
}

impl TaskState {
    /// Creates a fresh task record with mask depth zero.
    pub(crate) fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            id: TaskId::next(),
            name: name.into(),
            inner: Mutex::new(TaskInner::default()),
            parker: Parker::new(),
        })
    }

    /// Creates a task record whose initial mask depth is `depth`.
    ///
    /// Used by fork variants that start the child with the parent's
    /// fork-time mask instead of the default unmasked state.
    pub(crate) fn new_masked(name: impl Into<String>, depth: u32) -> Arc<Self> {
        let state = Self::new(name);
        state.inner.lock().expect("lock poisoned").mask_depth = depth;
        state
    }

    pub(crate) fn id(&self) -> TaskId {
        self.id
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn parker(&self) -> &Parker {
        &self.parker
    }

    /// Enqueues an interrupt and wakes the task.
    pub(crate) fn deliver(&self, interrupt: Interrupt) {
        {
            let mut inner = self.inner.lock().expect("lock poisoned");
            inner.pending.push_back(interrupt);
        }
        trace!(task = %self.id, "interrupt delivered");
        self.parker.unpark();
    }

    /// Takes the oldest pending interrupt if the task is unmasked.
    pub(crate) fn take_pending(&self) -> Option<Interrupt> {
        let mut inner = self.inner.lock().expect("lock poisoned");
        if inner.mask_depth > 0 {
            return None;
        }
        inner.pending.pop_front()
    }

    /// Removes and returns the first pending interrupt matching `pred`,
    /// regardless of the mask.
    ///
    /// This is scope-shutdown plumbing: the closing parent harvests
    /// propagation wrappers from its own mailbox while still masked.
    pub(crate) fn take_matching(
        &self,
        pred: impl Fn(&Interrupt) -> bool,
    ) -> Option<Interrupt> {
        let mut inner = self.inner.lock().expect("lock poisoned");
        let index = inner.pending.iter().position(pred)?;
        inner.pending.remove(index)
    }

    /// Returns true if any interrupt is pending, masked or not.
    pub(crate) fn has_pending(&self) -> bool {
        !self.inner.lock().expect("lock poisoned").pending.is_empty()
    }

    /// Returns the current mask depth.
    pub(crate) fn mask_depth(&self) -> u32 {
        self.inner.lock().expect("lock poisoned").mask_depth
    }

    /// Increments the mask depth.
    pub(crate) fn push_mask(&self) {
        let mut inner = self.inner.lock().expect("lock poisoned");
        inner.mask_depth += 1;
    }

    /// Decrements the mask depth.
    pub(crate) fn pop_mask(&self) {
        let mut inner = self.inner.lock().expect("lock poisoned");
        inner.mask_depth = inner.mask_depth.saturating_sub(1);
    }

    /// Replaces the mask depth, returning the previous value.
    ///
    /// Used by unmask windows: the caller restores the saved depth when the
    /// window closes.
    pub(crate) fn swap_mask_depth(&self, depth: u32) -> u32 {
        let mut inner = self.inner.lock().expect("lock poisoned");
        std::mem::replace(&mut inner.mask_depth, depth)
    }
}
