//! Task handles and thread spawning.

use crate::error::{Error, Result};
use crate::task::state::TaskState;
use crate::tracing_compat::warn;
use crate::types::{Interrupt, TaskId};
use core::fmt;
use std::sync::Arc;

/// A lightweight, cloneable handle to a task.
///
/// A `Task` identifies a participant in the interrupt protocol; it does not
/// own the underlying thread. Holding one allows delivering asynchronous
/// interrupts; dropping every handle does not stop the task.
#[derive(Clone)]
pub struct Task {
    state: Arc<TaskState>,
}

impl Task {
    pub(crate) fn from_state(state: Arc<TaskState>) -> Self {
        Self { state }
    }

    /// Returns the task's id.
    #[must_use]
    pub fn id(&self) -> TaskId {
        self.state.id()
    }

    /// Returns the task's name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.state.name()
    }

    /// Delivers an asynchronous interrupt to this task.
    ///
    /// Delivery enqueues the interrupt and wakes the task; the target
    /// observes it at its next blocking point or checkpoint, once its mask
    /// depth reaches zero.
    pub fn interrupt(&self, interrupt: Interrupt) {
        self.state.deliver(interrupt);
    }

    pub(crate) fn state(&self) -> &Arc<TaskState> {
        &self.state
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id())
            .field("name", &self.name())
            .finish()
    }
}

impl PartialEq for Task {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Task {}

/// Spawns an OS thread for the given task record.
///
/// The thread is named after the task for debugger and trace legibility.
/// Spawn failure is surfaced as `ErrorKind::Spawn` so the caller can roll
/// back any bookkeeping it performed before the spawn.
pub(crate) fn spawn_thread(
    state: &Arc<TaskState>,
    body: impl FnOnce() + Send + 'static,
) -> Result<()> {
    let builder = std::thread::Builder::new().name(state.name().to_owned());
    match builder.spawn(body) {
        Ok(_join) => Ok(()),
        Err(source) => {
            warn!(task = %state.id(), "thread spawn failed");
            Err(Error::spawn_failed(source))
        }
    }
}
