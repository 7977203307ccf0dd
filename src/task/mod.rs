//! The interruptible task layer.
//!
//! The scope core assumes a host that can spawn tasks, deliver an
//! asynchronous interrupt to a task by id, and mask interrupt observation
//! within a task. This module is that host, rendered cooperatively on OS
//! threads: delivery enqueues into a per-task mailbox and wakes the target;
//! observation happens at blocking points and explicit checkpoints.

pub(crate) mod parker;
pub(crate) mod spawn;
pub(crate) mod state;

pub use spawn::Task;
