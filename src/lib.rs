//! Taskscope: structured concurrency for thread-based tasks.
//!
//! # Overview
//!
//! Taskscope makes the lifetime of every child task a strict sub-interval
//! of the lifetime of its parent's scope. [`scoped`] opens a scope; the
//! fork variants start children inside it; when the scope terminates, for
//! any reason, every child is interrupted and joined before control
//! returns to the caller. A child failure either propagates to the parent
//! promptly or is surfaced through the child's handle, according to the
//! fork variant chosen.
//!
//! # Core guarantees
//!
//! - **No orphan tasks**: every child is owned by its scope; closure joins
//!   all children on every exit path
//! - **Fork-after-close fails**: a scope that has begun closing rejects
//!   new children synchronously, with no task spawned
//! - **Prompt failure propagation**: a propagating child's failure is
//!   delivered to the parent as an asynchronous interrupt and re-raised by
//!   [`scoped`] as the child's original error
//! - **One cancellation vector**: scope closure delivers one distinguished
//!   interrupt; children cooperate by observing it at blocking points and
//!   checkpoints
//!
//! # Example
//!
//! ```
//! use taskscope::{scoped, Cx};
//!
//! let cx = Cx::for_thread();
//! let doubled = scoped(&cx, |scope| {
//!     let handle = scope.fork(&cx, |_cx| Ok(21 * 2))?;
//!     handle.join(&cx)
//! })?;
//! assert_eq!(doubled, 42);
//! # Ok::<(), taskscope::Error>(())
//! ```
//!
//! # Module structure
//!
//! - [`types`]: identifiers, interrupts, outcomes
//! - [`error`]: the typed error surface
//! - [`task`]: the cooperative interruptible task layer
//! - [`cx`]: capability context and masking
//! - [`scope`]: scopes, fork variants, joinable handles
//! - [`tracing_compat`]: feature-gated structured logging

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::doc_markdown)]

pub mod cx;
pub mod error;
pub mod scope;
pub mod task;
pub mod tracing_compat;
pub mod types;

pub(crate) mod sync;

// Re-exports for convenient access to the core surface.
pub use cx::{Cx, Unmask};
pub use error::{Error, ErrorKind, Result};
pub use scope::{scoped, Scope, Thread, TryThread};
pub use task::Task;
pub use types::{ChildId, Interrupt, Outcome, PanicPayload, ScopeId, TaskId};
