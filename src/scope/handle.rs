//! Joinable handles to forked children.
//!
//! Both handle flavors wrap the same raw handle: the child's task, its
//! child id, and the shared outcome cell. They differ only in what joining
//! yields. [`Thread`] re-raises the child's error in the awaiter;
//! [`TryThread`] returns the outcome verbatim.
//!
//! Joining consumes the handle, which is what makes each outcome readable
//! exactly once; the non-consuming `wait`/`wait_for`/`is_finished` surface
//! is the composable readiness event for callers that only need to know
//! *whether* the child finished.
//!
//! Equality, ordering, and hashing are by the underlying task id.

use crate::cx::Cx;
use crate::error::{Error, ErrorKind, Result};
use crate::sync::outcome_cell::OutcomeCell;
use crate::task::spawn::Task;
use crate::types::{ChildId, Outcome};
use core::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared plumbing for both handle flavors.
pub(crate) struct RawHandle<T> {
    pub(crate) task: Task,
    pub(crate) child: ChildId,
    pub(crate) cell: Arc<OutcomeCell<Outcome<T>>>,
}

impl<T> RawHandle<T> {
    fn wait(&self, cx: &Cx) -> Result<()> {
        self.cell.wait_deadline(cx, None).map(|_| ())
    }

    fn wait_for(&self, cx: &Cx, timeout: Duration) -> Result<bool> {
        self.cell.wait_deadline(cx, Some(Instant::now() + timeout))
    }

    fn take(&self) -> Result<Outcome<T>> {
        self.cell.try_take().ok_or_else(|| {
            Error::new(ErrorKind::Internal).with_context("published outcome vanished")
        })
    }
}

impl<T> fmt::Debug for RawHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("task", &self.task.id())
            .field("child", &self.child)
            .field("finished", &self.cell.is_set())
            .finish()
    }
}

macro_rules! common_handle_api {
    () => {
        /// Returns a deliverable handle to the child's task.
        #[must_use]
        pub fn task(&self) -> &Task {
            &self.raw.task
        }

        /// Returns the child's id within its scope.
        #[must_use]
        pub fn child_id(&self) -> ChildId {
            self.raw.child
        }

        /// Returns true once the child's outcome has been published.
        #[must_use]
        pub fn is_finished(&self) -> bool {
            self.raw.cell.is_set()
        }

        /// Blocks until the child's outcome is published.
        ///
        /// Non-consuming readiness wait; pair with `join` to read the
        /// outcome.
        ///
        /// # Errors
        ///
        /// `ErrorKind::Interrupted` if the caller is interrupted;
        /// `ErrorKind::Unreachable` if the handle can never complete.
        pub fn wait(&self, cx: &Cx) -> Result<()> {
            self.raw.wait(cx)
        }

        /// As [`Self::wait`], returning `Ok(false)` when `timeout` elapses
        /// first.
        pub fn wait_for(&self, cx: &Cx, timeout: Duration) -> Result<bool> {
            self.raw.wait_for(cx, timeout)
        }
    };
}

/// A joinable handle whose `join` re-raises the child's failure.
///
/// Produced by the propagating fork variants. Note that with those
/// variants the parent usually learns of the failure through propagation
/// before it joins; the handle is for reading produced values.
pub struct Thread<T> {
    pub(crate) raw: RawHandle<T>,
}

impl<T> Thread<T> {
    common_handle_api!();

    /// Blocks until the child completes, yielding its value or re-raising
    /// its error.
    ///
    /// # Errors
    ///
    /// The child's own error if it raised; `ErrorKind::Interrupted` if the
    /// caller is interrupted while waiting; `ErrorKind::Unreachable` if
    /// the handle can never complete.
    pub fn join(self, cx: &Cx) -> Result<T> {
        self.raw.wait(cx)?;
        self.raw.take()?.into_result()
    }

    /// Timed [`Self::join`]. Returns the handle back when `timeout`
    /// elapses before the child completes.
    ///
    /// # Errors
    ///
    /// Inside the `Ok` arm, exactly as [`Self::join`].
    pub fn join_for(self, cx: &Cx, timeout: Duration) -> core::result::Result<Result<T>, Self> {
        match self.raw.wait_for(cx, timeout) {
            Ok(true) => Ok(self.raw.take().and_then(Outcome::into_result)),
            Ok(false) => Err(self),
            Err(error) => Ok(Err(error)),
        }
    }
}

/// A joinable handle whose `join` yields the child's [`Outcome`] verbatim.
///
/// Produced by the capturing fork variants: the child's synchronous
/// failures and scope-closure interrupts surface here and nowhere else.
pub struct TryThread<T> {
    pub(crate) raw: RawHandle<T>,
}

impl<T> TryThread<T> {
    common_handle_api!();

    /// Blocks until the child completes, yielding its outcome.
    ///
    /// # Errors
    ///
    /// Only caller-side failures: `ErrorKind::Interrupted` if the caller
    /// is interrupted while waiting, `ErrorKind::Unreachable` if the
    /// handle can never complete. The child's own failure is inside the
    /// returned outcome.
    pub fn join(self, cx: &Cx) -> Result<Outcome<T>> {
        self.raw.wait(cx)?;
        self.raw.take()
    }

    /// Timed [`Self::join`]. Returns the handle back when `timeout`
    /// elapses before the child completes.
    pub fn join_for(
        self,
        cx: &Cx,
        timeout: Duration,
    ) -> core::result::Result<Result<Outcome<T>>, Self> {
        match self.raw.wait_for(cx, timeout) {
            Ok(true) => Ok(self.raw.take()),
            Ok(false) => Err(self),
            Err(error) => Ok(Err(error)),
        }
    }
}

macro_rules! handle_identity_impls {
    ($handle:ident) => {
        impl<T> fmt::Debug for $handle<T> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.raw.fmt(f)
            }
        }

        impl<T> PartialEq for $handle<T> {
            fn eq(&self, other: &Self) -> bool {
                self.raw.task.id() == other.raw.task.id()
            }
        }

        impl<T> Eq for $handle<T> {}

        impl<T> PartialOrd for $handle<T> {
            fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
                Some(self.cmp(other))
            }
        }

        impl<T> Ord for $handle<T> {
            fn cmp(&self, other: &Self) -> core::cmp::Ordering {
                self.raw.task.id().cmp(&other.raw.task.id())
            }
        }

        impl<T> Hash for $handle<T> {
            fn hash<H: Hasher>(&self, state: &mut H) {
                self.raw.task.id().hash(state);
            }
        }
    };
}

handle_identity_impls!(Thread);
handle_identity_impls!(TryThread);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::outcome_cell::Publisher;
    use crate::task::state::TaskState;
    use crate::types::ChildId;

    fn raw_handle<T>() -> (RawHandle<T>, Publisher<Outcome<T>>) {
        let (cell, publisher) = OutcomeCell::channel();
        let raw = RawHandle {
            task: Task::from_state(TaskState::new("child")),
            child: ChildId::from_index(0),
            cell,
        };
        (raw, publisher)
    }

    #[test]
    fn join_yields_the_published_value() {
        let cx = Cx::for_thread();
        let (raw, publisher) = raw_handle();
        publisher.publish(Outcome::Value(11));
        let handle = Thread { raw };
        assert!(handle.is_finished());
        assert_eq!(handle.join(&cx).expect("value"), 11);
    }

    #[test]
    fn join_reraises_the_published_error() {
        let cx = Cx::for_thread();
        let (raw, publisher) = raw_handle::<()>();
        publisher.publish(Outcome::Raised(Error::user("child died")));
        let handle = Thread { raw };
        let error = handle.join(&cx).expect_err("raised");
        assert_eq!(error.kind(), ErrorKind::User);
        assert_eq!(error.context(), Some("child died"));
    }

    #[test]
    fn try_join_returns_the_outcome_verbatim() {
        let cx = Cx::for_thread();
        let (raw, publisher) = raw_handle::<()>();
        publisher.publish(Outcome::Raised(Error::user("captured")));
        let handle = TryThread { raw };
        let outcome = handle.join(&cx).expect("outcome readable");
        assert!(outcome.is_raised());
    }

    #[test]
    fn join_for_returns_the_handle_on_timeout() {
        let cx = Cx::for_thread();
        let (raw, publisher) = raw_handle();
        let handle = Thread { raw };
        let handle = handle
            .join_for(&cx, Duration::from_millis(10))
            .expect_err("not yet");
        publisher.publish(Outcome::Value(5));
        let value = handle
            .join_for(&cx, Duration::from_secs(5))
            .expect("finished")
            .expect("value");
        assert_eq!(value, 5);
    }

    #[test]
    fn handles_compare_by_task_id() {
        let (raw_a, _pa) = raw_handle::<()>();
        let (raw_b, _pb) = raw_handle::<()>();
        let a = Thread { raw: raw_a };
        let b = Thread { raw: raw_b };
        assert_ne!(a, b);
        assert_eq!(a.cmp(&b), a.task().id().cmp(&b.task().id()));
    }
}
