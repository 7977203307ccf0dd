//! Single-assignment outcome cells.
//!
//! Each forked child publishes its outcome into a cell exactly once; the
//! publishing side is a consuming [`Publisher`], so a second assignment is
//! unrepresentable. The reading side blocks, with or without a deadline,
//! and detects abandonment: a publisher dropped without publishing marks
//! the cell unreachable, and a waiter fails after one further predicate
//! retry instead of blocking forever.

use crate::cx::Cx;
use crate::error::{Error, Result};
use crate::sync::waiters::WaiterSet;
use std::sync::{Arc, Mutex};
use std::time::Instant;

#[derive(Debug)]
struct CellInner<T> {
    value: Option<T>,
    abandoned: bool,
}

/// A write-once cell read by handle awaits.
#[derive(Debug)]
pub(crate) struct OutcomeCell<T> {
    inner: Mutex<CellInner<T>>,
    waiters: WaiterSet,
}

impl<T> OutcomeCell<T> {
    /// Creates an empty cell and its unique publisher.
    pub(crate) fn channel() -> (Arc<Self>, Publisher<T>) {
        let cell = Arc::new(Self {
            inner: Mutex::new(CellInner {
                value: None,
                abandoned: false,
            }),
            waiters: WaiterSet::new(),
        });
        let publisher = Publisher {
            cell: Arc::clone(&cell),
            published: false,
        };
        (cell, publisher)
    }

    /// Returns true if the outcome has been published.
    pub(crate) fn is_set(&self) -> bool {
        self.inner.lock().expect("lock poisoned").value.is_some()
    }

    /// Takes the published outcome, if present.
    pub(crate) fn try_take(&self) -> Option<T> {
        self.inner.lock().expect("lock poisoned").value.take()
    }

    /// Blocks until the outcome is published.
    ///
    /// Returns `Ok(true)` when published, `Ok(false)` if the deadline
    /// passed first.
    ///
    /// # Errors
    ///
    /// `ErrorKind::Interrupted` if the caller observes an interrupt while
    /// waiting; `ErrorKind::Unreachable` if the publisher vanished without
    /// publishing (checked once more after first observation, in case the
    /// publication raced the abandonment signal).
    pub(crate) fn wait_deadline(&self, cx: &Cx, deadline: Option<Instant>) -> Result<bool> {
        let _registration = self.waiters.register(cx.state());
        let mut abandonment_seen = false;
        loop {
            {
                let inner = self.inner.lock().expect("lock poisoned");
                if inner.value.is_some() {
                    return Ok(true);
                }
                if inner.abandoned {
                    if abandonment_seen {
                        return Err(Error::unreachable_handle());
                    }
                    // Retry the predicate once without parking; a second
                    // observation means the cell will never fill.
                    abandonment_seen = true;
                    continue;
                }
            }
            cx.checkpoint()?;
            match deadline {
                Some(deadline) => {
                    if !cx.state().parker().park_deadline(deadline) {
                        return Ok(self.is_set());
                    }
                }
                None => cx.state().parker().park(),
            }
        }
    }

    fn publish(&self, value: T) {
        let mut inner = self.inner.lock().expect("lock poisoned");
        debug_assert!(inner.value.is_none(), "outcome published twice");
        inner.value = Some(value);
        drop(inner);
        self.waiters.notify_all();
    }

    fn abandon(&self) {
        let mut inner = self.inner.lock().expect("lock poisoned");
        if inner.value.is_some() {
            return;
        }
        inner.abandoned = true;
        drop(inner);
        self.waiters.notify_all();
    }
}

/// The unique writing side of an [`OutcomeCell`].
///
/// Publishing consumes the publisher, so each cell is assigned at most
/// once by construction. Dropping an unused publisher marks the cell
/// abandoned so readers fail instead of blocking forever.
#[derive(Debug)]
pub(crate) struct Publisher<T> {
    cell: Arc<OutcomeCell<T>>,
    published: bool,
}

impl<T> Publisher<T> {
    /// Publishes the outcome and wakes all waiters.
    pub(crate) fn publish(mut self, value: T) {
        self.published = true;
        self.cell.publish(value);
    }
}

impl<T> Drop for Publisher<T> {
    fn drop(&mut self) {
        if !self.published {
            self.cell.abandon();
        }
    }
}
