//! The scope's shared transactional record.
//!
//! All cross-task coordination for one scope funnels through this record:
//! admission of new children, the `starting` pending-admission counter, the
//! live-children map, and the closed sentinel. Every method is one atomic
//! transition; the invariants hold at every lock release:
//!
//! - closed implies the children map only shrinks and no admission succeeds,
//! - every issued child id is either pending in `starting`, live in
//!   `children`, or deregistered,
//! - the record quiesces only when `children` is empty and no admission is
//!   pending.

use crate::error::{Error, Result};
use crate::sync::waiters::WaiterSet;
use crate::task::spawn::Task;
use crate::types::{ChildId, ScopeId};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// The pending-admission counter, with the closed sentinel folded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Starting {
    /// Scope accepts forks; `n` children are admitted but not yet live.
    Open(u32),
    /// Scope rejects forks; the children map may only shrink.
    Closed,
}

#[derive(Debug)]
struct ScopeInner {
    /// Live children, keyed by monotone child id. Iteration order at
    /// shutdown is id order, which keeps interrupt delivery reproducible.
    children: BTreeMap<ChildId, Task>,
    /// The next child id to issue. Never reused within this scope.
    next_id: u64,
    starting: Starting,
}

/// The shared record backing one scope.
#[derive(Debug)]
pub(crate) struct ScopeRecord {
    id: ScopeId,
    /// The task that opened the scope; child failures propagate here.
    owner: Task,
    inner: Mutex<ScopeInner>,
    waiters: WaiterSet,
}

impl ScopeRecord {
    pub(crate) fn new(owner: Task) -> Arc<Self> {
        Arc::new(Self {
            id: ScopeId::next(),
            owner,
            inner: Mutex::new(ScopeInner {
                children: BTreeMap::new(),
                next_id: 0,
                starting: Starting::Open(0),
            }),
            waiters: WaiterSet::new(),
        })
    }

    pub(crate) fn id(&self) -> ScopeId {
        self.id
    }

    pub(crate) fn owner(&self) -> &Task {
        &self.owner
    }

    pub(crate) fn waiters(&self) -> &WaiterSet {
        &self.waiters
    }

    /// Admission step 1: reserve a child id and count the child as pending.
    ///
    /// # Errors
    ///
    /// `ErrorKind::ScopeClosed` once shutdown has begun; no state changes.
    pub(crate) fn begin_admission(&self) -> Result<ChildId> {
        let mut inner = self.inner.lock().expect("lock poisoned");
        match inner.starting {
            Starting::Closed => Err(Error::scope_closed()),
            Starting::Open(pending) => {
                let child = ChildId::from_index(inner.next_id);
                inner.next_id += 1;
                inner.starting = Starting::Open(pending + 1);
                Ok(child)
            }
        }
    }

    /// Rolls an admission back after a failed spawn.
    pub(crate) fn abort_admission(&self) {
        let mut inner = self.inner.lock().expect("lock poisoned");
        match inner.starting {
            Starting::Open(pending) => {
                debug_assert!(pending > 0, "admission rollback without admission");
                inner.starting = Starting::Open(pending.saturating_sub(1));
            }
            Starting::Closed => debug_assert!(false, "admission rollback on closed scope"),
        }
        drop(inner);
        self.waiters.notify_all();
    }

    /// Admission step 3: record the child live and release its pending slot.
    ///
    /// After this commit the child is visible to shutdown for interrupt
    /// delivery.
    pub(crate) fn commit_admission(&self, child: ChildId, task: Task) {
        let mut inner = self.inner.lock().expect("lock poisoned");
        match inner.starting {
            Starting::Open(pending) => {
                debug_assert!(pending > 0, "admission commit without admission");
                inner.starting = Starting::Open(pending.saturating_sub(1));
            }
            // Shutdown blocks until no admission is pending, so a commit
            // can never observe the closed sentinel.
            Starting::Closed => debug_assert!(false, "admission commit on closed scope"),
        }
        let previous = inner.children.insert(child, task);
        debug_assert!(previous.is_none(), "child id reused");
        drop(inner);
        self.waiters.notify_all();
    }

    /// Removes a child from the live map.
    ///
    /// Returns `false` when the child is not recorded yet, in which case
    /// the caller must wait for the admission commit and retry; removing
    /// nothing here would leave a ghost entry that never deregisters.
    pub(crate) fn try_deregister(&self, child: ChildId) -> bool {
        let mut inner = self.inner.lock().expect("lock poisoned");
        let removed = inner.children.remove(&child).is_some();
        drop(inner);
        if removed {
            self.waiters.notify_all();
        }
        removed
    }

    /// Shutdown step 1: once no admission is pending, write the closed
    /// sentinel and snapshot the live children.
    ///
    /// Returns `None` while an admission is still in flight. Idempotent
    /// once closed (returns the current snapshot, which only shrinks).
    pub(crate) fn try_begin_close(&self) -> Option<Vec<(ChildId, Task)>> {
        let mut inner = self.inner.lock().expect("lock poisoned");
        match inner.starting {
            Starting::Open(0) | Starting::Closed => {
                inner.starting = Starting::Closed;
                Some(
                    inner
                        .children
                        .iter()
                        .map(|(child, task)| (*child, task.clone()))
                        .collect(),
                )
            }
            Starting::Open(_) => None,
        }
    }

    /// Returns true if the scope rejects new admissions.
    pub(crate) fn is_closed(&self) -> bool {
        self.inner.lock().expect("lock poisoned").starting == Starting::Closed
    }

    /// Returns true if the given child is recorded live.
    pub(crate) fn contains(&self, child: ChildId) -> bool {
        self.inner
            .lock()
            .expect("lock poisoned")
            .children
            .contains_key(&child)
    }

    /// Returns the number of live children.
    pub(crate) fn child_count(&self) -> usize {
        self.inner.lock().expect("lock poisoned").children.len()
    }

    /// Returns true once no child is live and no admission is pending.
    pub(crate) fn is_quiescent(&self) -> bool {
        let inner = self.inner.lock().expect("lock poisoned");
        inner.children.is_empty()
            && matches!(inner.starting, Starting::Open(0) | Starting::Closed)
    }

    /// Returns true once the scope is closed and every child has
    /// deregistered. This is the join-fence predicate.
    pub(crate) fn is_drained(&self) -> bool {
        let inner = self.inner.lock().expect("lock poisoned");
        inner.starting == Starting::Closed && inner.children.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::state::TaskState;

    fn test_task(name: &str) -> Task {
        Task::from_state(TaskState::new(name))
    }

    fn test_record() -> Arc<ScopeRecord> {
        ScopeRecord::new(test_task("owner"))
    }

    #[test]
    fn admission_issues_monotone_ids() {
        let record = test_record();
        let a = record.begin_admission().expect("open");
        let b = record.begin_admission().expect("open");
        assert!(a < b);
    }

    #[test]
    fn admission_commit_makes_child_live() {
        let record = test_record();
        let child = record.begin_admission().expect("open");
        assert!(!record.contains(child));
        record.commit_admission(child, test_task("child"));
        assert!(record.contains(child));
        assert_eq!(record.child_count(), 1);
    }

    #[test]
    fn close_blocks_on_pending_admission() {
        let record = test_record();
        let child = record.begin_admission().expect("open");
        assert!(record.try_begin_close().is_none());
        record.commit_admission(child, test_task("child"));
        let snapshot = record.try_begin_close().expect("no pending admission");
        assert_eq!(snapshot.len(), 1);
    }

    #[test]
    fn rollback_releases_the_pending_slot() {
        let record = test_record();
        let _child = record.begin_admission().expect("open");
        record.abort_admission();
        assert!(record.try_begin_close().is_some());
    }

    #[test]
    fn closed_scope_rejects_admission() {
        let record = test_record();
        assert!(record.try_begin_close().is_some());
        let error = record.begin_admission().expect_err("closed");
        assert_eq!(error.kind(), crate::error::ErrorKind::ScopeClosed);
    }

    #[test]
    fn deregister_before_commit_reports_absence() {
        let record = test_record();
        let child = record.begin_admission().expect("open");
        assert!(!record.try_deregister(child));
        record.commit_admission(child, test_task("child"));
        assert!(record.try_deregister(child));
        assert!(!record.try_deregister(child));
    }

    #[test]
    fn quiescence_accounts_for_pending_admissions() {
        let record = test_record();
        assert!(record.is_quiescent());
        let child = record.begin_admission().expect("open");
        assert!(!record.is_quiescent());
        record.commit_admission(child, test_task("child"));
        assert!(!record.is_quiescent());
        record.try_deregister(child);
        assert!(record.is_quiescent());
    }

    #[test]
    fn drain_requires_closure_and_empty_map() {
        let record = test_record();
        assert!(!record.is_drained());
        let child = record.begin_admission().expect("open");
        record.commit_admission(child, test_task("child"));
        let _ = record.try_begin_close().expect("closes");
        assert!(!record.is_drained());
        record.try_deregister(child);
        assert!(record.is_drained());
    }

    #[test]
    fn snapshot_is_in_id_order() {
        let record = test_record();
        let first = record.begin_admission().expect("open");
        let second = record.begin_admission().expect("open");
        record.commit_admission(second, test_task("b"));
        record.commit_admission(first, test_task("a"));
        let snapshot = record.try_begin_close().expect("closes");
        let ids: Vec<ChildId> = snapshot.iter().map(|(child, _)| *child).collect();
        assert_eq!(ids, vec![first, second]);
    }
}
