//! Asynchronous interrupt values.
//!
//! An [`Interrupt`] is the payload delivered to a task's mailbox by another
//! party. The core distinguishes three origins:
//!
//! - a scope closing down its children (the one cancellation vector),
//! - a foreign party interrupting a task directly,
//! - a child carrying its failure to its parent (internal; unwrapped at the
//!   scope boundary and never surfaced to user code).

use crate::error::Error;
use crate::types::{ChildId, ScopeId};
use core::fmt;

/// The origin of an interrupt. Kept private so the propagation wrapper
/// cannot be constructed or matched outside the crate.
#[derive(Debug, Clone)]
pub(crate) enum InterruptKind {
    /// Delivered by a scope's shutdown to each live child.
    ScopeClose {
        /// The scope whose shutdown produced this interrupt.
        scope: ScopeId,
    },
    /// Delivered by a third party.
    Foreign {
        /// Static description of why the interrupt was sent.
        message: &'static str,
    },
    /// Carries a failed child's error to the parent task.
    ChildFailure {
        /// The failing child.
        child: ChildId,
        /// The child's original error, boxed to keep the value small.
        error: Box<Error>,
    },
}

/// An asynchronous interrupt delivered to a task.
///
/// Interrupts are observed at blocking points and explicit
/// [`Cx::checkpoint`](crate::cx::Cx::checkpoint) calls, and surface as an
/// [`Error`] with kind [`Interrupted`](crate::error::ErrorKind::Interrupted).
#[derive(Clone)]
pub struct Interrupt {
    kind: InterruptKind,
}

impl Interrupt {
    /// Creates a foreign interrupt with a static description.
    #[must_use]
    pub const fn foreign(message: &'static str) -> Self {
        Self {
            kind: InterruptKind::Foreign { message },
        }
    }

    /// Creates the distinguished interrupt a closing scope delivers to its
    /// children.
    #[must_use]
    pub(crate) const fn scope_close(scope: ScopeId) -> Self {
        Self {
            kind: InterruptKind::ScopeClose { scope },
        }
    }

    /// Wraps a child's failure for delivery to the parent task.
    #[must_use]
    pub(crate) const fn child_failure(child: ChildId, error: Box<Error>) -> Self {
        Self {
            kind: InterruptKind::ChildFailure { child, error },
        }
    }

    /// Returns true if this is a scope-closure interrupt.
    ///
    /// Whether it was produced by a *particular* scope's shutdown is a
    /// separate question answered by the propagation protocol, which also
    /// consults the scope's state.
    #[must_use]
    pub const fn is_scope_close(&self) -> bool {
        matches!(self.kind, InterruptKind::ScopeClose { .. })
    }

    /// The scope whose shutdown produced this closure interrupt, if any.
    #[must_use]
    pub const fn closing_scope(&self) -> Option<ScopeId> {
        match self.kind {
            InterruptKind::ScopeClose { scope } => Some(scope),
            _ => None,
        }
    }

    /// Returns true if this is the internal propagation wrapper.
    #[must_use]
    pub(crate) const fn is_child_failure(&self) -> bool {
        matches!(self.kind, InterruptKind::ChildFailure { .. })
    }

    /// Unwraps the propagation wrapper, yielding the child's original error.
    ///
    /// Returns `Err(self)` unchanged when this interrupt is not a wrapper.
    pub(crate) fn into_child_failure(self) -> Result<(ChildId, Error), Self> {
        match self.kind {
            InterruptKind::ChildFailure { child, error } => Ok((child, *error)),
            kind => Err(Self { kind }),
        }
    }
}

impl fmt::Debug for Interrupt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            InterruptKind::ScopeClose { scope } => {
                f.debug_struct("Interrupt").field("scope_close", scope).finish()
            }
            InterruptKind::Foreign { message } => {
                f.debug_struct("Interrupt").field("foreign", message).finish()
            }
            InterruptKind::ChildFailure { child, error } => f
                .debug_struct("Interrupt")
                .field("child", child)
                .field("error", error)
                .finish(),
        }
    }
}

impl fmt::Display for Interrupt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            InterruptKind::ScopeClose { scope } => write!(f, "scope {scope} closing"),
            InterruptKind::Foreign { message } => write!(f, "{message}"),
            InterruptKind::ChildFailure { child, error } => {
                write!(f, "child {child} failed: {error}")
            }
        }
    }
}
