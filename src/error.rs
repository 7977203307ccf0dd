//! Error types and error-handling strategy.
//!
//! One typed error flows through the whole crate:
//!
//! - errors are explicit and typed (no stringly-typed errors),
//! - the kind carries the classification the propagation protocol needs,
//! - panics are isolated and converted to `ErrorKind::Panicked`,
//! - interrupts are carried as a payload so provenance survives re-raising.

use crate::types::{Interrupt, PanicPayload};
use core::fmt;
use std::sync::Arc;

/// The kind of error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    // === Child failures ===
    /// A user action returned an error (synchronous failure).
    User,
    /// The task observed an asynchronous interrupt.
    Interrupted,
    /// A user action panicked.
    Panicked,

    // === Scope bookkeeping ===
    /// Fork was attempted on a closed scope.
    ScopeClosed,
    /// The host could not spawn a task.
    Spawn,

    // === Handles ===
    /// The awaited handle can never complete.
    Unreachable,

    // === Internal ===
    /// Internal bookkeeping error (bug).
    Internal,
}

impl ErrorKind {
    /// Returns the severity of this kind within the outcome lattice.
    ///
    /// Values are 0; synchronous failures 1; interrupts 2; panics 3.
    #[must_use]
    pub const fn severity(self) -> u8 {
        match self {
            Self::User | Self::ScopeClosed | Self::Spawn | Self::Unreachable | Self::Internal => 1,
            Self::Interrupted => 2,
            Self::Panicked => 3,
        }
    }

    /// Returns a short static label for this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user error",
            Self::Interrupted => "interrupted",
            Self::Panicked => "panicked",
            Self::ScopeClosed => "scope closed",
            Self::Spawn => "spawn failed",
            Self::Unreachable => "handle unreachable",
            Self::Internal => "internal error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The error type for scope, fork, and await operations.
///
/// Cloneable so a child's failure can both be published on its handle and
/// propagated to the parent.
#[derive(Debug, Clone)]
pub struct Error {
    kind: ErrorKind,
    context: Option<String>,
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
    interrupt: Option<Interrupt>,
    panic: Option<PanicPayload>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub const fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
            source: None,
            interrupt: None,
            panic: None,
        }
    }

    /// Creates a synchronous user failure with a message.
    #[must_use]
    pub fn user(context: impl Into<String>) -> Self {
        Self::new(ErrorKind::User).with_context(context)
    }

    /// Creates an error from an observed interrupt.
    #[must_use]
    pub fn interrupted(interrupt: Interrupt) -> Self {
        let mut error = Self::new(ErrorKind::Interrupted);
        error.interrupt = Some(interrupt);
        error
    }

    /// Creates an error from a caught panic.
    #[must_use]
    pub fn panicked(payload: PanicPayload) -> Self {
        let mut error = Self::new(ErrorKind::Panicked);
        error.panic = Some(payload);
        error
    }

    /// Creates the admission error for a closed scope.
    #[must_use]
    pub fn scope_closed() -> Self {
        Self::new(ErrorKind::ScopeClosed)
    }

    /// Creates a spawn failure from the host's error.
    #[must_use]
    pub fn spawn_failed(source: std::io::Error) -> Self {
        Self::new(ErrorKind::Spawn).with_source(source)
    }

    /// Creates the error for a handle that can never complete.
    #[must_use]
    pub fn unreachable_handle() -> Self {
        Self::new(ErrorKind::Unreachable)
            .with_context("publisher vanished without publishing an outcome")
    }

    /// Adds deterministic context text to the error.
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Adds a source error to the chain.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the context text, if any.
    #[must_use]
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    /// Returns the carried interrupt, if this error was produced by one.
    #[must_use]
    pub const fn interrupt(&self) -> Option<&Interrupt> {
        self.interrupt.as_ref()
    }

    /// Returns the panic payload, if this error was produced by a panic.
    #[must_use]
    pub const fn panic_payload(&self) -> Option<&PanicPayload> {
        self.panic.as_ref()
    }

    /// Returns true if this error was produced by an interrupt.
    #[must_use]
    pub const fn is_interrupt(&self) -> bool {
        matches!(self.kind, ErrorKind::Interrupted)
    }

    /// Returns true if this error was produced by a scope-closure interrupt.
    #[must_use]
    pub fn is_scope_closure(&self) -> bool {
        self.interrupt().is_some_and(Interrupt::is_scope_close)
    }

    /// Unwraps a propagation wrapper, yielding the child's original error.
    ///
    /// Returns `Err(self)` unchanged when this error does not carry the
    /// wrapper interrupt.
    pub(crate) fn into_child_failure(mut self) -> Result<Error, Error> {
        match self.interrupt.take() {
            Some(interrupt) => match interrupt.into_child_failure() {
                Ok((_, original)) => Ok(original),
                Err(interrupt) => {
                    self.interrupt = Some(interrupt);
                    Err(self)
                }
            },
            None => Err(self),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.interrupt, &self.panic, &self.context) {
            (Some(interrupt), _, _) => write!(f, "{}: {interrupt}", self.kind),
            (_, Some(panic), _) => write!(f, "{panic}"),
            (_, _, Some(context)) => write!(f, "{}: {context}", self.kind),
            _ => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|source| source as &(dyn std::error::Error + 'static))
    }
}

/// A specialized `Result` type for scope operations.
pub type Result<T, E = Error> = core::result::Result<T, E>;
