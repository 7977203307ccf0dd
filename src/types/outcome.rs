//! The outcome of a child task.
//!
//! A child either produces a value or raises an error; the error carries
//! the classification the propagation protocol needs (synchronous failure,
//! foreign interrupt, scope-closure interrupt, panic). Outcomes are ordered
//! by a severity lattice: `Value < Raised(user) < Raised(interrupt) <
//! Raised(panic)`; when several failures compete, the protocol keeps the
//! first observed, not the worst, but the lattice is useful for reporting.

use crate::error::Error;
use core::fmt;
use std::any::Any;

/// Payload from a caught panic.
///
/// Wraps the panic value for transport across task boundaries. Only string
/// payloads are preserved verbatim; other payload types are reduced to a
/// placeholder message.
#[derive(Debug, Clone)]
pub struct PanicPayload {
    message: String,
}

impl PanicPayload {
    /// Creates a new panic payload with the given message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Extracts a payload from a `catch_unwind` result.
    #[must_use]
    pub(crate) fn from_unwind(payload: Box<dyn Any + Send>) -> Self {
        let message = payload.downcast::<&'static str>().map_or_else(
            |payload| {
                payload
                    .downcast::<String>()
                    .map_or_else(|_| "non-string panic payload".to_owned(), |s| *s)
            },
            |s| (*s).to_owned(),
        );
        Self { message }
    }

    /// Returns the panic message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for PanicPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "panic: {}", self.message)
    }
}

/// The outcome of a child task: a produced value or a raised error.
#[derive(Debug, Clone)]
pub enum Outcome<T> {
    /// The child's action returned a value.
    Value(T),
    /// The child's action raised.
    Raised(Error),
}

impl<T> Outcome<T> {
    /// Returns the severity level of this outcome (0 = value).
    #[must_use]
    pub fn severity(&self) -> u8 {
        match self {
            Self::Value(_) => 0,
            Self::Raised(e) => e.kind().severity(),
        }
    }

    /// Returns true if this outcome is a value.
    #[must_use]
    pub const fn is_value(&self) -> bool {
        matches!(self, Self::Value(_))
    }

    /// Returns true if this outcome is a raised error.
    #[must_use]
    pub const fn is_raised(&self) -> bool {
        matches!(self, Self::Raised(_))
    }

    /// Returns the value, if any.
    #[must_use]
    pub const fn value(&self) -> Option<&T> {
        match self {
            Self::Value(v) => Some(v),
            Self::Raised(_) => None,
        }
    }

    /// Returns the raised error, if any.
    #[must_use]
    pub const fn raised(&self) -> Option<&Error> {
        match self {
            Self::Value(_) => None,
            Self::Raised(e) => Some(e),
        }
    }

    /// Converts this outcome into a standard `Result`.
    pub fn into_result(self) -> Result<T, Error> {
        match self {
            Self::Value(v) => Ok(v),
            Self::Raised(e) => Err(e),
        }
    }

    /// Maps the value using the provided function.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Outcome<U> {
        match self {
            Self::Value(v) => Outcome::Value(f(v)),
            Self::Raised(e) => Outcome::Raised(e),
        }
    }

    /// Returns the value or panics.
    ///
    /// # Panics
    ///
    /// Panics if the outcome is `Raised`.
    #[track_caller]
    pub fn unwrap(self) -> T {
        match self {
            Self::Value(v) => v,
            Self::Raised(e) => panic!("called `Outcome::unwrap()` on a `Raised` value: {e}"),
        }
    }
}

impl<T> From<Result<T, Error>> for Outcome<T> {
    fn from(result: Result<T, Error>) -> Self {
        match result {
            Ok(v) => Self::Value(v),
            Err(e) => Self::Raised(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::types::Interrupt;

    #[test]
    fn severity_ordering() {
        let value: Outcome<i32> = Outcome::Value(1);
        let user: Outcome<i32> = Outcome::Raised(Error::user("e"));
        let interrupted: Outcome<i32> =
            Outcome::Raised(Error::interrupted(Interrupt::foreign("x")));
        let panicked: Outcome<i32> = Outcome::Raised(Error::panicked(PanicPayload::new("p")));

        assert!(value.severity() < user.severity());
        assert!(user.severity() < interrupted.severity());
        assert!(interrupted.severity() < panicked.severity());
    }

    #[test]
    fn predicates() {
        let value: Outcome<i32> = Outcome::Value(1);
        let raised: Outcome<i32> = Outcome::Raised(Error::user("e"));
        assert!(value.is_value() && !value.is_raised());
        assert!(raised.is_raised() && !raised.is_value());
        assert_eq!(value.value(), Some(&1));
        assert!(raised.raised().is_some());
    }

    #[test]
    fn map_transforms_value_only() {
        let value: Outcome<i32> = Outcome::Value(21);
        assert_eq!(value.map(|x| x * 2).unwrap(), 42);

        let raised: Outcome<i32> = Outcome::Raised(Error::user("e"));
        assert!(raised.map(|x| x * 2).is_raised());
    }

    #[test]
    fn into_result_round_trip() {
        let value: Outcome<i32> = Outcome::from(Ok(3));
        assert_eq!(value.into_result().expect("value"), 3);

        let raised: Outcome<i32> = Outcome::from(Err(Error::user("e")));
        assert!(raised.into_result().is_err());
    }

    #[test]
    #[should_panic(expected = "called `Outcome::unwrap()` on a `Raised` value")]
    fn unwrap_panics_on_raised() {
        let raised: Outcome<i32> = Outcome::Raised(Error::user("e"));
        let _ = raised.unwrap();
    }

    #[test]
    fn panic_payload_preserves_str_and_string() {
        let from_str = PanicPayload::from_unwind(Box::new("literal"));
        assert_eq!(from_str.message(), "literal");
        let from_string = PanicPayload::from_unwind(Box::new(String::from("owned")));
        assert_eq!(from_string.message(), "owned");
        let opaque = PanicPayload::from_unwind(Box::new(17_u8));
        assert_eq!(opaque.message(), "non-string panic payload");
    }
}
