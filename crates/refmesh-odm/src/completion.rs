//! Completion contracts.
//!
//! Every driver outcome is first normalized into an [`OdmResult`]. From
//! there the caller picks one of two explicit conventions:
//!
//! - **strict**: receive the `Result` and handle the error,
//! - **or-panic**: receive only the value; a failure panics in the caller's
//!   context instead of being handed over.
//!
//! The async methods on queries and sessions are the strict form. The
//! [`OrPanic`] extension and [`Completion::or_panic`] are the terse form,
//! for call sites that do not expect recoverable errors.

use std::fmt;

use refmesh_store::DriverResult;

use crate::error::{OdmError, OdmResult};

/// Normalize a driver outcome, tagging failures with the operation name.
pub fn normalize<T>(operation: &'static str, outcome: DriverResult<T>) -> OdmResult<T> {
    outcome.map_err(OdmError::driver(operation))
}

/// A callback plus the convention it expects.
pub enum Completion<T> {
    Strict(Box<dyn FnOnce(OdmResult<T>) + Send>),
    OrPanic(Box<dyn FnOnce(T) + Send>),
}

impl<T> Completion<T> {
    /// The callback receives the full result.
    pub fn strict(f: impl FnOnce(OdmResult<T>) + Send + 'static) -> Self {
        Self::Strict(Box::new(f))
    }

    /// The callback receives only successful values; errors panic.
    pub fn or_panic(f: impl FnOnce(T) + Send + 'static) -> Self {
        Self::OrPanic(Box::new(f))
    }

    /// Deliver an outcome.
    #[track_caller]
    pub fn complete(self, outcome: OdmResult<T>) {
        match self {
            Self::Strict(f) => f(outcome),
            Self::OrPanic(f) => f(outcome.or_panic()),
        }
    }
}

impl<T> fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strict(_) => f.write_str("Completion::Strict"),
            Self::OrPanic(_) => f.write_str("Completion::OrPanic"),
        }
    }
}

/// Panic-on-error convenience for any refmesh result.
pub trait OrPanic<T> {
    fn or_panic(self) -> T;
}

impl<T> OrPanic<T> for OdmResult<T> {
    #[track_caller]
    fn or_panic(self) -> T {
        match self {
            Ok(value) => value,
            Err(err) => panic!("{err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use refmesh_store::DriverError;

    fn failure() -> OdmResult<u64> {
        normalize("count", Err(DriverError::Backend("connection reset".into())))
    }

    #[test]
    fn normalized_errors_name_the_operation() {
        let err = failure().unwrap_err();
        assert_eq!(
            err.to_string(),
            "database error: count failed / backend error: connection reset"
        );
        assert!(err.driver_error().is_some());
    }

    #[test]
    fn strict_success_receives_ok() {
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        Completion::strict(move |r: OdmResult<u64>| *sink.lock().unwrap() = Some(r.is_ok()))
            .complete(Ok(3));
        assert_eq!(*seen.lock().unwrap(), Some(true));
    }

    #[test]
    fn strict_failure_receives_err() {
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        Completion::strict(move |r: OdmResult<u64>| {
            *sink.lock().unwrap() = Some(r.unwrap_err().to_string())
        })
        .complete(failure());
        assert!(seen.lock().unwrap().as_ref().unwrap().contains("count failed"));
    }

    #[test]
    fn or_panic_success_receives_value() {
        let seen = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&seen);
        Completion::or_panic(move |n: u64| *sink.lock().unwrap() = n).complete(Ok(7));
        assert_eq!(*seen.lock().unwrap(), 7);
    }

    #[test]
    #[should_panic(expected = "database error: count failed")]
    fn or_panic_failure_panics_instead_of_calling_back() {
        Completion::or_panic(|_: u64| unreachable!("callback must not run")).complete(failure());
    }

    #[test]
    #[should_panic(expected = "connection reset")]
    fn or_panic_extension() {
        failure().or_panic();
    }
}
