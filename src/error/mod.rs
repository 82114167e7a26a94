//! Error definitions
//!
//! Every failure the engine reports is a local, synchronous failure at the
//! point of misuse. Nothing here is retried or recovered internally.

use thiserror::Error;

/// Main error type for static-mock
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// No logged invocation matched the pattern passed to `verify`.
    #[error("{pattern} was not invoked{}", closest_suffix(.closest))]
    VerificationFailed {
        /// Human-readable form of the pattern.
        pattern: String,
        /// The nearest logged call to the same function, with the reason it
        /// did not match.
        closest: Option<String>,
    },

    /// A pattern could not be resolved to exactly one known function shape.
    #[error("ambiguous signature {signature}: {reason}")]
    AmbiguousSignature {
        /// Human-readable form of the offending pattern.
        signature: String,
        /// Why resolution failed.
        reason: String,
    },

    /// An expectation fired without a value for a required output parameter.
    #[error("no output value bound for parameter `{parameter}` ({type_name}) of {signature}")]
    MissingOutputBinding {
        /// The call that fired the expectation.
        signature: String,
        /// Name of the unbound output parameter.
        parameter: String,
        /// Declared type of the output parameter.
        type_name: &'static str,
    },

    /// An operation was attempted on a disposed scope.
    #[error("mock scope {scope} used after dispose")]
    UseAfterDispose {
        /// Label of the disposed scope.
        scope: String,
    },

    /// `verify_times` observed a different number of matching calls.
    #[error("{pattern} expected {expected} call(s), got {actual}")]
    CallCountMismatch {
        /// Human-readable form of the pattern.
        pattern: String,
        /// Number of calls the test asked for.
        expected: usize,
        /// Number of matching calls in the log.
        actual: usize,
    },

    /// `verify_not_called` found a matching call.
    #[error("{pattern} was invoked but should not have been")]
    UnexpectedCall {
        /// Human-readable form of the pattern.
        pattern: String,
    },

    /// A handled, value-returning call had no replacement to produce a value.
    #[error("{signature} was handled but no return value was configured")]
    MissingReturnValue {
        /// The handled call.
        signature: String,
    },

    /// A stored value could not be read back as the requested type.
    #[error("type mismatch for {what}: expected {expected}, found {found}")]
    TypeMismatch {
        /// What was being read (return value, output parameter...).
        what: String,
        /// The type the caller asked for.
        expected: &'static str,
        /// The type actually stored.
        found: &'static str,
    },
}

fn closest_suffix(closest: &Option<String>) -> String {
    closest
        .as_ref()
        .map(|c| format!("; closest call: {c}"))
        .unwrap_or_default()
}

impl Error {
    /// Create an ambiguous signature error.
    #[must_use]
    pub fn ambiguous(signature: impl ToString, reason: impl Into<String>) -> Self {
        Self::AmbiguousSignature {
            signature: signature.to_string(),
            reason: reason.into(),
        }
    }

    /// Create a use-after-dispose error for the labelled scope.
    #[must_use]
    pub fn use_after_dispose(scope: impl Into<String>) -> Self {
        Self::UseAfterDispose {
            scope: scope.into(),
        }
    }

    /// Create a type mismatch error.
    #[must_use]
    pub fn type_mismatch(what: impl Into<String>, expected: &'static str, found: &'static str) -> Self {
        Self::TypeMismatch {
            what: what.into(),
            expected,
            found,
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
