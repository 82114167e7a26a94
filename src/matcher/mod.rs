//! Deciding whether a concrete call satisfies a pattern.
//!
//! One definition of equivalence serves both live dispatch and post-hoc
//! verification: [`matches`] is what the hub asks before substituting
//! behavior, and what `verify` asks of every logged call.
//!
//! - [`matches`] - the match decision
//! - [`first_mismatch`] - why a call does not match, for diagnostics
//! - [`Matcher`] - the same decision behind a describable trait
//!
//! # Example
//!
//! ```rust
//! use static_mock::matcher::{matches, Matcher};
//! use static_mock::CallSignature;
//!
//! let pattern = CallSignature::builder("lib!lib", "h").any::<String>().build();
//! let call = CallSignature::builder("lib!lib", "h").arg_str("B").build();
//!
//! assert!(matches(&pattern, &call));
//! assert!(pattern.matches(&call));
//! ```

use std::fmt::{self, Display};

use crate::signature::{CallSignature, Direction, TypeTag, Value, ValueKind};

/// A matcher for testing values.
///
/// Implemented by [`CallSignature`], where `self` is the pattern.
pub trait Matcher<T: ?Sized> {
    /// Check if the value matches.
    fn matches(&self, value: &T) -> bool;

    /// Describe what this matcher expects.
    fn describe(&self) -> String;

    /// Describe why a value didn't match.
    fn describe_mismatch(&self, value: &T) -> String;
}

/// Why a candidate call does not satisfy a pattern.
#[derive(Clone, Debug, PartialEq)]
pub enum Mismatch {
    /// Different owner or function name.
    Function,
    /// Different number of parameters.
    Arity {
        /// Pattern arity.
        expected: usize,
        /// Candidate arity.
        actual: usize,
    },
    /// A parameter flows the other way.
    Direction {
        /// Parameter position.
        index: usize,
    },
    /// A parameter has a different type.
    Type {
        /// Parameter position.
        index: usize,
        /// Pattern type.
        expected: TypeTag,
        /// Candidate type.
        actual: TypeTag,
    },
    /// A concrete pattern value differs from the candidate's.
    Value {
        /// Parameter position.
        index: usize,
        /// Pattern value.
        expected: Value,
        /// Candidate value, `None` when the candidate had a wildcard.
        actual: Option<Value>,
    },
}

impl Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mismatch::Function => f.write_str("different function"),
            Mismatch::Arity { expected, actual } => {
                write!(f, "expected {expected} parameter(s), got {actual}")
            }
            Mismatch::Direction { index } => write!(f, "argument {index} has another direction"),
            Mismatch::Type {
                index,
                expected,
                actual,
            } => write!(f, "argument {index}: expected type {expected}, got {actual}"),
            Mismatch::Value {
                index,
                expected,
                actual: Some(actual),
            } => write!(f, "argument {index}: expected {expected:?}, got {actual:?}"),
            Mismatch::Value {
                index,
                expected,
                actual: None,
            } => write!(f, "argument {index}: expected {expected:?}, got a wildcard"),
        }
    }
}

/// Whether `candidate` satisfies `pattern`.
///
/// Owner, function name and the per-position direction and type sequence
/// must be identical. Wildcard positions then match unconditionally, and
/// concrete positions require equality under the value type's `PartialEq`.
/// Output positions never compare values.
#[must_use]
pub fn matches(pattern: &CallSignature, candidate: &CallSignature) -> bool {
    first_mismatch(pattern, candidate).is_none()
}

/// The first reason `candidate` fails `pattern`, or `None` if it matches.
#[must_use]
pub fn first_mismatch(pattern: &CallSignature, candidate: &CallSignature) -> Option<Mismatch> {
    if !pattern.same_function(candidate) {
        return Some(Mismatch::Function);
    }
    if pattern.arity() != candidate.arity() {
        return Some(Mismatch::Arity {
            expected: pattern.arity(),
            actual: candidate.arity(),
        });
    }

    let pairs = pattern.parameters().iter().zip(candidate.parameters());

    // Shape first, so a type error is reported even behind a value error.
    for (index, (p, c)) in pairs.clone().enumerate() {
        if p.direction() != c.direction() {
            return Some(Mismatch::Direction { index });
        }
        if p.type_tag() != c.type_tag() {
            return Some(Mismatch::Type {
                index,
                expected: p.type_tag(),
                actual: c.type_tag(),
            });
        }
    }

    for (index, (p, c)) in pairs.enumerate() {
        if p.direction() == Direction::Out {
            continue;
        }
        if let ValueKind::Concrete(expected) = p.value() {
            match c.value() {
                ValueKind::Concrete(actual) if actual == expected => {}
                ValueKind::Concrete(actual) => {
                    return Some(Mismatch::Value {
                        index,
                        expected: expected.clone(),
                        actual: Some(actual.clone()),
                    });
                }
                ValueKind::Wildcard => {
                    return Some(Mismatch::Value {
                        index,
                        expected: expected.clone(),
                        actual: None,
                    });
                }
            }
        }
    }

    None
}

/// The most recent call to the same function as `pattern`, with the reason
/// it failed to match.
pub fn closest<'a, I>(pattern: &CallSignature, log: I) -> Option<(&'a CallSignature, Mismatch)>
where
    I: IntoIterator<Item = &'a CallSignature>,
    I::IntoIter: DoubleEndedIterator,
{
    log.into_iter()
        .rev()
        .filter(|call| pattern.same_function(call))
        .find_map(|call| first_mismatch(pattern, call).map(|m| (call, m)))
}

impl Matcher<CallSignature> for CallSignature {
    fn matches(&self, value: &CallSignature) -> bool {
        matches(self, value)
    }

    fn describe(&self) -> String {
        format!("a call to {self}")
    }

    fn describe_mismatch(&self, value: &CallSignature) -> String {
        match first_mismatch(self, value) {
            Some(mismatch) => format!("{value}: {mismatch}"),
            None => format!("{value} matches"),
        }
    }
}
