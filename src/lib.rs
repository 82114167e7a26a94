//! # static-mock
//!
//! > Test doubles for free functions
//!
//! **static-mock** intercepts calls to ordinary functions inside a test. A
//! test opens a [`MockScope`], registers expectations (optionally with a
//! replacement and output values) and afterwards verifies which calls were
//! made. Outside any scope the functions behave exactly as written.
//!
//! ## Quick Start
//!
//! ```rust
//! use static_mock::prelude::*;
//!
//! mod parse {
//!     #[static_mock::interceptable]
//!     pub fn try_parse(s: &str, result: &mut i32) -> bool {
//!         match s.parse() {
//!             Ok(v) => {
//!                 *result = v;
//!                 true
//!             }
//!             Err(_) => false,
//!         }
//!     }
//! }
//!
//! let scope = MockScope::new();
//! scope
//!     .expect(parse::try_parse::pattern("fubar").unwrap())
//!     .unwrap()
//!     .returns(|| true)
//!     .with_output(2_i32);
//!
//! let mut value = 0;
//! assert!(parse::try_parse("fubar", &mut value));
//! assert_eq!(value, 2);
//!
//! assert_called!(scope, parse::try_parse::pattern(any::<String>()).unwrap());
//! ```
//!
//! ## Features
//!
//! - **Scopes** - Nested, disposable interception contexts
//! - **Wildcards** - Match any value of a parameter's type
//! - **Output values** - Bind `&mut` parameters by type or by name
//! - **Verification** - Post-hoc checks with the closest call on failure
//! - **Thread confinement** - Each thread has its own hub

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod expectation;
pub mod hub;
pub mod matcher;
pub mod registry;
pub mod scope;
pub mod signature;

/// Prelude for convenient imports
///
/// ```rust
/// use static_mock::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::signature::{any, Arg, CallSignature, FunctionShape};
    pub use crate::scope::{create_scope, MockScope};
    pub use crate::{assert_called, assert_not_called};

    #[cfg(feature = "macros")]
    pub use static_mock_macros::interceptable;
}

// Re-exports
pub use error::{Error, Result};
pub use expectation::{ExpectationHandle, OutputValues};
pub use hub::{dispatch, DispatchResult, HubGuard, InterceptionHub};
pub use registry::{HandleResult, Handled, InterceptionRegistry, ScopeId};
pub use scope::{create_scope, MockScope, ScopeBuilder};
pub use signature::{
    any, Arg, CallSignature, Direction, FunctionShape, ParameterSpec, ShapeCatalog, TypeTag,
    Value,
};

// Re-export the attribute macro when macros feature is enabled
#[cfg(feature = "macros")]
pub use static_mock_macros::interceptable;
