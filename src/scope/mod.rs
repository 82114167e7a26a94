//! Mock scopes: the test-facing owner of one registry.
//!
//! Creating a [`MockScope`] makes it active on the current thread's hub.
//! Dropping it (or calling [`dispose`](MockScope::dispose)) ends its
//! interception, after which every operation on it fails with
//! [`Error::UseAfterDispose`](crate::Error::UseAfterDispose).
//!
//! ```rust
//! use static_mock::{FunctionShape, MockScope};
//!
//! let shape = FunctionShape::builder("doc!scope", "h").input::<String>("s").register();
//! let pattern = shape.pattern().arg_str("A").build().unwrap();
//!
//! {
//!     let scope = MockScope::builder().label("login flow").build();
//!     assert_eq!(scope.label(), "login flow");
//!     assert!(scope.verify(&pattern).is_err());
//! }
//! ```

use std::fmt::{self, Debug};
use std::ops::Deref;

use crate::hub::InterceptionHub;
use crate::registry::InterceptionRegistry;

/// An active interception registry, disposed on drop.
///
/// Dereferences to [`InterceptionRegistry`] for `expect`, `verify` and the
/// invocation log accessors.
pub struct MockScope {
    registry: InterceptionRegistry,
    hub: InterceptionHub,
}

impl MockScope {
    /// Create a scope on the current thread's hub.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Configure a scope before activating it.
    #[must_use]
    pub fn builder() -> ScopeBuilder {
        ScopeBuilder::default()
    }

    /// The underlying registry.
    #[must_use]
    pub fn registry(&self) -> &InterceptionRegistry {
        &self.registry
    }

    /// The hub this scope is registered with.
    #[must_use]
    pub fn hub(&self) -> &InterceptionHub {
        &self.hub
    }

    /// End interception for this scope. Idempotent.
    ///
    /// Unlike dropping, the scope stays around so that later use reports
    /// [`Error::UseAfterDispose`](crate::Error::UseAfterDispose).
    pub fn dispose(&self) {
        self.registry.dispose();
    }
}

impl Default for MockScope {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for MockScope {
    type Target = InterceptionRegistry;

    fn deref(&self) -> &Self::Target {
        &self.registry
    }
}

impl Drop for MockScope {
    fn drop(&mut self) {
        self.registry.dispose();
    }
}

impl Debug for MockScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MockScope").field(&self.registry).finish()
    }
}

/// Builder for [`MockScope`].
#[derive(Debug, Default)]
pub struct ScopeBuilder {
    label: Option<String>,
    hub: Option<InterceptionHub>,
}

impl ScopeBuilder {
    /// Name the scope in diagnostics. Defaults to its ID.
    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Register with `hub` instead of the current one.
    #[must_use]
    pub fn hub(mut self, hub: &InterceptionHub) -> Self {
        self.hub = Some(hub.clone());
        self
    }

    /// Create and activate the scope.
    #[must_use]
    pub fn build(self) -> MockScope {
        let hub = self.hub.unwrap_or_else(InterceptionHub::current);
        let registry = InterceptionRegistry::new(self.label.unwrap_or_default());
        hub.adopt(&registry);
        MockScope { registry, hub }
    }
}

/// Create a scope on the current thread's hub.
///
/// Same as [`MockScope::new`].
#[must_use]
pub fn create_scope() -> MockScope {
    MockScope::new()
}

/// Assert that a scope logged a call matching a pattern.
///
/// # Panics
///
/// Panics with the verification error, including the closest logged call,
/// if no call matches.
///
/// # Example
///
/// ```rust
/// use static_mock::{assert_called, FunctionShape, MockScope};
///
/// let shape = FunctionShape::builder("doc!assert_called", "h").input::<u8>("x").register();
/// let scope = MockScope::new();
/// static_mock::dispatch(&shape.call().arg(1_u8).build().unwrap()).unwrap();
///
/// assert_called!(scope, shape.pattern().arg(1_u8).build().unwrap());
/// assert_called!(scope, shape.pattern().any::<u8>().build().unwrap(), times = 1);
/// ```
#[macro_export]
macro_rules! assert_called {
    ($scope:expr, $pattern:expr) => {{
        if let ::std::result::Result::Err(err) = $scope.verify(&$pattern) {
            panic!("assertion failed: {}", err);
        }
    }};
    ($scope:expr, $pattern:expr, times = $times:expr) => {{
        if let ::std::result::Result::Err(err) = $scope.verify_times(&$pattern, $times) {
            panic!("assertion failed: {}", err);
        }
    }};
    ($scope:expr, $pattern:expr, $($arg:tt)+) => {{
        if let ::std::result::Result::Err(err) = $scope.verify(&$pattern) {
            panic!("assertion failed: {}: {}", err, format_args!($($arg)+));
        }
    }};
}

/// Assert that a scope logged no call matching a pattern.
///
/// # Panics
///
/// Panics if a matching call was logged.
#[macro_export]
macro_rules! assert_not_called {
    ($scope:expr, $pattern:expr) => {{
        if let ::std::result::Result::Err(err) = $scope.verify_not_called(&$pattern) {
            panic!("assertion failed: {}", err);
        }
    }};
    ($scope:expr, $pattern:expr, $($arg:tt)+) => {{
        if let ::std::result::Result::Err(err) = $scope.verify_not_called(&$pattern) {
            panic!("assertion failed: {}: {}", err, format_args!($($arg)+));
        }
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::hub::dispatch;
    use crate::signature::FunctionShape;

    #[test]
    fn test_new_scope_is_active_on_current_hub() {
        let scope = MockScope::new();
        let active = InterceptionHub::current().active_scopes();
        assert!(active.iter().any(|r| r.id() == scope.id()));
    }

    #[test]
    fn test_drop_disposes() {
        let hub = InterceptionHub::new();
        let registry = {
            let scope = MockScope::builder().hub(&hub).build();
            scope.registry().clone()
        };
        assert!(registry.is_disposed());
        assert!(hub.is_empty());
    }

    #[test]
    fn test_dispose_then_use_fails() {
        let shape = FunctionShape::builder("test!scope::dispose", "h")
            .input::<u8>("x")
            .register();
        let scope = MockScope::builder().label("short-lived").build();
        scope.dispose();
        scope.dispose();

        let err = scope
            .verify(&shape.pattern().any::<u8>().build().unwrap())
            .unwrap_err();
        assert_eq!(err, Error::use_after_dispose("short-lived"));
    }

    #[test]
    fn test_disposed_scope_no_longer_intercepts() {
        let shape = FunctionShape::builder("test!scope::isolation", "h")
            .input::<u8>("x")
            .returns::<u8>()
            .register();
        let call = shape.call().arg(1_u8).build().unwrap();

        let first = create_scope();
        let _ = first
            .expect(shape.pattern().any::<u8>().build().unwrap())
            .unwrap()
            .return_value(7_u8);
        assert!(dispatch(&call).unwrap().is_handled());
        drop(first);

        let second = create_scope();
        assert!(!dispatch(&call).unwrap().is_handled());
        assert_called!(second, shape.pattern().arg(1_u8).build().unwrap(), times = 1);
    }

    #[test]
    #[should_panic(expected = "was not invoked")]
    fn test_assert_called_panics_without_call() {
        let shape = FunctionShape::builder("test!scope::assert", "h")
            .input::<u8>("x")
            .register();
        let scope = MockScope::new();
        assert_called!(scope, shape.pattern().arg(1_u8).build().unwrap());
    }

    #[test]
    fn test_assert_not_called() {
        let shape = FunctionShape::builder("test!scope::not_called", "h")
            .input::<u8>("x")
            .register();
        let scope = MockScope::new();
        dispatch(&shape.call().arg(2_u8).build().unwrap()).unwrap();
        assert_not_called!(scope, shape.pattern().arg(1_u8).build().unwrap(), "only 2 was sent");
    }
}
