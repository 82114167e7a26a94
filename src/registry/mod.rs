//! One mock scope's expectations and invocation log.
//!
//! An [`InterceptionRegistry`] is `Active` from creation until
//! [`dispose`](InterceptionRegistry::dispose), then `Disposed` for good.
//! While active it records every call the hub shows it, whether or not one of
//! its expectations substitutes behavior, so that `verify` also sees calls
//! that fell through to the real function.

use std::fmt::{self, Debug};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::expectation::{Expectation, ExpectationHandle, OutputValues, Replacement};
use crate::hub::HubInner;
use crate::matcher;
use crate::signature::{CallSignature, ReturnValue, ShapeCatalog, TypeTag};

/// Unique identifier for a registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScopeId(u64);

impl ScopeId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scope#{}", self.0)
    }
}

/// A substitute outcome produced by a matching expectation.
#[derive(Debug)]
pub struct Handled {
    scope: ScopeId,
    call: String,
    value: Option<ReturnValue>,
    outputs: OutputValues,
}

impl Handled {
    /// The scope whose expectation fired.
    #[must_use]
    pub fn scope(&self) -> ScopeId {
        self.scope
    }

    /// The substitute output values.
    #[must_use]
    pub fn outputs(&self) -> &OutputValues {
        &self.outputs
    }

    /// Whether a replacement produced a value.
    #[must_use]
    pub fn has_value(&self) -> bool {
        self.value.is_some()
    }

    /// Take the substitute return value as `R`.
    ///
    /// A handled call without a replacement yields `()` for unit functions.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingReturnValue`] if no replacement was configured
    /// for a non-unit `R`, and [`Error::TypeMismatch`] if the replacement
    /// returned another type.
    pub fn take_return<R: 'static>(&mut self) -> Result<R> {
        let what = format!("return value of {}", self.call);
        match self.value.take() {
            Some(value) => value.take(&what),
            None if TypeTag::of::<R>().is::<()>() => ReturnValue::new(()).take(&what),
            None => Err(Error::MissingReturnValue {
                signature: self.call.clone(),
            }),
        }
    }
}

/// Outcome of offering a call to a registry, and of a whole dispatch.
#[derive(Debug)]
pub enum HandleResult {
    /// A substitute fired; the real function must be skipped.
    Handled(Handled),
    /// Nothing fired; the real function must run.
    NotHandled,
}

impl HandleResult {
    /// Whether a substitute fired.
    #[must_use]
    pub fn is_handled(&self) -> bool {
        matches!(self, HandleResult::Handled(_))
    }
}

/// A fired expectation whose replacement has not run yet.
pub(crate) struct Pending {
    scope: ScopeId,
    label: String,
    replacement: Option<Replacement>,
    outputs: OutputValues,
}

impl Pending {
    /// Run the replacement. No engine lock may be held here.
    pub(crate) fn fire(self, call: &CallSignature) -> Handled {
        tracing::trace!(scope = %self.label, call = %call, "expectation fired");
        Handled {
            scope: self.scope,
            call: call.to_string(),
            value: self.replacement.map(|replacement| replacement()),
            outputs: self.outputs,
        }
    }
}

pub(crate) struct RegistryInner {
    id: ScopeId,
    label: String,
    catalog: &'static ShapeCatalog,
    state: Mutex<RegistryState>,
}

#[derive(Default)]
struct RegistryState {
    disposed: bool,
    expectations: Vec<Arc<Mutex<Expectation>>>,
    log: Vec<CallSignature>,
    hubs: Vec<Weak<HubInner>>,
}

/// The expectations and call log of one mock scope.
///
/// Cloning yields another handle to the same registry.
///
/// # Example
///
/// ```rust
/// use static_mock::{CallSignature, FunctionShape, InterceptionRegistry, HandleResult};
///
/// let shape = FunctionShape::builder("doc!registry", "h").input::<String>("s").register();
/// let registry = InterceptionRegistry::new("doc");
///
/// let call = shape.call().arg_str("A").build().unwrap();
/// assert!(matches!(registry.record_and_try_handle(&call), Ok(HandleResult::NotHandled)));
///
/// registry.verify(&shape.pattern().arg_str("A").build().unwrap()).unwrap();
/// assert!(registry.verify(&shape.pattern().arg_str("B").build().unwrap()).is_err());
/// ```
#[derive(Clone)]
pub struct InterceptionRegistry {
    pub(crate) inner: Arc<RegistryInner>,
}

impl InterceptionRegistry {
    /// Create an active registry that resolves patterns against the global
    /// [`ShapeCatalog`]. It sees no calls until registered with a hub.
    pub fn new(label: impl Into<String>) -> Self {
        Self::with_catalog(label, ShapeCatalog::global())
    }

    /// Create an active registry resolving patterns against `catalog`.
    pub fn with_catalog(label: impl Into<String>, catalog: &'static ShapeCatalog) -> Self {
        let id = ScopeId::new();
        let mut label = label.into();
        if label.is_empty() {
            label = id.to_string();
        }
        Self {
            inner: Arc::new(RegistryInner {
                id,
                label,
                catalog,
                state: Mutex::new(RegistryState::default()),
            }),
        }
    }

    /// This registry's identifier.
    #[must_use]
    pub fn id(&self) -> ScopeId {
        self.inner.id
    }

    /// This registry's label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.inner.label
    }

    /// Whether [`dispose`](Self::dispose) has run.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.state.lock().disposed
    }

    /// Register an expectation for `pattern`, replacing any existing one for
    /// an equal pattern.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UseAfterDispose`] after disposal and
    /// [`Error::AmbiguousSignature`] if `pattern` does not resolve to exactly
    /// one known function shape.
    pub fn expect(&self, pattern: CallSignature) -> Result<ExpectationHandle> {
        self.ensure_active()?;
        self.inner.catalog.resolve(&pattern)?;

        let mut state = self.lock_active()?;
        tracing::debug!(scope = %self.inner.label, pattern = %pattern, "registered expectation");
        // An equal pattern replaces the earlier expectation and takes the
        // newest position.
        state.expectations.retain(|e| *e.lock().pattern() != pattern);
        let expectation = Arc::new(Mutex::new(Expectation::new(pattern)));
        state.expectations.push(Arc::clone(&expectation));
        Ok(ExpectationHandle::new(expectation))
    }

    /// Succeed if any logged call matches `pattern`.
    ///
    /// The log is not consumed, so repeated verifications are independent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::VerificationFailed`] if no logged call matches,
    /// [`Error::UseAfterDispose`] after disposal, and
    /// [`Error::AmbiguousSignature`] for an unresolvable pattern.
    pub fn verify(&self, pattern: &CallSignature) -> Result<()> {
        self.ensure_active()?;
        self.inner.catalog.resolve(pattern)?;

        let state = self.lock_active()?;
        if state.log.iter().any(|call| matcher::matches(pattern, call)) {
            return Ok(());
        }
        let closest = matcher::closest(pattern, &state.log)
            .map(|(call, mismatch)| format!("{call}: {mismatch}"));
        Err(Error::VerificationFailed {
            pattern: pattern.to_string(),
            closest,
        })
    }

    /// Succeed if exactly `times` logged calls match `pattern`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CallCountMismatch`] on any other count, plus the
    /// errors of [`verify`](Self::verify) other than `VerificationFailed`.
    pub fn verify_times(&self, pattern: &CallSignature, times: usize) -> Result<()> {
        let actual = self.call_count(pattern)?;
        if actual == times {
            Ok(())
        } else {
            Err(Error::CallCountMismatch {
                pattern: pattern.to_string(),
                expected: times,
                actual,
            })
        }
    }

    /// Succeed if no logged call matches `pattern`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnexpectedCall`] if one does.
    pub fn verify_not_called(&self, pattern: &CallSignature) -> Result<()> {
        if self.call_count(pattern)? == 0 {
            Ok(())
        } else {
            Err(Error::UnexpectedCall {
                pattern: pattern.to_string(),
            })
        }
    }

    /// Number of logged calls matching `pattern`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UseAfterDispose`] or [`Error::AmbiguousSignature`].
    pub fn call_count(&self, pattern: &CallSignature) -> Result<usize> {
        self.ensure_active()?;
        self.inner.catalog.resolve(pattern)?;
        let state = self.lock_active()?;
        Ok(state
            .log
            .iter()
            .filter(|call| matcher::matches(pattern, call))
            .count())
    }

    /// A snapshot of the invocation log, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UseAfterDispose`] after disposal.
    pub fn invocations(&self) -> Result<Vec<CallSignature>> {
        Ok(self.lock_active()?.log.clone())
    }

    /// The most recent logged call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UseAfterDispose`] after disposal.
    pub fn last_call(&self) -> Result<Option<CallSignature>> {
        Ok(self.lock_active()?.log.last().cloned())
    }

    /// Whether any call was logged.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UseAfterDispose`] after disposal.
    pub fn was_called(&self) -> Result<bool> {
        Ok(!self.lock_active()?.log.is_empty())
    }

    /// Clear the invocation log. Expectations stay registered.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UseAfterDispose`] after disposal.
    pub fn reset(&self) -> Result<()> {
        self.lock_active()?.log.clear();
        Ok(())
    }

    /// Log `call`, then let the newest matching expectation decide whether to
    /// substitute behavior.
    ///
    /// The replacement callback runs with no lock held, so it may itself make
    /// intercepted calls. A disposed registry neither logs nor handles.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingOutputBinding`] if the firing expectation has
    /// no value for one of the call's output parameters.
    pub fn record_and_try_handle(&self, call: &CallSignature) -> Result<HandleResult> {
        Ok(match self.record_and_match(call)? {
            Some(pending) => HandleResult::Handled(pending.fire(call)),
            None => HandleResult::NotHandled,
        })
    }

    /// Log `call` and resolve the newest matching expectation that
    /// substitutes, without running its replacement.
    pub(crate) fn record_and_match(&self, call: &CallSignature) -> Result<Option<Pending>> {
        let expectation = {
            let mut state = self.inner.state.lock();
            if state.disposed {
                return Ok(None);
            }
            state.log.push(call.clone());
            state
                .expectations
                .iter()
                .rev()
                .find(|e| matcher::matches(e.lock().pattern(), call))
                .cloned()
        };

        let Some(expectation) = expectation else {
            return Ok(None);
        };
        let guard = expectation.lock();
        if !guard.substitutes() {
            return Ok(None);
        }
        let outputs = guard.resolve_outputs(call)?;
        Ok(Some(Pending {
            scope: self.inner.id,
            label: self.inner.label.clone(),
            replacement: guard.replacement(),
            outputs,
        }))
    }

    /// Log `call` without offering it to any expectation.
    pub(crate) fn record(&self, call: &CallSignature) {
        let mut state = self.inner.state.lock();
        if !state.disposed {
            state.log.push(call.clone());
        }
    }

    /// Deregister from every hub and discard expectations and log.
    ///
    /// Safe to call any number of times; only the first call has an effect.
    pub fn dispose(&self) {
        let hubs = {
            let mut state = self.inner.state.lock();
            if state.disposed {
                return;
            }
            state.disposed = true;
            state.expectations.clear();
            state.log.clear();
            std::mem::take(&mut state.hubs)
        };
        for hub in hubs.iter().filter_map(Weak::upgrade) {
            hub.remove(&self.inner);
        }
        tracing::debug!(scope = %self.inner.label, "disposed mock scope");
    }

    /// Remember that `hub` holds this registry. Returns `false` if it already
    /// does or if the registry is disposed.
    pub(crate) fn attach_hub(&self, hub: &Arc<HubInner>) -> bool {
        let mut state = self.inner.state.lock();
        if state.disposed || state.hubs.iter().any(|h| std::ptr::eq(h.as_ptr(), Arc::as_ptr(hub))) {
            return false;
        }
        state.hubs.push(Arc::downgrade(hub));
        true
    }

    pub(crate) fn detach_hub(&self, hub: &Arc<HubInner>) {
        self.inner
            .state
            .lock()
            .hubs
            .retain(|h| !std::ptr::eq(h.as_ptr(), Arc::as_ptr(hub)));
    }

    pub(crate) fn from_inner(inner: Arc<RegistryInner>) -> Self {
        Self { inner }
    }

    fn ensure_active(&self) -> Result<()> {
        self.lock_active().map(drop)
    }

    fn lock_active(&self) -> Result<parking_lot::MutexGuard<'_, RegistryState>> {
        let state = self.inner.state.lock();
        if state.disposed {
            Err(Error::use_after_dispose(self.inner.label.clone()))
        } else {
            Ok(state)
        }
    }
}

impl Debug for InterceptionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("InterceptionRegistry")
            .field("id", &self.inner.id)
            .field("label", &self.inner.label)
            .field("disposed", &state.disposed)
            .field("expectations", &state.expectations.len())
            .field("calls", &state.log.len())
            .finish()
    }
}
