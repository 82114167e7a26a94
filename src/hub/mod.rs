//! Routing intercepted calls to the active mock scopes.
//!
//! Every thread owns a default [`InterceptionHub`], so scopes created on one
//! thread never observe calls made on another. A hub holds non-owning
//! references to its registries: dropping or disposing a scope is enough to
//! take it out of routing.
//!
//! # Dispatch order
//!
//! Scopes are consulted from the most recently registered to the oldest.
//! Every active scope records the call; the first one whose expectation
//! fires decides the outcome and later scopes only record.
//!
//! ```rust
//! use static_mock::{dispatch, FunctionShape, HandleResult, MockScope};
//!
//! let shape = FunctionShape::builder("doc!hub", "h").input::<String>("s").register();
//! let call = shape.call().arg_str("A").build().unwrap();
//!
//! // No scope: the real function runs.
//! assert!(matches!(dispatch(&call), Ok(HandleResult::NotHandled)));
//!
//! let outer = MockScope::new();
//! let inner = MockScope::new();
//! inner
//!     .expect(shape.pattern().arg_str("A").build().unwrap())
//!     .unwrap()
//!     .returns(|| ());
//!
//! assert!(dispatch(&call).unwrap().is_handled());
//! let pattern = shape.pattern().arg_str("A").build().unwrap();
//! outer.verify(&pattern).unwrap();
//! inner.verify(&pattern).unwrap();
//! ```

use std::cell::RefCell;
use std::fmt::{self, Debug};
use std::marker::PhantomData;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::registry::{HandleResult, InterceptionRegistry, RegistryInner};
use crate::signature::CallSignature;

/// Outcome of [`InterceptionHub::dispatch`].
pub type DispatchResult = HandleResult;

thread_local! {
    static DEFAULT_HUB: InterceptionHub = InterceptionHub::new();
    static ENTERED: RefCell<Vec<InterceptionHub>> = const { RefCell::new(Vec::new()) };
}

pub(crate) struct HubInner {
    scopes: Mutex<Vec<Weak<RegistryInner>>>,
}

impl HubInner {
    /// Drop `registry` and any dead entries from routing.
    pub(crate) fn remove(&self, registry: &Arc<RegistryInner>) {
        self.scopes
            .lock()
            .retain(|s| s.strong_count() > 0 && !std::ptr::eq(s.as_ptr(), Arc::as_ptr(registry)));
    }
}

/// The set of active scopes that intercepted calls are routed through.
///
/// Cloning yields another handle to the same hub.
#[derive(Clone)]
pub struct InterceptionHub {
    inner: Arc<HubInner>,
}

impl InterceptionHub {
    /// Create an empty hub, independent of every thread's default hub.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(HubInner {
                scopes: Mutex::new(Vec::new()),
            }),
        }
    }

    /// The hub calls on this thread are routed through: the innermost
    /// [`enter`](Self::enter)ed hub, or else the thread's default hub.
    #[must_use]
    pub fn current() -> Self {
        ENTERED
            .with(|entered| entered.borrow().last().cloned())
            .unwrap_or_else(|| DEFAULT_HUB.with(Clone::clone))
    }

    /// Make this hub [`current`](Self::current) on this thread until the
    /// guard drops.
    ///
    /// Used to let helper threads share a test's scopes.
    #[must_use = "the hub is only current while the guard is alive"]
    pub fn enter(&self) -> HubGuard {
        ENTERED.with(|entered| entered.borrow_mut().push(self.clone()));
        HubGuard {
            hub: self.clone(),
            _not_send: PhantomData,
        }
    }

    /// Add `registry` as the newest scope. Registering twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UseAfterDispose`] for a disposed registry.
    pub fn register(&self, registry: &InterceptionRegistry) -> Result<()> {
        if registry.is_disposed() {
            return Err(Error::use_after_dispose(registry.label()));
        }
        self.adopt(registry);
        Ok(())
    }

    pub(crate) fn adopt(&self, registry: &InterceptionRegistry) {
        if registry.attach_hub(&self.inner) {
            self.inner
                .scopes
                .lock()
                .push(Arc::downgrade(&registry.inner));
            tracing::debug!(scope = %registry.label(), "registered mock scope");
        }
    }

    /// Remove `registry` from routing without disposing it.
    pub fn unregister(&self, registry: &InterceptionRegistry) {
        registry.detach_hub(&self.inner);
        self.inner.remove(&registry.inner);
    }

    /// The live scopes, oldest first.
    #[must_use]
    pub fn active_scopes(&self) -> Vec<InterceptionRegistry> {
        self.inner
            .scopes
            .lock()
            .iter()
            .filter_map(Weak::upgrade)
            .map(InterceptionRegistry::from_inner)
            .collect()
    }

    /// Whether no scope is active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.active_scopes().is_empty()
    }

    /// Route `call` through the active scopes, newest first.
    ///
    /// Every scope logs the call before any replacement runs, so a panicking
    /// or re-entrant replacement leaves all logs complete and in the same
    /// order. The scope list is snapshotted up front; scopes created by a
    /// replacement callback see only later calls.
    ///
    /// # Errors
    ///
    /// Returns the error of the scope that handled the call, for example
    /// [`Error::MissingOutputBinding`](crate::Error::MissingOutputBinding).
    /// The remaining scopes still record the call.
    pub fn dispatch(&self, call: &CallSignature) -> Result<DispatchResult> {
        let scopes = self.active_scopes();
        if scopes.is_empty() {
            tracing::trace!(call = %call, "no active mock scope");
            return Ok(HandleResult::NotHandled);
        }

        let mut pending = Ok(None);
        for scope in scopes.iter().rev() {
            if matches!(pending, Ok(None)) {
                pending = scope.record_and_match(call);
            } else {
                scope.record(call);
            }
        }

        tracing::trace!(
            call = %call,
            scopes = scopes.len(),
            handled = !matches!(pending, Ok(None)),
            "dispatched call"
        );
        Ok(match pending? {
            Some(pending) => HandleResult::Handled(pending.fire(call)),
            None => HandleResult::NotHandled,
        })
    }
}

impl Default for InterceptionHub {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for InterceptionHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptionHub")
            .field("scopes", &self.active_scopes())
            .finish()
    }
}

/// Keeps a hub [`current`](InterceptionHub::current) on one thread.
#[derive(Debug)]
pub struct HubGuard {
    hub: InterceptionHub,
    _not_send: PhantomData<*const ()>,
}

impl Drop for HubGuard {
    fn drop(&mut self) {
        ENTERED.with(|entered| {
            let mut entered = entered.borrow_mut();
            if let Some(index) = entered
                .iter()
                .rposition(|h| Arc::ptr_eq(&h.inner, &self.hub.inner))
            {
                entered.remove(index);
            }
        });
    }
}

/// Route `call` through the current thread's hub.
///
/// This is what `#[interceptable]` functions call on entry.
///
/// # Errors
///
/// See [`InterceptionHub::dispatch`].
pub fn dispatch(call: &CallSignature) -> Result<DispatchResult> {
    InterceptionHub::current().dispatch(call)
}
