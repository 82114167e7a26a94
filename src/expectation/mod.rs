//! Expectations: a pattern plus the behavior substituted when it matches.
//!
//! An [`Expectation`] is created by
//! [`InterceptionRegistry::expect`](crate::InterceptionRegistry::expect) and
//! configured in place through the returned [`ExpectationHandle`]:
//!
//! ```rust
//! use static_mock::{CallSignature, FunctionShape, MockScope};
//!
//! let shape = FunctionShape::builder("doc!expectation", "try_parse")
//!     .input::<String>("s")
//!     .output::<i32>("result")
//!     .returns::<bool>()
//!     .register();
//!
//! let scope = MockScope::new();
//! scope
//!     .expect(shape.pattern().arg_str("fubar").build().unwrap())
//!     .unwrap()
//!     .returns(|| true)
//!     .with_output(2_i32);
//! ```
//!
//! The same expectation fires on every matching call; it is re-evaluated
//! fresh each time, never consumed.

use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::signature::{CallSignature, ReturnValue, TypeTag, Value};

/// A zero-argument substitute for the real function body.
pub(crate) type Replacement = Arc<dyn Fn() -> ReturnValue + Send + Sync>;

/// Key of an output binding: the slot type plus an optional slot name.
///
/// A binding without a name is the fallback for any output of that type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct OutputKey {
    type_tag: TypeTag,
    name: Option<String>,
}

impl OutputKey {
    /// The bound type.
    #[must_use]
    pub fn type_tag(&self) -> TypeTag {
        self.type_tag
    }

    /// The bound name, `None` for a fallback binding.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

/// A registered pattern with its configured behavior.
pub struct Expectation {
    pattern: CallSignature,
    replacement: Option<Replacement>,
    outputs: HashMap<OutputKey, Value>,
}

impl Expectation {
    pub(crate) fn new(pattern: CallSignature) -> Self {
        Self {
            pattern,
            replacement: None,
            outputs: HashMap::new(),
        }
    }

    /// The pattern this expectation recognizes.
    #[must_use]
    pub fn pattern(&self) -> &CallSignature {
        &self.pattern
    }

    /// Whether a replacement callback is configured.
    #[must_use]
    pub fn has_replacement(&self) -> bool {
        self.replacement.is_some()
    }

    /// The configured output bindings.
    #[must_use]
    pub fn outputs(&self) -> &HashMap<OutputKey, Value> {
        &self.outputs
    }

    /// Whether firing this expectation substitutes behavior. An expectation
    /// with neither a replacement nor outputs only observes.
    #[must_use]
    pub fn substitutes(&self) -> bool {
        self.replacement.is_some() || !self.outputs.is_empty()
    }

    pub(crate) fn replacement(&self) -> Option<Replacement> {
        self.replacement.clone()
    }

    /// Resolve a value for every output slot of `call`.
    ///
    /// The exact `(type, name)` binding wins, then the `(type, None)`
    /// fallback. A slot with neither is an error, never a default.
    pub(crate) fn resolve_outputs(&self, call: &CallSignature) -> Result<OutputValues> {
        let mut values = Vec::new();
        for param in call.outputs() {
            let name = param.name().unwrap_or_default();
            let exact = OutputKey {
                type_tag: param.type_tag(),
                name: Some(name.to_string()),
            };
            let fallback = OutputKey {
                type_tag: param.type_tag(),
                name: None,
            };
            let value = self
                .outputs
                .get(&exact)
                .or_else(|| self.outputs.get(&fallback))
                .ok_or_else(|| Error::MissingOutputBinding {
                    signature: call.to_string(),
                    parameter: name.to_string(),
                    type_name: param.type_tag().name(),
                })?;
            values.push((name.to_string(), value.clone()));
        }
        Ok(OutputValues { values })
    }
}

impl Debug for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Expectation")
            .field("pattern", &self.pattern.to_string())
            .field("replacement", &self.replacement.is_some())
            .field("outputs", &self.outputs)
            .finish()
    }
}

/// Output values written back to a call site, in declaration order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OutputValues {
    values: Vec<(String, Value)>,
}

impl OutputValues {
    /// The value for the output named `name`, as `T`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingOutputBinding`] if there is no such output and
    /// [`Error::TypeMismatch`] if it holds another type.
    pub fn get<T: Clone + 'static>(&self, name: &str) -> Result<T> {
        let value = self
            .values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
            .ok_or_else(|| Error::MissingOutputBinding {
                signature: "handled call".to_string(),
                parameter: name.to_string(),
                type_name: std::any::type_name::<T>(),
            })?;
        value.get(&format!("output `{name}`"))
    }

    /// Iterate over `(name, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Number of outputs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether there are no outputs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Fluent configuration of one registered [`Expectation`].
///
/// Every call mutates the same expectation in place and returns the handle
/// for chaining.
#[derive(Clone)]
pub struct ExpectationHandle {
    expectation: Arc<Mutex<Expectation>>,
}

impl ExpectationHandle {
    pub(crate) fn new(expectation: Arc<Mutex<Expectation>>) -> Self {
        Self { expectation }
    }

    /// Replace the real call with `replacement`.
    ///
    /// For unit functions the callback performs a substitute side effect;
    /// for value-returning functions its result is the substitute return
    /// value and must have the function's return type.
    pub fn returns<R, F>(self, replacement: F) -> Self
    where
        R: Send + 'static,
        F: Fn() -> R + Send + Sync + 'static,
    {
        let replacement: Replacement = Arc::new(move || ReturnValue::new(replacement()));
        self.expectation.lock().replacement = Some(replacement);
        self
    }

    /// Replace the real call with a fixed return value.
    pub fn return_value<R>(self, value: R) -> Self
    where
        R: Clone + Send + Sync + 'static,
    {
        self.returns(move || value.clone())
    }

    /// Bind `value` to any output parameter of type `T` that has no named
    /// binding.
    pub fn with_output<T>(self, value: T) -> Self
    where
        T: PartialEq + Debug + Send + Sync + 'static,
    {
        self.bind(None, Value::new(value))
    }

    /// Bind `value` to the output parameter called `name`.
    pub fn with_named_output<T>(self, name: &str, value: T) -> Self
    where
        T: PartialEq + Debug + Send + Sync + 'static,
    {
        self.bind(Some(name.to_string()), Value::new(value))
    }

    fn bind(self, name: Option<String>, value: Value) -> Self {
        let key = OutputKey {
            type_tag: value.type_tag(),
            name,
        };
        {
            let mut expectation = self.expectation.lock();
            let known = expectation.pattern.outputs().any(|p| {
                p.type_tag() == key.type_tag
                    && key.name.as_deref().map_or(true, |n| p.name() == Some(n))
            });
            if !known {
                tracing::warn!(
                    pattern = %expectation.pattern,
                    output = key.name.as_deref().unwrap_or("_"),
                    ty = key.type_tag.name(),
                    "output binding matches no output parameter of the pattern"
                );
            }
            expectation.outputs.insert(key, value);
        }
        self
    }

    /// The pattern this handle configures.
    #[must_use]
    pub fn pattern(&self) -> CallSignature {
        self.expectation.lock().pattern.clone()
    }

    /// Whether this expectation currently substitutes behavior.
    #[must_use]
    pub fn substitutes(&self) -> bool {
        self.expectation.lock().substitutes()
    }
}

impl Debug for ExpectationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ExpectationHandle")
            .field(&*self.expectation.lock())
            .finish()
    }
}
