//! Function shapes: the immutable metadata of an interceptable function.
//!
//! A shape is captured once, when the function is wired to the engine, and
//! patterns are resolved against it before they are used.

use std::collections::HashMap;
use std::fmt::{self, Debug, Display};
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use super::call::CallSignature;
use super::param::{Arg, Direction, ParameterSpec};
use super::value::{TypeTag, Value};
use crate::error::{Error, Result};

/// One declared parameter of a [`FunctionShape`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Slot {
    name: String,
    type_tag: TypeTag,
    direction: Direction,
}

impl Slot {
    /// Declared parameter name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared type (the pointee for `&T` and `&mut T`).
    #[must_use]
    pub fn type_tag(&self) -> TypeTag {
        self.type_tag
    }

    /// In or out.
    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }
}

/// Owner, name, ordered parameter slots and return type of one function.
///
/// ```rust
/// use static_mock::FunctionShape;
///
/// let shape = FunctionShape::builder("lib!lib::parse", "try_parse")
///     .input::<String>("s")
///     .output::<i32>("result")
///     .returns::<bool>()
///     .build();
///
/// assert_eq!(shape.slots().len(), 2);
/// assert!(shape.to_string().ends_with("out result: i32) -> bool"));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionShape {
    owner: String,
    function: String,
    slots: Vec<Slot>,
    returns: Option<TypeTag>,
}

impl FunctionShape {
    /// Start describing a function.
    pub fn builder(owner: impl Into<String>, function: impl Into<String>) -> ShapeBuilder {
        ShapeBuilder {
            shape: FunctionShape {
                owner: owner.into(),
                function: function.into(),
                slots: Vec::new(),
                returns: None,
            },
        }
    }

    /// Owner identity.
    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Function name.
    #[must_use]
    pub fn function(&self) -> &str {
        &self.function
    }

    /// Declared parameters in order.
    #[must_use]
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Return type, `None` for unit.
    #[must_use]
    pub fn returns(&self) -> Option<TypeTag> {
        self.returns
    }

    /// Check that `signature` has exactly this shape.
    ///
    /// # Errors
    ///
    /// Returns the reason the signature does not fit.
    pub fn check(&self, signature: &CallSignature) -> std::result::Result<(), String> {
        if signature.owner() != self.owner || signature.function() != self.function {
            return Err(format!("not a call to {}::{}", self.owner, self.function));
        }
        if signature.arity() != self.slots.len() {
            return Err(format!(
                "expected {} parameter(s), got {}",
                self.slots.len(),
                signature.arity()
            ));
        }
        for (index, (slot, param)) in self.slots.iter().zip(signature.parameters()).enumerate() {
            if slot.direction != param.direction() {
                return Err(format!(
                    "parameter {index} (`{}`) is {:?}, pattern has {:?}",
                    slot.name,
                    slot.direction,
                    param.direction()
                ));
            }
            if slot.type_tag != param.type_tag() {
                return Err(format!(
                    "parameter {index} (`{}`) is {}, pattern has {}",
                    slot.name,
                    slot.type_tag,
                    param.type_tag()
                ));
            }
            if slot.direction == Direction::Out && param.name() != Some(slot.name.as_str()) {
                return Err(format!(
                    "output {index} is named `{}`, pattern has `{}`",
                    slot.name,
                    param.name().unwrap_or("_")
                ));
            }
        }
        Ok(())
    }

    /// Build a pattern for this function, checked slot by slot.
    #[must_use]
    pub fn pattern(self: &Arc<Self>) -> ShapedSignatureBuilder {
        ShapedSignatureBuilder::new(Arc::clone(self), false)
    }

    /// Build a concrete call of this function. Wildcards are rejected.
    #[must_use]
    pub fn call(self: &Arc<Self>) -> ShapedSignatureBuilder {
        ShapedSignatureBuilder::new(Arc::clone(self), true)
    }
}

impl Display for FunctionShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}(", self.owner, self.function)?;
        for (i, slot) in self.slots.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            if slot.direction == Direction::Out {
                f.write_str("out ")?;
            }
            write!(f, "{}: {}", slot.name, slot.type_tag)?;
        }
        f.write_str(")")?;
        if let Some(returns) = self.returns {
            write!(f, " -> {returns}")?;
        }
        Ok(())
    }
}

/// Builder for [`FunctionShape`].
#[derive(Debug)]
pub struct ShapeBuilder {
    shape: FunctionShape,
}

impl ShapeBuilder {
    /// Declare an input parameter of type `T`.
    #[must_use]
    pub fn input<T: 'static>(self, name: impl Into<String>) -> Self {
        self.slot(name, TypeTag::of::<T>(), Direction::In)
    }

    /// Declare an output parameter of type `T`.
    #[must_use]
    pub fn output<T: 'static>(self, name: impl Into<String>) -> Self {
        self.slot(name, TypeTag::of::<T>(), Direction::Out)
    }

    /// Declare the return type. Unit-returning functions leave it unset.
    #[must_use]
    pub fn returns<R: 'static>(mut self) -> Self {
        if !TypeTag::of::<R>().is::<()>() {
            self.shape.returns = Some(TypeTag::of::<R>());
        }
        self
    }

    fn slot(mut self, name: impl Into<String>, type_tag: TypeTag, direction: Direction) -> Self {
        self.shape.slots.push(Slot {
            name: name.into(),
            type_tag,
            direction,
        });
        self
    }

    /// Finish without registering.
    #[must_use]
    pub fn build(self) -> FunctionShape {
        self.shape
    }

    /// Finish and register in the global [`ShapeCatalog`].
    pub fn register(self) -> Arc<FunctionShape> {
        ShapeCatalog::global().register(self.shape)
    }
}

static GLOBAL_CATALOG: Lazy<ShapeCatalog> = Lazy::new(ShapeCatalog::new);

/// The known shapes, keyed by owner and function name.
///
/// Shapes are append-only metadata shared by every thread; scope state never
/// lives here.
#[derive(Default)]
pub struct ShapeCatalog {
    shapes: RwLock<HashMap<(String, String), Vec<Arc<FunctionShape>>>>,
}

impl ShapeCatalog {
    /// An empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide catalog used by scopes and by `#[interceptable]`.
    #[must_use]
    pub fn global() -> &'static ShapeCatalog {
        &GLOBAL_CATALOG
    }

    /// Register a shape. Registering an identical shape again returns the
    /// existing entry.
    pub fn register(&self, shape: FunctionShape) -> Arc<FunctionShape> {
        let key = (shape.owner.clone(), shape.function.clone());
        let mut shapes = self.shapes.write();
        let entry = shapes.entry(key).or_default();
        if let Some(existing) = entry.iter().find(|s| ***s == shape) {
            return Arc::clone(existing);
        }
        tracing::debug!(shape = %shape, "registered function shape");
        let shape = Arc::new(shape);
        entry.push(Arc::clone(&shape));
        shape
    }

    /// Every shape registered under `owner` and `function`.
    #[must_use]
    pub fn shapes_for(&self, owner: &str, function: &str) -> Vec<Arc<FunctionShape>> {
        self.shapes
            .read()
            .get(&(owner.to_string(), function.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    /// Resolve `signature` to exactly one known shape.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AmbiguousSignature`] if no shape is known for the
    /// function, if none fits, or if more than one fits.
    pub fn resolve(&self, signature: &CallSignature) -> Result<Arc<FunctionShape>> {
        let shapes = self.shapes_for(signature.owner(), signature.function());
        if shapes.is_empty() {
            return Err(Error::ambiguous(
                signature,
                "no interceptable function with this owner and name is known",
            ));
        }

        let mut fitting = Vec::new();
        let mut first_reason = None;
        for shape in shapes {
            match shape.check(signature) {
                Ok(()) => fitting.push(shape),
                Err(reason) => {
                    first_reason.get_or_insert(reason);
                }
            }
        }

        match fitting.len() {
            1 => Ok(fitting.remove(0)),
            0 => Err(Error::ambiguous(
                signature,
                first_reason.unwrap_or_else(|| "no known shape fits".to_string()),
            )),
            n => Err(Error::ambiguous(
                signature,
                format!("fits {n} known shapes"),
            )),
        }
    }
}

impl Debug for ShapeCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShapeCatalog")
            .field("functions", &self.shapes.read().len())
            .finish()
    }
}

/// Builds a signature against a [`FunctionShape`].
///
/// Inputs are supplied in order; output slots are filled in automatically
/// with their declared names. Mistakes are collected and reported by
/// [`build`](Self::build).
///
/// ```rust
/// use static_mock::{any, FunctionShape};
///
/// let shape = FunctionShape::builder("lib!lib::parse", "try_parse")
///     .input::<String>("s")
///     .output::<i32>("result")
///     .returns::<bool>()
///     .register();
///
/// let pattern = shape.pattern().matching(any::<String>()).build().unwrap();
/// assert_eq!(pattern.arity(), 2);
/// assert_eq!(pattern.outputs().next().and_then(|p| p.name()), Some("result"));
///
/// // Wrong type for the first input.
/// assert!(shape.pattern().arg(3_u8).build().is_err());
/// ```
#[derive(Debug)]
pub struct ShapedSignatureBuilder {
    shape: Arc<FunctionShape>,
    params: Vec<ParameterSpec>,
    concrete: bool,
    error: Option<String>,
}

impl ShapedSignatureBuilder {
    fn new(shape: Arc<FunctionShape>, concrete: bool) -> Self {
        let mut builder = Self {
            params: Vec::with_capacity(shape.slots.len()),
            shape,
            concrete,
            error: None,
        };
        builder.fill_outputs();
        builder
    }

    /// Append a concrete input.
    #[must_use]
    pub fn arg<T>(self, value: T) -> Self
    where
        T: PartialEq + Debug + Send + Sync + 'static,
    {
        self.value(Value::new(value))
    }

    /// Append a concrete `String` input.
    #[must_use]
    pub fn arg_str(self, value: &str) -> Self {
        self.arg(value.to_owned())
    }

    /// Append an input given as an [`Arg`].
    #[must_use]
    pub fn matching<T>(self, arg: Arg<T>) -> Self
    where
        T: PartialEq + Debug + Send + Sync + 'static,
    {
        match arg {
            Arg::Value(v) => self.arg(v),
            Arg::Any => self.any::<T>(),
        }
    }

    /// Append a wildcard input of type `T`.
    #[must_use]
    pub fn any<T: 'static>(mut self) -> Self {
        if self.concrete {
            self.fail(format!(
                "wildcard at parameter {} of a concrete call",
                self.params.len()
            ));
            return self;
        }
        self.push_input(ParameterSpec::any_input::<T>())
    }

    /// Append an input holding an erased value.
    #[must_use]
    pub fn value(self, value: Value) -> Self {
        self.push_input(ParameterSpec::input_value(value))
    }

    /// Finish the signature.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AmbiguousSignature`] if an input had the wrong type,
    /// if inputs are missing or extra, or if a concrete call got a wildcard.
    pub fn build(self) -> Result<CallSignature> {
        let signature = CallSignature::new(
            self.shape.owner.clone(),
            self.shape.function.clone(),
            self.params,
        );
        if let Some(reason) = self.error {
            return Err(Error::ambiguous(&signature, reason));
        }
        if signature.arity() != self.shape.slots.len() {
            let inputs = self
                .shape
                .slots
                .iter()
                .filter(|s| s.direction == Direction::In)
                .count();
            return Err(Error::ambiguous(
                &signature,
                format!("expected {inputs} input(s) for {}", self.shape),
            ));
        }
        Ok(signature)
    }

    fn push_input(mut self, param: ParameterSpec) -> Self {
        if self.error.is_some() {
            return self;
        }
        let index = self.params.len();
        let Some(slot) = self.shape.slots.get(index) else {
            self.fail(format!("too many inputs for {}", self.shape));
            return self;
        };
        if slot.type_tag != param.type_tag() {
            let reason = format!(
                "parameter {index} (`{}`) is {}, got {}",
                slot.name,
                slot.type_tag,
                param.type_tag()
            );
            self.fail(reason);
            return self;
        }
        let named = param.named(slot.name.clone());
        self.params.push(named);
        self.fill_outputs();
        self
    }

    /// Append every output slot that directly follows the current position.
    fn fill_outputs(&mut self) {
        while let Some(slot) = self.shape.slots.get(self.params.len()) {
            if slot.direction != Direction::Out {
                break;
            }
            self.params
                .push(ParameterSpec::output_tagged(slot.type_tag, slot.name.clone()));
        }
    }

    fn fail(&mut self, reason: String) {
        self.error.get_or_insert(reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::any;

    fn parse_shape(owner: &str) -> FunctionShape {
        FunctionShape::builder(owner, "try_parse")
            .input::<String>("s")
            .output::<i32>("result")
            .returns::<bool>()
            .build()
    }

    #[test]
    fn test_register_is_idempotent() {
        let catalog = ShapeCatalog::new();
        let a = catalog.register(parse_shape("o"));
        let b = catalog.register(parse_shape("o"));
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(catalog.shapes_for("o", "try_parse").len(), 1);
    }

    #[test]
    fn test_unit_return_is_none() {
        let shape = FunctionShape::builder("o", "f").returns::<()>().build();
        assert!(shape.returns().is_none());
    }

    #[test]
    fn test_resolve_unknown_function() {
        let catalog = ShapeCatalog::new();
        let sig = CallSignature::builder("o", "missing").build();
        assert!(matches!(
            catalog.resolve(&sig),
            Err(Error::AmbiguousSignature { .. })
        ));
    }

    #[test]
    fn test_resolve_arity_mismatch() {
        let catalog = ShapeCatalog::new();
        catalog.register(parse_shape("o"));
        let sig = CallSignature::builder("o", "try_parse").arg_str("1").build();
        let err = catalog.resolve(&sig).unwrap_err();
        assert!(err.to_string().contains("expected 2 parameter(s), got 1"));
    }

    #[test]
    fn test_resolve_type_mismatch() {
        let catalog = ShapeCatalog::new();
        catalog.register(parse_shape("o"));
        let sig = CallSignature::builder("o", "try_parse")
            .arg(1_u32)
            .out::<i32>("result")
            .build();
        assert!(catalog.resolve(&sig).is_err());
    }

    #[test]
    fn test_resolve_output_name_mismatch() {
        let catalog = ShapeCatalog::new();
        catalog.register(parse_shape("o"));
        let sig = CallSignature::builder("o", "try_parse")
            .arg_str("1")
            .out::<i32>("value")
            .build();
        let err = catalog.resolve(&sig).unwrap_err();
        assert!(err.to_string().contains("named `result`"));
    }

    #[test]
    fn test_resolve_exact() {
        let catalog = ShapeCatalog::new();
        let shape = catalog.register(parse_shape("o"));
        let sig = CallSignature::builder("o", "try_parse")
            .any::<String>()
            .out::<i32>("result")
            .build();
        assert!(Arc::ptr_eq(&catalog.resolve(&sig).unwrap(), &shape));
    }

    #[test]
    fn test_shaped_builder_fills_outputs_by_name() {
        let shape = Arc::new(
            FunctionShape::builder("o", "split")
                .output::<i32>("one")
                .input::<u8>("sep")
                .output::<String>("empty_string")
                .output::<i32>("two")
                .build(),
        );
        let sig = shape.call().arg(b',').build().unwrap();
        let names: Vec<_> = sig.parameters().iter().map(|p| p.name()).collect();
        assert_eq!(
            names,
            vec![Some("one"), Some("sep"), Some("empty_string"), Some("two")]
        );
        assert!(shape.check(&sig).is_ok());
    }

    #[test]
    fn test_shaped_builder_missing_input() {
        let shape = Arc::new(parse_shape("o"));
        let err = shape.pattern().build().unwrap_err();
        assert!(err.to_string().contains("expected 1 input(s)"));
    }

    #[test]
    fn test_shaped_builder_too_many_inputs() {
        let shape = Arc::new(parse_shape("o"));
        let err = shape.pattern().arg_str("a").arg_str("b").build().unwrap_err();
        assert!(err.to_string().contains("too many inputs"));
    }

    #[test]
    fn test_concrete_call_rejects_wildcard() {
        let shape = Arc::new(parse_shape("o"));
        let err = shape.call().matching(any::<String>()).build().unwrap_err();
        assert!(err.to_string().contains("wildcard"));
    }
}
