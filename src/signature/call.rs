//! Call signatures: which function, with which arguments.

use std::fmt::{self, Debug, Display};

use super::param::{Arg, Direction, ParameterSpec};
use super::value::Value;

/// Identifies one invocation (concrete) or a family of invocations (pattern).
///
/// `owner` is the stable identity of the declaring scope, for example
/// `"my-crate!my_crate::sut"`. Parameters are kept in declaration order.
///
/// ```rust
/// use static_mock::CallSignature;
///
/// let pattern = CallSignature::builder("lib!lib::strings", "greet")
///     .arg_str("world")
///     .any::<u32>()
///     .build();
///
/// assert_eq!(pattern.arity(), 2);
/// assert_eq!(pattern.to_string(), "lib!lib::strings::greet(\"world\", any::<u32>())");
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct CallSignature {
    owner: String,
    function: String,
    parameters: Vec<ParameterSpec>,
}

impl CallSignature {
    /// Assemble a signature from its parts.
    pub fn new(
        owner: impl Into<String>,
        function: impl Into<String>,
        parameters: Vec<ParameterSpec>,
    ) -> Self {
        Self {
            owner: owner.into(),
            function: function.into(),
            parameters,
        }
    }

    /// Start building a signature parameter by parameter.
    pub fn builder(owner: impl Into<String>, function: impl Into<String>) -> SignatureBuilder {
        SignatureBuilder {
            signature: Self::new(owner, function, Vec::new()),
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

    /// All parameters in declaration order.
    #[must_use]
    pub fn parameters(&self) -> &[ParameterSpec] {
        &self.parameters
    }

    /// Number of parameters, inputs and outputs together.
    #[must_use]
    pub fn arity(&self) -> usize {
        self.parameters.len()
    }

    /// The output parameters, in declaration order.
    pub fn outputs(&self) -> impl Iterator<Item = &ParameterSpec> {
        self.parameters
            .iter()
            .filter(|p| p.direction() == Direction::Out)
    }

    /// Whether `other` names the same function (owner and name).
    #[must_use]
    pub fn same_function(&self, other: &CallSignature) -> bool {
        self.owner == other.owner && self.function == other.function
    }

    /// Whether every input is concrete, i.e. this can stand for a real call.
    #[must_use]
    pub fn is_concrete(&self) -> bool {
        self.parameters
            .iter()
            .all(|p| p.direction() == Direction::Out || !p.is_wildcard())
    }
}

impl Display for CallSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}(", self.owner, self.function)?;
        for (i, p) in self.parameters.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            Display::fmt(p, f)?;
        }
        f.write_str(")")
    }
}

/// Builder for [`CallSignature`].
#[derive(Debug)]
pub struct SignatureBuilder {
    signature: CallSignature,
}

impl SignatureBuilder {
    /// Append a concrete input.
    #[must_use]
    pub fn arg<T>(self, value: T) -> Self
    where
        T: PartialEq + Debug + Send + Sync + 'static,
    {
        self.param(ParameterSpec::input(value))
    }

    /// Append a concrete `String` input.
    #[must_use]
    pub fn arg_str(self, value: &str) -> Self {
        self.arg(value.to_owned())
    }

    /// Append a wildcard input of type `T`.
    #[must_use]
    pub fn any<T: 'static>(self) -> Self {
        self.param(ParameterSpec::any_input::<T>())
    }

    /// Append an input given as an [`Arg`].
    #[must_use]
    pub fn matching<T>(self, arg: Arg<T>) -> Self
    where
        T: PartialEq + Debug + Send + Sync + 'static,
    {
        self.param(arg.into_spec())
    }

    /// Append an input holding an erased value.
    #[must_use]
    pub fn value(self, value: Value) -> Self {
        self.param(ParameterSpec::input_value(value))
    }

    /// Append an output slot of type `T`.
    #[must_use]
    pub fn out<T: 'static>(self, name: impl Into<String>) -> Self {
        self.param(ParameterSpec::output::<T>(name))
    }

    /// Append a prepared parameter.
    #[must_use]
    pub fn param(mut self, param: ParameterSpec) -> Self {
        self.signature.parameters.push(param);
        self
    }

    /// Finish the signature.
    #[must_use]
    pub fn build(self) -> CallSignature {
        self.signature
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::any;

    #[test]
    fn test_builder_keeps_order() {
        let sig = CallSignature::builder("o", "f")
            .arg(1_i32)
            .out::<i32>("one")
            .arg_str("s")
            .build();
        let dirs: Vec<_> = sig.parameters().iter().map(ParameterSpec::direction).collect();
        assert_eq!(dirs, vec![Direction::In, Direction::Out, Direction::In]);
        assert_eq!(sig.outputs().count(), 1);
    }

    #[test]
    fn test_display() {
        let sig = CallSignature::builder("lib!lib::parse", "try_parse")
            .arg_str("fubar")
            .out::<i32>("result")
            .build();
        assert_eq!(sig.to_string(), "lib!lib::parse::try_parse(\"fubar\", out result)");
    }

    #[test]
    fn test_structural_equality() {
        let a = CallSignature::builder("o", "f").arg_str("A").build();
        let b = CallSignature::builder("o", "f").matching(Arg::<String>::from("A")).build();
        let c = CallSignature::builder("o", "f").matching(any::<String>()).build();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_is_concrete() {
        let concrete = CallSignature::builder("o", "f")
            .arg(1_u8)
            .out::<u8>("x")
            .build();
        assert!(concrete.is_concrete());

        let pattern = CallSignature::builder("o", "f").any::<u8>().build();
        assert!(!pattern.is_concrete());
    }
}
