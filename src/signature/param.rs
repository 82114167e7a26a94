//! Parameter descriptions and the wildcard marker.

use std::fmt::{self, Debug, Display};

use super::value::{TypeTag, Value};

/// Whether a parameter carries a value into the function or out of it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Passed by the caller.
    In,
    /// Written by the function (a `&mut T` slot).
    Out,
}

/// The value half of a [`ParameterSpec`].
#[derive(Clone, Debug, PartialEq)]
pub enum ValueKind {
    /// Requires equality with this value.
    Concrete(Value),
    /// Matches any value of the slot's type.
    Wildcard,
}

/// Describes one call argument.
///
/// In a concrete call every input carries [`ValueKind::Concrete`] and every
/// output carries [`ValueKind::Wildcard`], since outputs have no meaningful
/// input value.
///
/// Two specs are equal when type, direction and value agree; names take
/// part only for outputs, where they bind substituted values.
#[derive(Clone, Debug)]
pub struct ParameterSpec {
    name: Option<String>,
    type_tag: TypeTag,
    direction: Direction,
    value: ValueKind,
}

impl ParameterSpec {
    /// An input expecting `value`.
    pub fn input<T>(value: T) -> Self
    where
        T: PartialEq + Debug + Send + Sync + 'static,
    {
        Self {
            name: None,
            type_tag: TypeTag::of::<T>(),
            direction: Direction::In,
            value: ValueKind::Concrete(Value::new(value)),
        }
    }

    /// An input holding an already erased value.
    #[must_use]
    pub fn input_value(value: Value) -> Self {
        Self {
            name: None,
            type_tag: value.type_tag(),
            direction: Direction::In,
            value: ValueKind::Concrete(value),
        }
    }

    /// An input matching any `T`.
    #[must_use]
    pub fn any_input<T: 'static>() -> Self {
        Self {
            name: None,
            type_tag: TypeTag::of::<T>(),
            direction: Direction::In,
            value: ValueKind::Wildcard,
        }
    }

    /// An output slot of type `T`. Output slots are always named.
    pub fn output<T: 'static>(name: impl Into<String>) -> Self {
        Self::output_tagged(TypeTag::of::<T>(), name)
    }

    pub(crate) fn output_tagged(type_tag: TypeTag, name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            type_tag,
            direction: Direction::Out,
            value: ValueKind::Wildcard,
        }
    }

    #[must_use]
    pub(crate) fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// The declared name, if known.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The slot's type.
    #[must_use]
    pub fn type_tag(&self) -> TypeTag {
        self.type_tag
    }

    /// In or out.
    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// The expected or observed value.
    #[must_use]
    pub fn value(&self) -> &ValueKind {
        &self.value
    }

    /// Whether this is a wildcard.
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        matches!(self.value, ValueKind::Wildcard)
    }
}

impl PartialEq for ParameterSpec {
    fn eq(&self, other: &Self) -> bool {
        self.type_tag == other.type_tag
            && self.direction == other.direction
            && self.value == other.value
            && (self.direction == Direction::In || self.name == other.name)
    }
}

impl Display for ParameterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.direction, &self.value) {
            (Direction::Out, _) => {
                write!(f, "out {}", self.name.as_deref().unwrap_or("_"))
            }
            (Direction::In, ValueKind::Concrete(v)) => write!(f, "{v:?}"),
            (Direction::In, ValueKind::Wildcard) => write!(f, "any::<{}>()", self.type_tag),
        }
    }
}

/// A pattern argument: either a concrete value or the wildcard.
///
/// ```rust
/// use static_mock::{any, Arg};
///
/// let exact: Arg<String> = "A".into();
/// let wild: Arg<String> = any();
/// assert_eq!(exact, Arg::Value("A".to_string()));
/// assert_eq!(wild, Arg::Any);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Arg<T> {
    /// Match this value exactly.
    Value(T),
    /// Match any value.
    Any,
}

/// The wildcard marker, usable wherever a pattern argument is expected.
#[must_use]
pub fn any<T>() -> Arg<T> {
    Arg::Any
}

impl<T> From<T> for Arg<T> {
    fn from(value: T) -> Self {
        Arg::Value(value)
    }
}

impl From<&str> for Arg<String> {
    fn from(value: &str) -> Self {
        Arg::Value(value.to_owned())
    }
}

impl<T> Arg<T>
where
    T: PartialEq + Debug + Send + Sync + 'static,
{
    /// Turn into an input parameter spec.
    pub fn into_spec(self) -> ParameterSpec {
        match self {
            Arg::Value(v) => ParameterSpec::input(v),
            Arg::Any => ParameterSpec::any_input::<T>(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_spec() {
        let p = ParameterSpec::input(5_i32).named("x");
        assert_eq!(p.name(), Some("x"));
        assert_eq!(p.direction(), Direction::In);
        assert_eq!(p.type_tag(), TypeTag::of::<i32>());
        assert!(!p.is_wildcard());
        assert_eq!(p.to_string(), "5");
    }

    #[test]
    fn test_output_spec_is_wildcard() {
        let p = ParameterSpec::output::<i32>("result");
        assert!(p.is_wildcard());
        assert_eq!(p.direction(), Direction::Out);
        assert_eq!(p.to_string(), "out result");
    }

    #[test]
    fn test_wildcard_display() {
        let p = ParameterSpec::any_input::<u8>();
        assert_eq!(p.to_string(), "any::<u8>()");
    }

    #[test]
    fn test_arg_into_spec() {
        let exact: Arg<String> = "A".into();
        assert_eq!(exact.into_spec(), ParameterSpec::input("A".to_string()));

        let wild = any::<String>().into_spec();
        assert!(wild.is_wildcard());
        assert_eq!(wild.type_tag(), TypeTag::of::<String>());
    }
}
