//! Type-erased argument values.

use std::any::{Any, TypeId};
use std::fmt::{self, Debug, Display};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::error::{Error, Result};

/// Semantic type identifier of an argument slot.
///
/// Equality and hashing use the [`TypeId`] only; the name is kept for
/// messages.
#[derive(Clone, Copy)]
pub struct TypeTag {
    id: TypeId,
    name: &'static str,
}

impl TypeTag {
    /// The tag of `T`.
    ///
    /// ```rust
    /// use static_mock::TypeTag;
    ///
    /// assert_eq!(TypeTag::of::<i32>(), TypeTag::of::<i32>());
    /// assert_ne!(TypeTag::of::<i32>(), TypeTag::of::<u32>());
    /// ```
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// The Rust type name, for diagnostics.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether this tag describes `T`.
    #[must_use]
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

impl PartialEq for TypeTag {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeTag {}

impl Hash for TypeTag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Debug for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// An argument value the engine can store, compare and print.
///
/// Implemented for every `T: PartialEq + Debug + Send + Sync + 'static`.
pub trait ArgValue: Any + Debug + Send + Sync {
    /// Upcast for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Equality under `Self`'s own `PartialEq`; values of other types are
    /// never equal.
    fn eq_value(&self, other: &dyn ArgValue) -> bool;

    /// The tag of the concrete type.
    fn type_tag(&self) -> TypeTag;
}

impl<T> ArgValue for T
where
    T: PartialEq + Debug + Send + Sync + 'static,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn eq_value(&self, other: &dyn ArgValue) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| self == other)
    }

    fn type_tag(&self) -> TypeTag {
        TypeTag::of::<T>()
    }
}

/// A shared, type-erased argument value.
///
/// Cloning is cheap; clones share the same underlying value.
///
/// ```rust
/// use static_mock::Value;
///
/// let v = Value::new(String::from("A"));
/// assert_eq!(v, Value::new(String::from("A")));
/// assert_ne!(v, Value::new(String::from("B")));
/// assert_eq!(v.downcast_ref::<String>().map(String::as_str), Some("A"));
/// ```
#[derive(Clone)]
pub struct Value(Arc<dyn ArgValue>);

impl Value {
    /// Wrap a value.
    pub fn new<T>(value: T) -> Self
    where
        T: PartialEq + Debug + Send + Sync + 'static,
    {
        Self(Arc::new(value))
    }

    /// The tag of the stored value's type.
    #[must_use]
    pub fn type_tag(&self) -> TypeTag {
        self.0.type_tag()
    }

    /// Borrow the stored value as `T`.
    #[must_use]
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }

    /// Clone the stored value out as `T`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] if the value is not a `T`.
    pub fn get<T: Clone + 'static>(&self, what: &str) -> Result<T> {
        self.downcast_ref::<T>()
            .cloned()
            .ok_or_else(|| Error::type_mismatch(what, std::any::type_name::<T>(), self.type_tag().name()))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_value(other.0.as_ref())
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Debug::fmt(&*self.0, f)
    }
}

/// A value produced by a replacement callback.
///
/// Return types need not be comparable, so they travel as `dyn Any` and are
/// downcast at the call site.
pub struct ReturnValue {
    inner: Box<dyn Any + Send>,
    type_name: &'static str,
}

impl ReturnValue {
    /// Box a return value.
    pub fn new<R: Send + 'static>(value: R) -> Self {
        Self {
            inner: Box::new(value),
            type_name: std::any::type_name::<R>(),
        }
    }

    /// The Rust type name of the boxed value.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Unbox as `R`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] if the boxed value is not an `R`.
    pub fn take<R: 'static>(self, what: &str) -> Result<R> {
        let found = self.type_name;
        self.inner
            .downcast::<R>()
            .map(|boxed| *boxed)
            .map_err(|_| Error::type_mismatch(what, std::any::type_name::<R>(), found))
    }
}

impl Debug for ReturnValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReturnValue")
            .field("type", &self.type_name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_of_different_types_never_equal() {
        assert_ne!(Value::new(1_i32), Value::new(1_i64));
        assert_ne!(Value::new(String::from("1")), Value::new(1_i32));
    }

    #[test]
    fn test_value_get_type_mismatch() {
        let v = Value::new(42_i32);
        assert_eq!(v.get::<i32>("x").unwrap(), 42);
        let err = v.get::<String>("output `x`").unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { found: "i32", .. }));
    }

    #[test]
    fn test_value_debug_delegates() {
        assert_eq!(format!("{:?}", Value::new("hi".to_string())), "\"hi\"");
    }

    #[test]
    fn test_return_value_take() {
        let r = ReturnValue::new(String::from("X"));
        assert_eq!(r.take::<String>("return").unwrap(), "X");

        let r = ReturnValue::new(7_u8);
        assert!(matches!(
            r.take::<String>("return"),
            Err(Error::TypeMismatch { found: "u8", .. })
        ));
    }

    #[test]
    fn test_type_tag_names() {
        let tag = TypeTag::of::<String>();
        assert!(tag.is::<String>());
        assert!(tag.name().ends_with("String"));
    }
}
