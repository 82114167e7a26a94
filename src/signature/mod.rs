//! Describing calls: parameters, signatures and function shapes.
//!
//! - [`ParameterSpec`] - one argument: type, direction, value or wildcard
//! - [`CallSignature`] - owner, function name and ordered parameters
//! - [`FunctionShape`] - the authoritative, immutable shape of a function
//! - [`ShapeCatalog`] - the registry of known shapes patterns resolve against
//!
//! # Example
//!
//! ```rust
//! use static_mock::signature::{CallSignature, Direction};
//!
//! let call = CallSignature::builder("lib!lib::parse", "try_parse")
//!     .arg_str("fubar")
//!     .out::<i32>("result")
//!     .build();
//!
//! assert!(call.is_concrete());
//! assert_eq!(call.parameters()[1].direction(), Direction::Out);
//! ```

mod call;
mod param;
mod shape;
mod value;

pub use call::{CallSignature, SignatureBuilder};
pub use param::{any, Arg, Direction, ParameterSpec, ValueKind};
pub use shape::{FunctionShape, ShapeBuilder, ShapeCatalog, ShapedSignatureBuilder, Slot};
pub use value::{ArgValue, ReturnValue, TypeTag, Value};
