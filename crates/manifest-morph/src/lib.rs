//! This library provides the static type and value model used to carry
//! Kubernetes manifests through a host that only understands pre-declared
//! type trees.
//!
//! A [`Type`] describes a shape (primitive, list, tuple, set, object or map)
//! and a [`Value`] is an instance of such a shape which is either known,
//! null or not yet known ([`ValueState::Unknown`]).
//!
//! ## Usage
//!
//! Dynamic JSON documents are morphed into typed values with [`from_json`]
//! and back with [`to_json`]. Values that the remote system will compute
//! later are marked with [`deep_unknown`].
//!
//! ```
//! use std::collections::BTreeMap;
//!
//! use manifest_morph::{AttributePath, Primitive, Type, deep_unknown, from_json};
//!
//! let ty = Type::Object(BTreeMap::from([
//!     ("name".to_owned(), Type::Primitive(Primitive::String)),
//!     ("namespace".to_owned(), Type::Primitive(Primitive::String)),
//! ]));
//!
//! let value = from_json(&ty, &serde_json::json!({ "name": "foo" }), &AttributePath::new())
//!     .expect("JSON matches the declared type");
//! let planned = deep_unknown(&ty, &value, &AttributePath::new())
//!     .expect("value matches the declared type");
//!
//! assert!(planned.attribute("namespace").expect("declared attribute").is_unknown());
//! ```

use snafu::Snafu;

mod deep_unknown;
mod json;
mod path;
mod types;
mod value;

pub use deep_unknown::*;
pub use json::*;
pub use path::*;
pub use types::*;
pub use value::*;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("value at {path} does not match type: expected {expected}, found {found}"))]
    ShapeMismatch {
        path: AttributePath,
        expected: String,
        found: String,
    },

    #[snafu(display("value at {path} is unknown and cannot be converted to JSON"))]
    UnknownValue { path: AttributePath },

    #[snafu(display("failed to parse {input:?} at {path} as a number"))]
    InvalidNumber { path: AttributePath, input: String },
}
