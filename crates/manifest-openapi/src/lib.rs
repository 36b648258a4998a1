//! Synthesizes [`Type`](manifest_morph::Type) trees from the OpenAPI v2
//! document published by a Kubernetes API server.
//!
//! The document is retrieved once through a [`SchemaDocumentSource`] and
//! handed to a [`Foundry`], which builds types on demand for a requested
//! [`SchemaRef`] and memoizes them for its whole lifetime.
//!
//! ```
//! use manifest_morph::Type;
//! use manifest_openapi::{Foundry, SchemaRef};
//!
//! let document = br#"{
//!     "definitions": {
//!         "io.k8s.api.core.v1.NamespaceSpec": {
//!             "type": "object",
//!             "properties": {
//!                 "finalizers": { "type": "array", "items": { "type": "string" } }
//!             }
//!         }
//!     }
//! }"#;
//!
//! let foundry = Foundry::new(document).expect("valid OpenAPI document");
//! let ty = foundry
//!     .resolve_type(&SchemaRef::definition("io.k8s.api.core.v1.NamespaceSpec"))
//!     .expect("definition exists");
//!
//! assert_eq!(*ty, Type::object([("finalizers", Type::list(Type::STRING))]));
//! ```

mod document;
mod foundry;
mod source;

pub use document::*;
pub use foundry::*;
pub use source::*;
