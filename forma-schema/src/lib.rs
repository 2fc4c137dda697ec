//! # forma-schema
//!
//! Schema documents for the Forma model layer.
//!
//! This crate provides:
//! - Serde types for JSON schema documents, properties and projections
//! - Schema extension (layering patches over a base document)
//! - A registry with lazy fetching of unknown ids
//! - Configuration parser for `forma.toml` files
//!
//! ## Example
//!
//! ```rust
//! use forma_schema::{SchemaDocument, SchemaRegistry};
//!
//! let schema = SchemaDocument::from_json(r##"{
//!     "id": "schemas/person",
//!     "properties": {
//!         "firstName": {"type": "string", "required": true},
//!         "spouse": {"$ref": "#"}
//!     }
//! }"##).unwrap();
//!
//! let mut registry = SchemaRegistry::new();
//! registry.register(schema).unwrap();
//! assert!(registry.contains("schemas/person"));
//! ```

pub mod config;
pub mod document;
pub mod error;
pub mod registry;

pub use config::FormaConfig;
pub use document::{
    Projection, ProjectionOptions, ProjectionSpec, PropertyDefinition, PropertyType,
    RelationProjection, SchemaDocument, SchemaKind, VirtualSelection,
};
pub use error::{SchemaError, SchemaResult};
pub use registry::{FileSchemaSource, SchemaRegistry, SchemaSource};
