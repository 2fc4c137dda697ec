//! # forma-model
//!
//! Schema compiler and runtime entities for the Forma model layer.
//!
//! This crate provides:
//! - A schema compiler resolving `$ref` links, overrides, references,
//!   required names and defaults
//! - Entity and collection types built from compiled schemas
//! - Relation materialization from foreign-key-like attributes
//! - Attribute conversion, virtual properties and change notification
//! - Serialization under named or inline projections
//! - JSON-Schema validation with a custom validation hook
//! - A [`SchemaFactory`] owning registry, compiled-schema cache and type cache
//!
//! ## Example
//!
//! ```rust
//! use forma_model::{ProjectionOptions, SchemaFactory};
//! use forma_schema::SchemaDocument;
//! use serde_json::json;
//!
//! let factory = SchemaFactory::new();
//! factory.register(SchemaDocument::from_value(json!({
//!     "id": "schemas/company",
//!     "properties": {"id": {"type": "integer"}, "name": {"type": "string"}}
//! })).unwrap()).unwrap();
//! factory.register(SchemaDocument::from_value(json!({
//!     "id": "schemas/employee",
//!     "properties": {
//!         "name": {"type": "string"},
//!         "company_id": {"type": "integer"},
//!         "employer": {"$ref": "schemas/company", "references": {"id": "company_id"}}
//!     }
//! })).unwrap()).unwrap();
//!
//! let employee = factory
//!     .model_type("schemas/employee")
//!     .unwrap()
//!     .from_json(json!({"name": "Ann", "company_id": "222"}))
//!     .unwrap();
//!
//! let json = employee.serialize(&ProjectionOptions::recursive()).unwrap();
//! assert_eq!(json["employer"]["id"], json!(222));
//! ```

pub mod collection;
pub mod compiler;
pub mod convert;
pub mod entity;
pub mod error;
pub mod factory;
pub mod logging;
pub mod store;
pub mod template;
pub mod types;
pub mod value;

pub use collection::{Collection, CollectionOptions, CollectionType};
pub use compiler::{
    Cardinality, CompiledSchema, DefaultValue, PropertyOverride, RelationDefinition,
    RelationTarget,
};
pub use convert::{ConversionRegistry, parse_date, sanitize, to_boolean};
pub use entity::{Entity, EntityOptions, ParentRef, SetOptions, Violation};
pub use error::{ModelError, ModelResult};
pub use factory::{BaseTypes, CacheStats, FactoryOptions, SchemaFactory, SchemaRef};
pub use forma_schema::{Projection, ProjectionOptions, ProjectionSpec, VirtualSelection};
pub use store::AttributeStore;
pub use template::Template;
pub use types::{EntityType, EntityTypeBuilder, TypeHandle, VirtualProperty};
pub use value::{Attributes, Value};
