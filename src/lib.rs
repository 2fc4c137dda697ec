//! # Forma
//!
//! Schema-driven in-memory models for Rust.
//!
//! Forma provides:
//! - JSON-Schema style documents with projections, defaults and relations
//! - A schema compiler that turns documents into entity and collection types
//! - Entities that materialize related entities from foreign-key attributes
//! - Serialization under named or inline projections
//! - Validation against the compiled schema plus custom hooks
//!
//! ## Quick Start
//!
//! ```rust
//! use forma::prelude::*;
//! use serde_json::json;
//!
//! let factory = SchemaFactory::new();
//! factory
//!     .register(SchemaDocument::from_value(json!({
//!         "id": "schemas/person",
//!         "properties": {
//!             "id": {"type": "integer"},
//!             "name": {"type": "string"},
//!             "secret": {"type": "string"}
//!         },
//!         "required": ["name"],
//!         "projection": {"public": {"remove": ["secret"]}}
//!     }))?)?;
//!
//! let person = factory
//!     .model_type("schemas/person")?
//!     .from_json(json!({"id": "7", "name": "Ann", "secret": "s"}))?;
//!
//! assert!(person.is_valid());
//! assert_eq!(
//!     person.serialize(&ProjectionOptions::new().with_projection("public")),
//!     Some(json!({"id": 7, "name": "Ann"}))
//! );
//! # Ok::<(), forma::ModelError>(())
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// Schema documents, projections, configuration and the registry.
pub mod schema {
    pub use forma_schema::*;
}

/// Compiled schemas, entities, collections and the factory.
pub mod model {
    pub use forma_model::*;
}

pub use forma_model::logging;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::model::{
        BaseTypes, Collection, CollectionType, Entity, EntityOptions, EntityType, FactoryOptions,
        ModelError, ModelResult, SchemaFactory, SetOptions, Template, TypeHandle, Value,
        VirtualProperty, Violation,
    };
    pub use crate::schema::{
        FormaConfig, Projection, ProjectionOptions, ProjectionSpec, SchemaDocument,
        SchemaError, SchemaRegistry,
    };
}

// Re-export key types at the crate root
pub use model::{Entity, ModelError, SchemaFactory};
pub use schema::{FormaConfig, SchemaDocument, SchemaError};
