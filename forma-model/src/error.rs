//! Error types for compiling schemas and constructing entities.

// These warnings are false positives - the fields are used by derive macros
#![allow(unused_assignments)]

use forma_schema::SchemaError;
use miette::Diagnostic;
use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised while building types or materializing entities.
///
/// Conversions and validation never produce errors: unparseable values pass
/// through unchanged and violations are returned as data.
#[derive(Error, Debug, Diagnostic)]
pub enum ModelError {
    /// Error from the schema layer (unknown id, unregistrable document, ...).
    #[error(transparent)]
    #[diagnostic(transparent)]
    Schema(#[from] SchemaError),

    /// No base entity or collection type is available for a schema.
    #[error("cannot construct {kind} for `{schema}`")]
    #[diagnostic(
        code(forma::model::construction),
        help("register a base {kind} for the schema or configure a default one on the factory")
    )]
    ConstructionError { kind: String, schema: String },

    /// A relation cannot be materialized.
    #[error("relation `{relation}` cannot be materialized: {message}")]
    #[diagnostic(code(forma::model::relation))]
    RelationError { relation: String, message: String },

    /// A value cannot be used where it was given.
    #[error("invalid value for `{name}`: {message}")]
    #[diagnostic(code(forma::model::invalid_value))]
    InvalidValue { name: String, message: String },
}

impl ModelError {
    /// Create a construction error for a missing base model.
    pub fn no_base_model(schema: impl Into<String>) -> Self {
        Self::ConstructionError {
            kind: "model".to_string(),
            schema: schema.into(),
        }
    }

    /// Create a construction error for a missing base collection.
    pub fn no_base_collection(schema: impl Into<String>) -> Self {
        Self::ConstructionError {
            kind: "collection".to_string(),
            schema: schema.into(),
        }
    }

    /// Create a relation error.
    pub fn relation(relation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RelationError {
            relation: relation.into(),
            message: message.into(),
        }
    }

    /// Create an invalid value error.
    pub fn invalid_value(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Check whether this error reports a missing schema.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Schema(e) if e.is_not_found())
    }
}
