//! Error types for schema documents, registration and configuration.

// These warnings are false positives - the fields are used by derive macros
#![allow(unused_assignments)]

use miette::Diagnostic;
use thiserror::Error;

/// Result type for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Errors that can occur while loading, registering or resolving schemas.
#[derive(Error, Debug, Diagnostic)]
pub enum SchemaError {
    /// Error reading a file.
    #[error("failed to read file: {path}")]
    #[diagnostic(code(forma::schema::io_error))]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A schema document could not be decoded.
    #[error("invalid schema document ({context})")]
    #[diagnostic(code(forma::schema::invalid_document))]
    InvalidDocument {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// No schema is registered under the requested id and no source could provide one.
    #[error("cannot find schema `{id}`")]
    #[diagnostic(
        code(forma::schema::not_found),
        help("register the schema before creating types that reference it")
    )]
    SchemaNotFound { id: String },

    /// A schema without an id was handed to the registry.
    #[error("cannot register schema: {message}")]
    #[diagnostic(code(forma::schema::registration))]
    RegistrationError { message: String },

    /// A property definition is unusable.
    #[error("invalid property `{schema}.{property}`: {message}")]
    #[diagnostic(code(forma::schema::invalid_property))]
    InvalidProperty {
        schema: String,
        property: String,
        message: String,
    },

    /// Configuration error.
    #[error("configuration error: {message}")]
    #[diagnostic(code(forma::schema::config_error))]
    ConfigError { message: String },

    /// TOML parsing error.
    #[error("failed to parse TOML")]
    #[diagnostic(code(forma::schema::toml_error))]
    TomlError {
        #[source]
        source: toml::de::Error,
    },
}

impl SchemaError {
    /// Create a schema-not-found error.
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::SchemaNotFound { id: id.into() }
    }

    /// Create a registration error.
    pub fn registration(message: impl Into<String>) -> Self {
        Self::RegistrationError {
            message: message.into(),
        }
    }

    /// Create an invalid document error.
    pub fn invalid_document(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::InvalidDocument {
            context: context.into(),
            source,
        }
    }

    /// Create an invalid property error.
    pub fn invalid_property(
        schema: impl Into<String>,
        property: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidProperty {
            schema: schema.into(),
            property: property.into(),
            message: message.into(),
        }
    }

    /// Check whether this error reports a missing schema.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::SchemaNotFound { .. })
    }
}
