//! Schema documents.
//!
//! A [`SchemaDocument`] is the raw, declarative description of an entity as it
//! appears in JSON: ordered properties, required names, named projections,
//! default values and any other JSON-Schema keyword, which is kept verbatim in
//! [`SchemaDocument::extra`] and forwarded to validation.

mod extend;
mod projection;
mod property;

pub use projection::{
    Projection, ProjectionOptions, ProjectionSpec, RelationProjection, VirtualSelection,
};
pub use property::{PropertyDefinition, PropertyType};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{SchemaError, SchemaResult};

/// Top-level kind of a schema document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaKind {
    /// A single entity.
    #[default]
    Object,
    /// A collection of entities.
    Array,
}

/// A raw schema document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaDocument {
    /// Unique identifier, used as the registry key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Whether this document describes an entity or a collection.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<SchemaKind>,

    /// Properties in declaration order.
    pub properties: IndexMap<String, PropertyDefinition>,

    /// Required property names.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,

    /// Named projections.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub projection: IndexMap<String, ProjectionSpec>,

    /// Options used when serializing without explicit options.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_projection_options: Option<ProjectionOptions>,

    /// Literal defaults keyed by property name.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub defaults: IndexMap<String, Value>,

    /// Every other keyword, preserved as-is.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SchemaDocument {
    /// Create an empty object schema with the given id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    /// Parse a schema document from a JSON string.
    pub fn from_json(json: &str) -> SchemaResult<Self> {
        serde_json::from_str(json).map_err(|e| SchemaError::invalid_document("json string", e))
    }

    /// Convert a JSON value into a schema document.
    pub fn from_value(value: Value) -> SchemaResult<Self> {
        let context = value
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or("inline value")
            .to_string();
        serde_json::from_value(value).map_err(|e| SchemaError::invalid_document(context, e))
    }

    /// Add a property.
    pub fn with_property(mut self, name: impl Into<String>, property: PropertyDefinition) -> Self {
        self.properties.insert(name.into(), property);
        self
    }

    /// Mark the document as a collection schema.
    pub fn array(mut self) -> Self {
        self.kind = Some(SchemaKind::Array);
        self
    }

    /// Add a required property name.
    pub fn with_required(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.required.contains(&name) {
            self.required.push(name);
        }
        self
    }

    /// Add a named projection.
    pub fn with_projection(mut self, name: impl Into<String>, spec: ProjectionSpec) -> Self {
        self.projection.insert(name.into(), spec);
        self
    }

    /// Get the declared kind, defaulting to an object.
    pub fn kind(&self) -> SchemaKind {
        self.kind.unwrap_or_default()
    }

    /// Check if the document describes a collection.
    pub fn is_array(&self) -> bool {
        self.kind() == SchemaKind::Array
    }

    /// Get a property by name.
    pub fn property(&self, name: &str) -> Option<&PropertyDefinition> {
        self.properties.get(name)
    }

    /// Check if a property is declared.
    pub fn has_property(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    /// Get the id or an error naming the document.
    pub fn require_id(&self) -> SchemaResult<&str> {
        self.id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| SchemaError::registration("schema document has no `id`"))
    }

    /// Iterate over relation properties in declaration order.
    pub fn relations(&self) -> impl Iterator<Item = (&str, &PropertyDefinition)> {
        self.properties
            .iter()
            .filter(|(_, p)| p.is_relation())
            .map(|(name, p)| (name.as_str(), p))
    }

    /// Convert back into a JSON value.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Merge `patch` into `target` recursively.
///
/// Objects are merged key by key; any other value in the patch replaces the
/// target.
pub(crate) fn deep_merge(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                match target.get_mut(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        target.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (target, patch) => *target = patch.clone(),
    }
}
