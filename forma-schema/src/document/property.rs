//! Property definitions inside a schema document.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::deep_merge;

/// The declared type of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    /// Floating point or integral number.
    Number,
    /// Integral number.
    Integer,
    /// Boolean flag.
    Boolean,
    /// Point in time.
    Date,
    /// Plain string.
    String,
    /// String that is HTML-sanitized on assignment.
    SanitizedString,
    /// Relation to another entity or collection.
    Relation,
    /// Nested object (to-one when used with `$ref`).
    Object,
    /// Nested array (to-many when used with `$ref`).
    Array,
    /// JSON null.
    Null,
    /// Any type this layer does not interpret.
    #[serde(other)]
    Other,
}

impl PropertyType {
    /// Get the type name as used in schema documents.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::String => "string",
            Self::SanitizedString => "sanitized_string",
            Self::Relation => "relation",
            Self::Object => "object",
            Self::Array => "array",
            Self::Null => "null",
            Self::Other => "other",
        }
    }

    /// Check if this is a numeric type.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Number | Self::Integer)
    }
}

impl std::fmt::Display for PropertyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single property of a schema document.
///
/// Every key is optional so the same type doubles as an override patch:
/// a patch that only sets `required` keeps the base property's `type`.
/// Keywords this layer does not interpret are kept in `extra` and forwarded
/// to validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDefinition {
    /// Declared type.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub property_type: Option<PropertyType>,

    /// Reference to another schema id, or `#` for the root schema.
    #[serde(default, rename = "$ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,

    /// Relation key mapping (other side's attribute → this side's attribute).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references: Option<IndexMap<String, String>>,

    /// Extra names the relation is addressed by.
    #[serde(
        default,
        deserialize_with = "one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub roles: Vec<String>,

    /// Static attributes applied to every instantiated related entity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Map<String, Value>>,

    /// Field whitelist for the related entity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projection: Option<Vec<String>>,

    /// Literal default value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    /// Per-property required flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,

    /// Sanitize the value when serializing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sanitize: Option<bool>,

    /// Name of a conversion function from the factory's registry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversion: Option<String>,

    /// Computed property that is never stored or serialized by default.
    #[serde(default, rename = "virtual", skip_serializing_if = "Option::is_none")]
    pub is_virtual: Option<bool>,

    /// Uninterpreted JSON-Schema keywords.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PropertyDefinition {
    /// Create a property of the given type.
    pub fn new(property_type: PropertyType) -> Self {
        Self {
            property_type: Some(property_type),
            ..Self::default()
        }
    }

    /// Create a relation property referencing another schema.
    pub fn reference(reference: impl Into<String>) -> Self {
        Self {
            property_type: Some(PropertyType::Relation),
            reference: Some(reference.into()),
            ..Self::default()
        }
    }

    /// Set the relation key mapping.
    pub fn with_references<K, V>(mut self, references: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.references = Some(
            references
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    /// Add a role name.
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }

    /// Set the literal default.
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Mark the property as required.
    pub fn required(mut self) -> Self {
        self.required = Some(true);
        self
    }

    /// Mark the property as virtual.
    pub fn virtual_property(mut self) -> Self {
        self.is_virtual = Some(true);
        self
    }

    /// Check if this property declares a relation.
    pub fn is_relation(&self) -> bool {
        self.property_type == Some(PropertyType::Relation) || self.reference.is_some()
    }

    /// Check if the property carries `required: true`.
    pub fn is_required(&self) -> bool {
        self.required.unwrap_or(false)
    }

    /// Check if the property is virtual.
    pub fn is_virtual(&self) -> bool {
        self.is_virtual.unwrap_or(false)
    }

    /// Check if the value is sanitized on serialization.
    pub fn is_sanitized(&self) -> bool {
        self.sanitize.unwrap_or(false)
    }

    /// Apply a patch on top of this property.
    ///
    /// Keys present in the patch replace the current ones; `extra` keywords
    /// are merged recursively.
    pub fn merge(&mut self, patch: &PropertyDefinition) {
        if patch.property_type.is_some() {
            self.property_type = patch.property_type;
        }
        if patch.reference.is_some() {
            self.reference.clone_from(&patch.reference);
        }
        if patch.references.is_some() {
            self.references.clone_from(&patch.references);
        }
        if !patch.roles.is_empty() {
            self.roles.clone_from(&patch.roles);
        }
        if patch.values.is_some() {
            self.values.clone_from(&patch.values);
        }
        if patch.projection.is_some() {
            self.projection.clone_from(&patch.projection);
        }
        if patch.default.is_some() {
            self.default.clone_from(&patch.default);
        }
        if patch.required.is_some() {
            self.required = patch.required;
        }
        if patch.sanitize.is_some() {
            self.sanitize = patch.sanitize;
        }
        if patch.conversion.is_some() {
            self.conversion.clone_from(&patch.conversion);
        }
        if patch.is_virtual.is_some() {
            self.is_virtual = patch.is_virtual;
        }
        for (key, value) in &patch.extra {
            match self.extra.get_mut(key) {
                Some(existing) => deep_merge(existing, value),
                None => {
                    self.extra.insert(key.clone(), value.clone());
                }
            }
        }
    }

    /// Return a copy with the patch applied.
    pub fn merged(&self, patch: &PropertyDefinition) -> Self {
        let mut merged = self.clone();
        merged.merge(patch);
        merged
    }
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(role) => vec![role],
        OneOrMany::Many(roles) => roles,
    })
}
