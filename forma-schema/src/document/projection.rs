//! Projection specifications and serialization options.
//!
//! A projection shapes the serialized view of an entity: `onlyFields` and
//! `removeFields` act on the current level only, while per-relation entries
//! describe how related entities are shaped one level deeper.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// How a related entity is projected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RelationProjection {
    /// Nested whitelist.
    Fields(Vec<String>),
    /// Named projection of the related type.
    Named(String),
}

/// An inline projection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionSpec {
    /// Whitelist applied at this level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub only_fields: Option<Vec<String>>,

    /// Blacklist applied at this level.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remove_fields: Vec<String>,

    /// Per-relation projections, keyed by relation name.
    #[serde(flatten)]
    pub relations: IndexMap<String, RelationProjection>,
}

impl ProjectionSpec {
    /// Create an empty projection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a projection that keeps only the given fields.
    pub fn only<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            only_fields: Some(fields.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    /// Remove the given fields.
    pub fn remove<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.remove_fields.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Shape a relation with a nested whitelist.
    pub fn relation_fields<I, S>(mut self, relation: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.relations.insert(
            relation.into(),
            RelationProjection::Fields(fields.into_iter().map(Into::into).collect()),
        );
        self
    }

    /// Shape a relation with a named projection of the related type.
    pub fn relation_named(mut self, relation: impl Into<String>, name: impl Into<String>) -> Self {
        self.relations
            .insert(relation.into(), RelationProjection::Named(name.into()));
        self
    }

    /// Get the entry for a relation.
    pub fn relation(&self, name: &str) -> Option<&RelationProjection> {
        self.relations.get(name)
    }

    /// Apply `removeFields`, then `onlyFields`, to a serialized object.
    pub fn apply(&self, object: &mut serde_json::Map<String, serde_json::Value>) {
        for field in &self.remove_fields {
            object.shift_remove(field);
        }
        if let Some(only) = &self.only_fields {
            object.retain(|key, _| only.iter().any(|f| f == key));
        }
    }
}

/// A projection given either by name or inline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Projection {
    /// Named projection, resolved against the entity type's schema.
    Named(String),
    /// Inline projection.
    Inline(ProjectionSpec),
}

impl From<ProjectionSpec> for Projection {
    fn from(spec: ProjectionSpec) -> Self {
        Self::Inline(spec)
    }
}

impl From<&str> for Projection {
    fn from(name: &str) -> Self {
        Self::Named(name.to_string())
    }
}

impl From<String> for Projection {
    fn from(name: String) -> Self {
        Self::Named(name)
    }
}

/// Which virtual properties are serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VirtualSelection {
    /// All (`true`) or none (`false`).
    Flag(bool),
    /// Only the named ones.
    Only(Vec<String>),
}

impl Default for VirtualSelection {
    fn default() -> Self {
        Self::Flag(false)
    }
}

impl VirtualSelection {
    /// Check if a virtual property is selected.
    pub fn includes(&self, name: &str) -> bool {
        match self {
            Self::Flag(all) => *all,
            Self::Only(names) => names.iter().any(|n| n == name),
        }
    }

    /// Check if nothing is selected.
    pub fn is_none(&self) -> bool {
        match self {
            Self::Flag(all) => !all,
            Self::Only(names) => names.is_empty(),
        }
    }
}

/// Options for serializing an entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionOptions {
    /// Projection to apply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projection: Option<Projection>,

    /// Recurse into related entities.
    #[serde(default)]
    pub recursive: bool,

    /// Virtual properties to include.
    #[serde(default)]
    pub include_virtual_properties: VirtualSelection,
}

impl ProjectionOptions {
    /// Create default options (flat, no projection, no virtuals).
    pub fn new() -> Self {
        Self::default()
    }

    /// Create recursive options.
    pub fn recursive() -> Self {
        Self {
            recursive: true,
            ..Self::default()
        }
    }

    /// Set the projection.
    pub fn with_projection(mut self, projection: impl Into<Projection>) -> Self {
        self.projection = Some(projection.into());
        self
    }

    /// Set recursion.
    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Include every virtual property.
    pub fn with_virtuals(mut self) -> Self {
        self.include_virtual_properties = VirtualSelection::Flag(true);
        self
    }

    /// Include only the named virtual properties.
    pub fn with_virtual_fields<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include_virtual_properties =
            VirtualSelection::Only(names.into_iter().map(Into::into).collect());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_parse_spec_with_relations() {
        let spec: ProjectionSpec = serde_json::from_value(json!({
            "onlyFields": ["name", "bar"],
            "removeFields": ["secret"],
            "bar": ["id"],
            "baz": "short"
        }))
        .unwrap();

        assert_eq!(spec.only_fields, Some(vec!["name".into(), "bar".into()]));
        assert_eq!(spec.remove_fields, vec!["secret".to_string()]);
        assert_eq!(
            spec.relation("bar"),
            Some(&RelationProjection::Fields(vec!["id".into()]))
        );
        assert_eq!(
            spec.relation("baz"),
            Some(&RelationProjection::Named("short".into()))
        );
    }

    #[test]
    fn test_parse_options() {
        let options: ProjectionOptions = serde_json::from_value(json!({
            "projection": "short",
            "recursive": true,
            "includeVirtualProperties": ["fullname"]
        }))
        .unwrap();

        assert_eq!(options.projection, Some(Projection::Named("short".into())));
        assert!(options.recursive);
        assert!(options.include_virtual_properties.includes("fullname"));
        assert!(!options.include_virtual_properties.includes("other"));
    }

    #[test]
    fn test_parse_inline_projection() {
        let options: ProjectionOptions =
            serde_json::from_value(json!({"projection": {"onlyFields": ["a"]}})).unwrap();
        assert_eq!(
            options.projection,
            Some(Projection::Inline(ProjectionSpec::only(["a"])))
        );
        assert!(!options.recursive);
        assert!(options.include_virtual_properties.is_none());
    }

    #[test]
    fn test_apply_remove_then_only() {
        let mut object = json!({"a": 1, "b": 2, "c": 3})
            .as_object()
            .cloned()
            .unwrap();
        ProjectionSpec::only(["a", "b"]).remove(["b"]).apply(&mut object);
        assert_eq!(serde_json::Value::Object(object), json!({"a": 1}));
    }

    #[test]
    fn test_virtual_selection_flag() {
        assert!(VirtualSelection::Flag(true).includes("anything"));
        assert!(!VirtualSelection::default().includes("anything"));
    }
}
