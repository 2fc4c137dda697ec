//! Compiled relation definitions.

use indexmap::IndexMap;
use serde_json::{Map, Value as Json};
use std::fmt;
use std::sync::Arc;

use crate::types::TypeHandle;
use crate::value::{Attributes, Value};

/// How many entities a relation holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cardinality {
    /// A single related entity.
    One,
    /// A collection of related entities.
    Many,
}

impl Cardinality {
    /// Check if this relation holds a collection.
    pub fn is_many(&self) -> bool {
        matches!(self, Self::Many)
    }

    /// Check if this relation holds a single entity.
    pub fn is_one(&self) -> bool {
        matches!(self, Self::One)
    }
}

/// Picks the related type from the incoming attribute bag.
pub type TargetFactory = Arc<dyn Fn(&Attributes) -> TypeHandle + Send + Sync>;

/// Where the related type of a relation comes from.
#[derive(Clone)]
pub enum RelationTarget {
    /// A concrete type.
    Fixed(TypeHandle),
    /// A type chosen per instantiation.
    Factory(TargetFactory),
    /// The type the factory builds for a schema id, resolved on first use.
    BySchemaId(String),
    /// The entity's own type (`"$ref": "#"`).
    SelfType,
}

impl fmt::Debug for RelationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(handle) => f.debug_tuple("Fixed").field(&handle.name()).finish(),
            Self::Factory(_) => f.write_str("Factory(..)"),
            Self::BySchemaId(id) => f.debug_tuple("BySchemaId").field(id).finish(),
            Self::SelfType => f.write_str("SelfType"),
        }
    }
}

impl RelationTarget {
    /// Create a target chosen per instantiation.
    pub fn factory<F>(factory: F) -> Self
    where
        F: Fn(&Attributes) -> TypeHandle + Send + Sync + 'static,
    {
        Self::Factory(Arc::new(factory))
    }

    /// Get the referenced schema id, if any.
    pub fn schema_id(&self) -> Option<&str> {
        match self {
            Self::BySchemaId(id) => Some(id),
            _ => None,
        }
    }

    /// Check if the relation targets the entity's own type.
    pub fn is_self(&self) -> bool {
        matches!(self, Self::SelfType)
    }
}

impl From<TypeHandle> for RelationTarget {
    fn from(handle: TypeHandle) -> Self {
        Self::Fixed(handle)
    }
}

/// A relation after compilation. Immutable once built.
#[derive(Debug, Clone)]
pub struct RelationDefinition {
    pub(crate) name: String,
    pub(crate) target: RelationTarget,
    pub(crate) cardinality: Cardinality,
    pub(crate) references: IndexMap<String, String>,
    pub(crate) static_values: Map<String, Json>,
    pub(crate) alias_names: Vec<String>,
    pub(crate) projection: Option<Vec<String>>,
}

impl RelationDefinition {
    /// Declared name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Target type.
    pub fn target(&self) -> &RelationTarget {
        &self.target
    }

    /// Cardinality.
    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    /// Key mapping: related attribute name → own attribute name.
    pub fn references(&self) -> &IndexMap<String, String> {
        &self.references
    }

    /// Attributes applied to every instantiated related entity.
    pub fn static_values(&self) -> &Map<String, Json> {
        &self.static_values
    }

    /// Declared name followed by every role.
    pub fn alias_names(&self) -> &[String] {
        &self.alias_names
    }

    /// Field whitelist for the related entity.
    pub fn projection(&self) -> Option<&[String]> {
        self.projection.as_deref()
    }

    /// Gather the related entity's key attributes from a bag.
    ///
    /// Returns `None` when no referenced attribute is present and non-null.
    pub fn relation_values(&self, bag: &Attributes) -> Option<Attributes> {
        let values: Attributes = self
            .references
            .iter()
            .filter_map(|(target, source)| {
                bag.get(source)
                    .filter(|v| !v.is_null())
                    .map(|v| (target.clone(), v.clone()))
            })
            .collect();
        (!values.is_empty()).then_some(values)
    }

    /// Static values as attributes.
    pub fn static_attributes(&self) -> Attributes {
        self.static_values
            .iter()
            .map(|(k, v)| (k.clone(), Value::Json(v.clone())))
            .collect()
    }
}
