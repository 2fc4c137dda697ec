//! Collections of entities.

use forma_schema::ProjectionOptions;
use serde_json::{Map, Value as Json};
use std::fmt;
use std::sync::Arc;

use crate::entity::{Entity, EntityOptions, ParentRef};
use crate::error::{ModelError, ModelResult};
use crate::types::{DEFAULT_TYPE_NAME, EntityType};
use crate::value::{Value, attributes_from_json};

/// A collection type: a name plus the type of its items.
#[derive(Debug)]
pub struct CollectionType {
    name: String,
    item_type: Arc<EntityType>,
    default_projection_options: Option<ProjectionOptions>,
}

impl CollectionType {
    /// Create a collection type.
    pub fn new(name: impl Into<String>, item_type: Arc<EntityType>) -> Self {
        Self {
            name: name.into(),
            item_type,
            default_projection_options: None,
        }
    }

    /// Create a base collection type holding schema-less entities.
    pub fn base(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self::new(name, EntityType::base(DEFAULT_TYPE_NAME)))
    }

    /// Set the default projection options.
    pub fn with_projection_options(mut self, options: ProjectionOptions) -> Self {
        self.default_projection_options = Some(options);
        self
    }

    /// Type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Type of the items.
    pub fn item_type(&self) -> &Arc<EntityType> {
        &self.item_type
    }

    /// Copy this collection type onto another item type.
    pub(crate) fn derive(&self, item_type: Arc<EntityType>) -> Arc<Self> {
        Arc::new(Self {
            name: self.name.clone(),
            item_type,
            default_projection_options: self.default_projection_options.clone(),
        })
    }

    /// Create a collection from JSON objects.
    pub fn create(self: &Arc<Self>, items: Vec<Json>) -> ModelResult<Collection> {
        Collection::new(
            self,
            items.into_iter().map(Value::Json).collect(),
            CollectionOptions::default(),
        )
    }
}

/// Options for creating a collection.
#[derive(Debug, Clone, Default)]
pub struct CollectionOptions {
    /// Relation values and static values of the relation holding the collection.
    pub context: Map<String, Json>,
    /// Options used by `to_json`.
    pub default_projection_options: Option<ProjectionOptions>,
    /// Entity the collection belongs to.
    pub parent: Option<ParentRef>,
    /// Skip self-referencing relations of the items.
    pub no_relations: bool,
}

/// An ordered list of entities.
#[derive(Clone)]
pub struct Collection {
    ty: Arc<CollectionType>,
    items: Vec<Entity>,
    context: Map<String, Json>,
    default_projection_options: Option<ProjectionOptions>,
    parent: Option<ParentRef>,
    no_relations: bool,
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("type", &self.ty.name())
            .field("items", &self.items)
            .field("context", &self.context)
            .finish()
    }
}

impl PartialEq for Collection {
    fn eq(&self, other: &Self) -> bool {
        self.ty.name() == other.ty.name() && self.items == other.items
    }
}

impl Collection {
    /// Create a collection.
    ///
    /// Items may be JSON objects or entities; anything else is rejected.
    pub fn new(
        ty: &Arc<CollectionType>,
        items: Vec<Value>,
        options: CollectionOptions,
    ) -> ModelResult<Self> {
        let mut collection = Self {
            ty: Arc::clone(ty),
            items: Vec::with_capacity(items.len()),
            context: options.context,
            default_projection_options: options.default_projection_options,
            parent: options.parent,
            no_relations: options.no_relations,
        };
        for item in items {
            collection.add(item)?;
        }
        Ok(collection)
    }

    /// The collection's type.
    pub fn collection_type(&self) -> &Arc<CollectionType> {
        &self.ty
    }

    /// Append an item.
    pub fn add(&mut self, item: impl Into<Value>) -> ModelResult<&mut Entity> {
        let entity = match item.into() {
            Value::Entity(entity) => *entity,
            Value::Json(json @ Json::Object(_)) => Entity::new(
                self.ty.item_type(),
                attributes_from_json(json),
                EntityOptions {
                    default_projection_options: None,
                    no_relations: self.no_relations,
                    parent: self.parent.clone(),
                    silent: true,
                },
            )?,
            other => {
                return Err(ModelError::invalid_value(
                    self.ty.name(),
                    format!("collection items must be objects, got {}", other.to_text()),
                ));
            }
        };
        self.items.push(entity);
        let last = self.items.len() - 1;
        Ok(&mut self.items[last])
    }

    /// Get an item by position.
    pub fn at(&self, index: usize) -> Option<&Entity> {
        self.items.get(index)
    }

    /// Get an item by position mutably.
    pub fn at_mut(&mut self, index: usize) -> Option<&mut Entity> {
        self.items.get_mut(index)
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterate over the items.
    pub fn iter(&self) -> std::slice::Iter<'_, Entity> {
        self.items.iter()
    }

    /// Iterate mutably over the items.
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Entity> {
        self.items.iter_mut()
    }

    /// Relation context the collection was created with.
    pub fn context(&self) -> &Map<String, Json> {
        &self.context
    }

    /// Get a single context value.
    pub fn context_value(&self, name: &str) -> Option<&Json> {
        self.context.get(name)
    }

    /// Entity the collection belongs to.
    pub fn parent(&self) -> Option<&ParentRef> {
        self.parent.as_ref()
    }

    /// Options used when serializing without explicit options: the
    /// collection's own, then the type's, then the item schema's.
    pub fn default_projection_options(&self) -> ProjectionOptions {
        self.default_projection_options
            .as_ref()
            .or(self.ty.default_projection_options.as_ref())
            .or_else(|| self.ty.item_type().default_projection_options())
            .cloned()
            .unwrap_or_default()
    }

    /// Serialize every item with the same options.
    ///
    /// Items that are already being serialized become `null`.
    pub fn serialize(&self, options: &ProjectionOptions) -> Json {
        Json::Array(
            self.items
                .iter()
                .map(|item| item.serialize(options).unwrap_or(Json::Null))
                .collect(),
        )
    }

    /// Serialize with the default projection options.
    pub fn to_json(&self) -> Json {
        self.serialize(&self.default_projection_options())
    }
}

impl<'a> IntoIterator for &'a Collection {
    type Item = &'a Entity;
    type IntoIter = std::slice::Iter<'a, Entity>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
