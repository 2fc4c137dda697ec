//! Entities.
//!
//! An [`Entity`] is an attribute store bound to an [`EntityType`]. Every write
//! goes through the same pipeline: virtual setters first, then relation
//! materialization, then per-property conversion, and finally the store,
//! which notifies change listeners once per write.

mod binder;
mod projection;
mod validation;

pub use validation::Violation;

use forma_schema::ProjectionOptions;
use serde_json::Value as Json;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use tracing::trace;

use crate::collection::Collection;
use crate::compiler::CompiledSchema;
use crate::convert::AttributeConverter;
use crate::error::ModelResult;
use crate::store::AttributeStore;
use crate::types::EntityType;
use crate::value::{Attributes, Value, attributes_from_json};

use binder::RelationBinder;

/// Identifies the entity a related entity was materialized from.
#[derive(Debug, Clone, PartialEq)]
pub struct ParentRef {
    /// Type name of the parent.
    pub type_name: String,
    /// Schema id of the parent, if any.
    pub schema_id: Option<String>,
    /// Identity of the parent, if it had one.
    pub id: Option<Json>,
}

/// Options for creating an entity.
#[derive(Debug, Clone, Default)]
pub struct EntityOptions {
    /// Options used by `to_json`.
    pub default_projection_options: Option<ProjectionOptions>,
    /// Skip self-referencing relations.
    pub no_relations: bool,
    /// Entity this one is materialized for.
    pub parent: Option<ParentRef>,
    /// Do not notify listeners.
    pub silent: bool,
}

impl EntityOptions {
    /// Create default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set default projection options.
    pub fn with_projection_options(mut self, options: ProjectionOptions) -> Self {
        self.default_projection_options = Some(options);
        self
    }

    /// Skip self-referencing relations.
    pub fn no_relations(mut self) -> Self {
        self.no_relations = true;
        self
    }

    /// Set the parent.
    pub fn with_parent(mut self, parent: ParentRef) -> Self {
        self.parent = Some(parent);
        self
    }
}

/// Options for a single write.
#[derive(Debug, Clone, Copy, Default)]
pub struct SetOptions {
    /// Do not notify listeners.
    pub silent: bool,
    /// Skip self-referencing relations.
    pub no_relations: bool,
}

impl SetOptions {
    /// Silent write.
    pub fn silent() -> Self {
        Self {
            silent: true,
            no_relations: false,
        }
    }
}

/// A model instance.
pub struct Entity {
    ty: Arc<EntityType>,
    store: AttributeStore,
    default_projection_options: Option<ProjectionOptions>,
    parent: Option<ParentRef>,
    serializing: AtomicBool,
}

impl Clone for Entity {
    fn clone(&self) -> Self {
        Self {
            ty: Arc::clone(&self.ty),
            store: self.store.clone(),
            default_projection_options: self.default_projection_options.clone(),
            parent: self.parent.clone(),
            serializing: AtomicBool::new(false),
        }
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.ty.name() == other.ty.name() && self.store == other.store
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("type", &self.ty.name())
            .field("attributes", self.store.attributes())
            .field("parent", &self.parent)
            .finish()
    }
}

impl Entity {
    /// Create an entity.
    ///
    /// Defaults fill every key the caller left out; defaults are evaluated per
    /// instance, so no two entities share a mutable default.
    pub fn new(
        ty: &Arc<EntityType>,
        attributes: Attributes,
        options: EntityOptions,
    ) -> ModelResult<Self> {
        let mut entity = Self {
            ty: Arc::clone(ty),
            store: AttributeStore::new(),
            default_projection_options: options.default_projection_options,
            parent: options.parent,
            serializing: AtomicBool::new(false),
        };

        let mut attributes = attributes;
        if let Some(schema) = ty.schema() {
            for (name, default) in schema.defaults() {
                if !attributes.contains_key(name) {
                    attributes.insert(name.clone(), default.evaluate());
                }
            }
        }

        entity.set_with(
            attributes,
            SetOptions {
                silent: options.silent,
                no_relations: options.no_relations,
            },
        )?;
        entity.store.clear_changed();
        Ok(entity)
    }

    /// Create an entity from a JSON object.
    pub fn from_json(ty: &Arc<EntityType>, json: Json) -> ModelResult<Self> {
        Self::new(ty, attributes_from_json(json), EntityOptions::default())
    }

    /// The entity's type.
    pub fn entity_type(&self) -> &Arc<EntityType> {
        &self.ty
    }

    /// Compiled schema of the entity's type.
    pub fn schema(&self) -> Option<&Arc<CompiledSchema>> {
        self.ty.schema()
    }

    /// Parent this entity was materialized for.
    pub fn parent(&self) -> Option<&ParentRef> {
        self.parent.as_ref()
    }

    /// Read an attribute or virtual property.
    ///
    /// Virtual properties are computed; relation roles read the relation's
    /// declared attribute.
    pub fn get(&self, name: &str) -> Option<Cow<'_, Value>> {
        if let Some(property) = self.ty.virtual_property(name) {
            return property.get(self).map(Cow::Owned);
        }
        self.attribute(name).map(Cow::Borrowed)
    }

    /// Read a stored attribute, resolving relation roles.
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.store.get(self.canonical_name(name))
    }

    /// Read an attribute as plain JSON.
    pub fn get_json(&self, name: &str) -> Option<Json> {
        self.get(name).map(|v| v.to_json())
    }

    /// Get a materialized to-one relation.
    pub fn related(&self, name: &str) -> Option<&Entity> {
        self.attribute(name).and_then(Value::as_entity)
    }

    /// Get a materialized to-one relation mutably.
    pub fn related_mut(&mut self, name: &str) -> Option<&mut Entity> {
        let key = self.canonical_name(name).to_string();
        self.store.get_mut(&key).and_then(Value::as_entity_mut)
    }

    /// Get a materialized to-many relation.
    pub fn collection(&self, name: &str) -> Option<&Collection> {
        self.attribute(name).and_then(Value::as_collection)
    }

    /// Get a materialized to-many relation mutably.
    pub fn collection_mut(&mut self, name: &str) -> Option<&mut Collection> {
        let key = self.canonical_name(name).to_string();
        self.store.get_mut(&key).and_then(Value::as_collection_mut)
    }

    /// Identity value.
    pub fn id(&self) -> Option<&Value> {
        self.store.get(self.ty.id_attribute())
    }

    /// Check if an attribute is set to a non-null value.
    pub fn has(&self, name: &str) -> bool {
        if self.ty.virtual_property(name).is_some() {
            return self.get(name).is_some_and(|v| !v.is_null());
        }
        self.store.has(self.canonical_name(name))
    }

    /// All stored attributes in insertion order.
    pub fn attributes(&self) -> &Attributes {
        self.store.attributes()
    }

    /// Set a single attribute.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> ModelResult<()> {
        let mut attributes = Attributes::new();
        attributes.insert(name.into(), value.into());
        self.set_with(attributes, SetOptions::default())
    }

    /// Set several attributes at once.
    pub fn set_all(&mut self, attributes: Attributes) -> ModelResult<()> {
        self.set_with(attributes, SetOptions::default())
    }

    /// Set attributes from a JSON object.
    pub fn set_json(&mut self, json: Json) -> ModelResult<()> {
        self.set_all(attributes_from_json(json))
    }

    /// Set attributes with explicit options.
    pub fn set_with(&mut self, mut attributes: Attributes, options: SetOptions) -> ModelResult<()> {
        let ty = Arc::clone(&self.ty);

        let virtual_names: Vec<String> = attributes
            .keys()
            .filter(|name| ty.virtual_property(name).is_some())
            .cloned()
            .collect();
        for name in virtual_names {
            let Some(value) = attributes.shift_remove(&name) else {
                continue;
            };
            match ty.virtual_property(&name).and_then(|p| p.setter()) {
                Some(setter) => setter(self, &name, value, options)?,
                None => trace!(property = %name, "virtual property has no setter, value dropped"),
            }
        }
        if attributes.is_empty() {
            return Ok(());
        }

        if let Some(schema) = ty.schema() {
            attributes = attributes
                .into_iter()
                .map(|(name, value)| (schema.resolve_alias(&name).to_string(), value))
                .collect();
            RelationBinder::new(self, schema, options).bind(&mut attributes)?;
            AttributeConverter::new(schema, ty.conversions()).convert_all(&mut attributes);
        }

        self.store.set(attributes, options.silent);
        Ok(())
    }

    /// Remove an attribute.
    pub fn unset(&mut self, name: &str) -> Option<Value> {
        let key = self.canonical_name(name).to_string();
        self.store.unset(&key, false)
    }

    /// Keys changed by the last write.
    pub fn changed(&self) -> &[String] {
        self.store.changed()
    }

    /// Register a change listener, called with the changed keys of each write.
    pub fn on_change<F>(&mut self, listener: F)
    where
        F: Fn(&[String]) + Send + Sync + 'static,
    {
        self.store.on_change(Arc::new(listener));
    }

    /// Options used when serializing without explicit options.
    pub fn default_projection_options(&self) -> ProjectionOptions {
        self.default_projection_options
            .as_ref()
            .or_else(|| self.ty.default_projection_options())
            .cloned()
            .unwrap_or_default()
    }

    /// Serialize with the default projection options.
    pub fn to_json(&self) -> Json {
        self.serialize(&self.default_projection_options())
            .unwrap_or(Json::Null)
    }

    pub(crate) fn parent_ref(&self, pending: &Attributes) -> ParentRef {
        let id_attribute = self.ty.id_attribute();
        ParentRef {
            type_name: self.ty.name().to_string(),
            schema_id: self.ty.schema_id().map(str::to_string),
            id: pending
                .get(id_attribute)
                .or_else(|| self.store.get(id_attribute))
                .filter(|v| !v.is_null())
                .map(Value::to_json),
        }
    }

    fn canonical_name<'a>(&'a self, name: &'a str) -> &'a str {
        match self.ty.schema() {
            Some(schema) => schema.resolve_alias(name),
            None => name,
        }
    }
}
