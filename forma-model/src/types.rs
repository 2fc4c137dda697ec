//! Entity types.
//!
//! An [`EntityType`] pairs a compiled schema with the behaviour layered over it:
//! property overrides, virtual properties, conversions and a custom validation
//! hook. Types without a schema serve as base types the factory derives
//! schema-bound types from.

use forma_schema::config::ModelConfig;
use forma_schema::{ProjectionOptions, SchemaDocument};
use indexmap::IndexMap;
use serde_json::{Map, Value as Json};
use std::fmt;
use std::sync::{Arc, Weak};

use crate::collection::CollectionType;
use crate::compiler::{
    Cardinality, CompiledSchema, NoReferences, PropertyOverride, RelationTarget, SchemaCompiler,
};
use crate::convert::ConversionRegistry;
use crate::entity::{Entity, EntityOptions, SetOptions, Violation};
use crate::error::ModelResult;
use crate::factory::{FactoryState, SchemaFactory};
use crate::value::{Attributes, Value, attributes_from_json};

/// Name given to types created without one.
pub const DEFAULT_TYPE_NAME: &str = "model";

/// Computes a virtual property.
pub type VirtualGetter = Arc<dyn Fn(&Entity) -> Option<Value> + Send + Sync>;

/// Writes a virtual property through to real attributes. Receives the
/// property name and the options of the write that reached it.
pub type VirtualSetter =
    Arc<dyn Fn(&mut Entity, &str, Value, SetOptions) -> ModelResult<()> + Send + Sync>;

/// Extra validation run next to JSON-Schema validation.
pub type ValidationHook = Arc<dyn Fn(&Entity, &Map<String, Json>) -> Vec<Violation> + Send + Sync>;

/// A derived attribute computed on read.
#[derive(Clone)]
pub struct VirtualProperty {
    get: VirtualGetter,
    set: Option<VirtualSetter>,
}

impl fmt::Debug for VirtualProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualProperty")
            .field("has_setter", &self.set.is_some())
            .finish()
    }
}

impl VirtualProperty {
    /// Create a read-only virtual property.
    pub fn getter<F>(get: F) -> Self
    where
        F: Fn(&Entity) -> Option<Value> + Send + Sync + 'static,
    {
        Self {
            get: Arc::new(get),
            set: None,
        }
    }

    /// Add a setter.
    pub fn with_setter<F>(mut self, set: F) -> Self
    where
        F: Fn(&mut Entity, &str, Value, SetOptions) -> ModelResult<()> + Send + Sync + 'static,
    {
        self.set = Some(Arc::new(set));
        self
    }

    /// Compute the value for an entity.
    pub fn get(&self, entity: &Entity) -> Option<Value> {
        (self.get)(entity)
    }

    /// Get the setter, if any.
    pub fn setter(&self) -> Option<&VirtualSetter> {
        self.set.as_ref()
    }
}

/// A model type.
pub struct EntityType {
    pub(crate) name: String,
    pub(crate) id_attribute: String,
    pub(crate) schema: Option<Arc<CompiledSchema>>,
    pub(crate) overrides: IndexMap<String, PropertyOverride>,
    pub(crate) virtuals: IndexMap<String, VirtualProperty>,
    pub(crate) custom_validation: Option<ValidationHook>,
    pub(crate) conversions: ConversionRegistry,
    pub(crate) default_projection_options: Option<ProjectionOptions>,
    pub(crate) factory: Option<Weak<FactoryState>>,
}

impl fmt::Debug for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityType")
            .field("name", &self.name)
            .field("id_attribute", &self.id_attribute)
            .field("schema", &self.schema_id())
            .field("overrides", &self.overrides.keys().collect::<Vec<_>>())
            .field("virtuals", &self.virtuals.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl EntityType {
    /// Start building a type.
    pub fn builder(name: impl Into<String>) -> EntityTypeBuilder {
        EntityTypeBuilder::new(name)
    }

    /// Create a schema-less base type.
    pub fn base(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            id_attribute: ModelConfig::default().id_attribute,
            schema: None,
            overrides: IndexMap::new(),
            virtuals: IndexMap::new(),
            custom_validation: None,
            conversions: ConversionRegistry::new(),
            default_projection_options: None,
            factory: None,
        })
    }

    /// Type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Identity attribute.
    pub fn id_attribute(&self) -> &str {
        &self.id_attribute
    }

    /// Compiled schema, if any.
    pub fn schema(&self) -> Option<&Arc<CompiledSchema>> {
        self.schema.as_ref()
    }

    /// Id of the compiled schema.
    pub fn schema_id(&self) -> Option<&str> {
        self.schema.as_ref().and_then(|s| s.id())
    }

    /// Property overrides layered over the schema.
    pub fn overrides(&self) -> &IndexMap<String, PropertyOverride> {
        &self.overrides
    }

    /// Virtual properties in declaration order.
    pub fn virtuals(&self) -> &IndexMap<String, VirtualProperty> {
        &self.virtuals
    }

    /// Get a virtual property.
    pub fn virtual_property(&self, name: &str) -> Option<&VirtualProperty> {
        self.virtuals.get(name)
    }

    /// Named conversions available to the schema.
    pub fn conversions(&self) -> &ConversionRegistry {
        &self.conversions
    }

    /// Custom validation hook.
    pub fn custom_validation(&self) -> Option<&ValidationHook> {
        self.custom_validation.as_ref()
    }

    /// Default projection options of the type, falling back to the schema's.
    pub fn default_projection_options(&self) -> Option<&ProjectionOptions> {
        self.default_projection_options
            .as_ref()
            .or_else(|| self.schema.as_ref().and_then(|s| s.default_projection_options()))
    }

    /// The factory this type was built by, while it is alive.
    pub fn factory(&self) -> Option<SchemaFactory> {
        self.factory
            .as_ref()
            .and_then(Weak::upgrade)
            .map(SchemaFactory::from_state)
    }

    /// Create an entity with default options.
    pub fn create(self: &Arc<Self>, attributes: Attributes) -> ModelResult<Entity> {
        Entity::new(self, attributes, EntityOptions::default())
    }

    /// Create an entity from a JSON object.
    pub fn from_json(self: &Arc<Self>, json: Json) -> ModelResult<Entity> {
        self.create(attributes_from_json(json))
    }

    /// Copy this type's behaviour onto a compiled schema.
    pub(crate) fn derive(
        &self,
        schema: Arc<CompiledSchema>,
        conversions: &ConversionRegistry,
        factory: Weak<FactoryState>,
    ) -> Arc<Self> {
        let mut merged = conversions.clone();
        merged.merge(&self.conversions);
        Arc::new(Self {
            name: self.name.clone(),
            id_attribute: self.id_attribute.clone(),
            schema: Some(schema),
            overrides: self.overrides.clone(),
            virtuals: self.virtuals.clone(),
            custom_validation: self.custom_validation.clone(),
            conversions: merged,
            default_projection_options: self.default_projection_options.clone(),
            factory: Some(factory),
        })
    }
}

/// Builder for [`EntityType`].
pub struct EntityTypeBuilder {
    name: String,
    id_attribute: Option<String>,
    schema: Option<SchemaDocument>,
    overrides: IndexMap<String, PropertyOverride>,
    virtuals: IndexMap<String, VirtualProperty>,
    custom_validation: Option<ValidationHook>,
    conversions: ConversionRegistry,
    default_projection_options: Option<ProjectionOptions>,
    model_config: ModelConfig,
}

impl EntityTypeBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id_attribute: None,
            schema: None,
            overrides: IndexMap::new(),
            virtuals: IndexMap::new(),
            custom_validation: None,
            conversions: ConversionRegistry::new(),
            default_projection_options: None,
            model_config: ModelConfig::default(),
        }
    }

    /// Set the identity attribute.
    pub fn id_attribute(mut self, id_attribute: impl Into<String>) -> Self {
        self.id_attribute = Some(id_attribute.into());
        self
    }

    /// Attach a schema document, compiled on `build`.
    pub fn schema(mut self, schema: SchemaDocument) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Use model defaults (identity attribute, foreign key suffix) from configuration.
    pub fn model_config(mut self, config: ModelConfig) -> Self {
        self.model_config = config;
        self
    }

    /// Layer an override over a property.
    pub fn override_property(mut self, name: impl Into<String>, over: PropertyOverride) -> Self {
        match self.overrides.entry(name.into()) {
            indexmap::map::Entry::Occupied(mut entry) => entry.get_mut().merge(&over),
            indexmap::map::Entry::Vacant(entry) => {
                entry.insert(over);
            }
        }
        self
    }

    /// Set the target of a relation property.
    pub fn relation_target(self, name: impl Into<String>, target: impl Into<RelationTarget>) -> Self {
        self.override_property(name, PropertyOverride::new().target(target))
    }

    /// Set an explicit converter for a property.
    pub fn convert<F>(self, name: impl Into<String>, convert: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.override_property(name, PropertyOverride::new().convert(convert))
    }

    /// Set a default provider for a property.
    pub fn default_with<F>(self, name: impl Into<String>, provider: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.override_property(name, PropertyOverride::new().default_with(provider))
    }

    /// Add a virtual property.
    pub fn virtual_property(mut self, name: impl Into<String>, property: VirtualProperty) -> Self {
        self.virtuals.insert(name.into(), property);
        self
    }

    /// Add a read-only virtual property.
    pub fn getter<F>(self, name: impl Into<String>, get: F) -> Self
    where
        F: Fn(&Entity) -> Option<Value> + Send + Sync + 'static,
    {
        self.virtual_property(name, VirtualProperty::getter(get))
    }

    /// Set the custom validation hook.
    pub fn custom_validation<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Entity, &Map<String, Json>) -> Vec<Violation> + Send + Sync + 'static,
    {
        self.custom_validation = Some(Arc::new(hook));
        self
    }

    /// Add a named conversion.
    pub fn conversion<F>(mut self, name: impl Into<String>, conversion: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.conversions.register(name, conversion);
        self
    }

    /// Set the default projection options.
    pub fn default_projection_options(mut self, options: ProjectionOptions) -> Self {
        self.default_projection_options = Some(options);
        self
    }

    /// Build the type, compiling the schema if one was given.
    ///
    /// Types built here are not owned by a factory, so `$ref` links to other
    /// schema ids fail with `SchemaNotFound`; use relation targets instead.
    pub fn build(mut self) -> ModelResult<Arc<EntityType>> {
        if let Some(id_attribute) = &self.id_attribute {
            self.model_config.id_attribute.clone_from(id_attribute);
        }

        let schema = match &self.schema {
            Some(document) => Some(Arc::new(
                SchemaCompiler::new(&NoReferences, &self.model_config)
                    .compile(document, &self.overrides)?,
            )),
            None => None,
        };

        Ok(Arc::new(EntityType {
            name: self.name,
            id_attribute: self.model_config.id_attribute,
            schema,
            overrides: self.overrides,
            virtuals: self.virtuals,
            custom_validation: self.custom_validation,
            conversions: self.conversions,
            default_projection_options: self.default_projection_options,
            factory: None,
        }))
    }
}

/// A model or collection type.
#[derive(Debug, Clone)]
pub enum TypeHandle {
    /// Entity type.
    Model(Arc<EntityType>),
    /// Collection type.
    Collection(Arc<CollectionType>),
}

impl TypeHandle {
    /// Type name.
    pub fn name(&self) -> &str {
        match self {
            Self::Model(ty) => ty.name(),
            Self::Collection(ty) => ty.name(),
        }
    }

    /// Cardinality of relations targeting this type.
    pub fn cardinality(&self) -> Cardinality {
        match self {
            Self::Model(_) => Cardinality::One,
            Self::Collection(_) => Cardinality::Many,
        }
    }

    /// The entity type, or the collection's item type.
    pub fn item_type(&self) -> &Arc<EntityType> {
        match self {
            Self::Model(ty) => ty,
            Self::Collection(ty) => ty.item_type(),
        }
    }

    /// Get the entity type.
    pub fn as_model(&self) -> Option<&Arc<EntityType>> {
        match self {
            Self::Model(ty) => Some(ty),
            Self::Collection(_) => None,
        }
    }

    /// Get the collection type.
    pub fn as_collection(&self) -> Option<&Arc<CollectionType>> {
        match self {
            Self::Model(_) => None,
            Self::Collection(ty) => Some(ty),
        }
    }

    /// Convert into the entity type.
    pub fn into_model(self) -> Option<Arc<EntityType>> {
        match self {
            Self::Model(ty) => Some(ty),
            Self::Collection(_) => None,
        }
    }

    /// Convert into the collection type.
    pub fn into_collection(self) -> Option<Arc<CollectionType>> {
        match self {
            Self::Model(_) => None,
            Self::Collection(ty) => Some(ty),
        }
    }

    /// Check if this is a collection type.
    pub fn is_collection(&self) -> bool {
        matches!(self, Self::Collection(_))
    }
}

impl From<Arc<EntityType>> for TypeHandle {
    fn from(ty: Arc<EntityType>) -> Self {
        Self::Model(ty)
    }
}

impl From<Arc<CollectionType>> for TypeHandle {
    fn from(ty: Arc<CollectionType>) -> Self {
        Self::Collection(ty)
    }
}

impl From<Arc<EntityType>> for RelationTarget {
    fn from(ty: Arc<EntityType>) -> Self {
        Self::Fixed(TypeHandle::Model(ty))
    }
}

impl From<Arc<CollectionType>> for RelationTarget {
    fn from(ty: Arc<CollectionType>) -> Self {
        Self::Fixed(TypeHandle::Collection(ty))
    }
}
