//! Schema factory.
//!
//! The factory owns the schema registry, the compiled-schema cache and the
//! type caches. Compilation is memoized per schema id; an id whose
//! compilation is underway counts as resolved, so self references and cyclic
//! `$ref` graphs terminate.
//!
//! # Examples
//!
//! ```rust
//! use forma_model::SchemaFactory;
//! use forma_schema::SchemaDocument;
//! use serde_json::json;
//!
//! let factory = SchemaFactory::new();
//! factory.register(SchemaDocument::from_value(json!({
//!     "id": "schemas/person",
//!     "properties": {
//!         "id": {"type": "integer"},
//!         "spouse_id": {"type": "integer"},
//!         "spouse": {"$ref": "#", "references": {"id": "spouse_id"}}
//!     }
//! })).unwrap()).unwrap();
//!
//! let person = factory.model_type("schemas/person").unwrap();
//! let ann = person.from_json(json!({"id": 1, "spouse_id": 2})).unwrap();
//! assert_eq!(ann.related("spouse").unwrap().id().unwrap(), &json!(2));
//! ```

use forma_schema::config::ModelConfig;
use forma_schema::{
    FileSchemaSource, FormaConfig, SchemaDocument, SchemaError, SchemaKind, SchemaRegistry,
};
use indexmap::IndexMap;
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use serde_json::{Map, Value as Json};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, trace};

use crate::collection::CollectionType;
use crate::compiler::{CompiledSchema, ReferenceResolver, SchemaCompiler};
use crate::convert::ConversionRegistry;
use crate::error::{ModelError, ModelResult};
use crate::types::{DEFAULT_TYPE_NAME, EntityType, TypeHandle};

/// Statistics for the compiled-schema cache.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Number of schemas currently compiled.
    pub cached_count: usize,
}

impl CacheStats {
    /// Get the cache hit rate.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Factory-wide settings.
#[derive(Debug, Clone)]
pub struct FactoryOptions {
    /// Base entity type for schemas without a registered one.
    pub base_model: Option<Arc<EntityType>>,
    /// Base collection type for schemas without a registered one.
    pub base_collection: Option<Arc<CollectionType>>,
    /// Named conversions available to every schema.
    pub conversions: ConversionRegistry,
    /// Configuration the factory was built from.
    pub config: FormaConfig,
}

impl Default for FactoryOptions {
    fn default() -> Self {
        Self {
            base_model: Some(EntityType::base(DEFAULT_TYPE_NAME)),
            base_collection: Some(CollectionType::base("collection")),
            conversions: ConversionRegistry::new(),
            config: FormaConfig::default(),
        }
    }
}

impl FactoryOptions {
    /// Create default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default base entity type.
    pub fn with_base_model(mut self, base: Arc<EntityType>) -> Self {
        self.base_model = Some(base);
        self
    }

    /// Set the default base collection type.
    pub fn with_base_collection(mut self, base: Arc<CollectionType>) -> Self {
        self.base_collection = Some(base);
        self
    }

    /// Remove the default base types.
    pub fn without_base_types(mut self) -> Self {
        self.base_model = None;
        self.base_collection = None;
        self
    }

    /// Set the named conversions.
    pub fn with_conversions(mut self, conversions: ConversionRegistry) -> Self {
        self.conversions = conversions;
        self
    }
}

/// Base types registered for a schema id.
#[derive(Debug, Clone, Default)]
pub struct BaseTypes {
    /// Base entity type.
    pub model: Option<Arc<EntityType>>,
    /// Base collection type.
    pub collection: Option<Arc<CollectionType>>,
}

impl BaseTypes {
    /// No base types.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the base entity type.
    pub fn model(mut self, model: Arc<EntityType>) -> Self {
        self.model = Some(model);
        self
    }

    /// Set the base collection type.
    pub fn collection(mut self, collection: Arc<CollectionType>) -> Self {
        self.collection = Some(collection);
        self
    }

    fn is_empty(&self) -> bool {
        self.model.is_none() && self.collection.is_none()
    }
}

/// A schema given by id or as a document.
#[derive(Debug, Clone)]
pub enum SchemaRef {
    /// Id of a registered or fetchable schema.
    Id(String),
    /// A document; registered first when it has an id.
    Document(SchemaDocument),
}

impl From<&str> for SchemaRef {
    fn from(id: &str) -> Self {
        Self::Id(id.to_string())
    }
}

impl From<String> for SchemaRef {
    fn from(id: String) -> Self {
        Self::Id(id)
    }
}

impl From<SchemaDocument> for SchemaRef {
    fn from(document: SchemaDocument) -> Self {
        Self::Document(document)
    }
}

enum Slot {
    InProgress,
    Done(Arc<CompiledSchema>),
}

/// Shared state behind a [`SchemaFactory`].
pub struct FactoryState {
    registry: RwLock<SchemaRegistry>,
    compile_lock: ReentrantMutex<()>,
    compiled: Mutex<HashMap<String, Slot>>,
    base_models: RwLock<HashMap<String, Arc<EntityType>>>,
    base_collections: RwLock<HashMap<String, Arc<CollectionType>>>,
    model_types: RwLock<HashMap<String, Arc<EntityType>>>,
    collection_types: RwLock<HashMap<String, Arc<CollectionType>>>,
    stats: RwLock<CacheStats>,
    options: FactoryOptions,
}

impl FactoryState {
    fn base_model_for(&self, id: &str) -> Option<Arc<EntityType>> {
        self.base_models
            .read()
            .get(id)
            .cloned()
            .or_else(|| self.options.base_model.clone())
    }

    fn base_collection_for(&self, id: &str) -> Option<Arc<CollectionType>> {
        self.base_collections
            .read()
            .get(id)
            .cloned()
            .or_else(|| self.options.base_collection.clone())
    }

    fn model_config(&self, base: Option<&EntityType>) -> ModelConfig {
        let mut model = self.options.config.model.clone();
        if let Some(base) = base {
            model.id_attribute = base.id_attribute().to_string();
        }
        model
    }

    fn compile_document(
        &self,
        document: &SchemaDocument,
        base: Option<&EntityType>,
    ) -> ModelResult<CompiledSchema> {
        let model = self.model_config(base);
        let no_overrides = IndexMap::new();
        let overrides = base.map_or(&no_overrides, |b| b.overrides());
        SchemaCompiler::new(self, &model).compile(document, overrides)
    }

    fn compile(&self, id: &str) -> ModelResult<Arc<CompiledSchema>> {
        let _guard = self.compile_lock.lock();

        match self.compiled.lock().get(id) {
            Some(Slot::Done(schema)) => {
                self.stats.write().hits += 1;
                return Ok(Arc::clone(schema));
            }
            Some(Slot::InProgress) => {
                return Err(SchemaError::registration(format!(
                    "schema `{id}` is still being compiled"
                ))
                .into());
            }
            None => {}
        }

        self.stats.write().misses += 1;
        let document = self.registry.write().resolve(id)?;
        self.compiled.lock().insert(id.to_string(), Slot::InProgress);

        let base = self.base_model_for(id);
        match self.compile_document(&document, base.as_deref()) {
            Ok(schema) => {
                let schema = Arc::new(schema);
                let mut compiled = self.compiled.lock();
                compiled.insert(id.to_string(), Slot::Done(Arc::clone(&schema)));
                self.stats.write().cached_count = compiled
                    .values()
                    .filter(|slot| matches!(slot, Slot::Done(_)))
                    .count();
                debug!(schema = %id, "schema compiled and cached");
                Ok(schema)
            }
            Err(err) => {
                self.compiled.lock().remove(id);
                Err(err)
            }
        }
    }

    fn invalidate(&self, id: &str) {
        let removed = self.compiled.lock().remove(id).is_some();
        self.model_types.write().remove(id);
        self.collection_types.write().remove(id);
        if removed {
            let mut stats = self.stats.write();
            stats.cached_count = stats.cached_count.saturating_sub(1);
            trace!(schema = %id, "invalidated compiled schema");
        }
    }
}

impl ReferenceResolver for FactoryState {
    fn ensure_compiled(&self, id: &str) -> ModelResult<()> {
        if self.compiled.lock().contains_key(id) {
            self.stats.write().hits += 1;
            return Ok(());
        }
        self.compile(id).map(|_| ())
    }

    fn referenced_keywords(&self, id: &str) -> Option<Map<String, Json>> {
        self.registry.read().get(id).map(|document| document.extra.clone())
    }
}

/// Registers schemas and builds entity and collection types from them.
#[derive(Clone)]
pub struct SchemaFactory {
    state: Arc<FactoryState>,
}

impl fmt::Debug for SchemaFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaFactory")
            .field("registry", &*self.state.registry.read())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl Default for SchemaFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaFactory {
    /// Create a factory with default options.
    pub fn new() -> Self {
        Self::with_options(FactoryOptions::default())
    }

    /// Create a factory with custom options.
    pub fn with_options(options: FactoryOptions) -> Self {
        Self::with_registry(SchemaRegistry::new(), options)
    }

    /// Create a factory around an existing registry.
    pub fn with_registry(registry: SchemaRegistry, options: FactoryOptions) -> Self {
        Self {
            state: Arc::new(FactoryState {
                registry: RwLock::new(registry),
                compile_lock: ReentrantMutex::new(()),
                compiled: Mutex::new(HashMap::new()),
                base_models: RwLock::new(HashMap::new()),
                base_collections: RwLock::new(HashMap::new()),
                model_types: RwLock::new(HashMap::new()),
                collection_types: RwLock::new(HashMap::new()),
                stats: RwLock::new(CacheStats::default()),
                options,
            }),
        }
    }

    /// Create a factory from configuration.
    ///
    /// Registers every configured schema file and fetches unknown ids from
    /// the configured schema root.
    pub fn from_config(config: FormaConfig) -> ModelResult<Self> {
        let mut registry = SchemaRegistry::new();
        if let Some(root) = &config.schemas.root {
            registry.set_source(Arc::new(FileSchemaSource::new(root)));
        }
        for file in &config.schemas.files {
            registry.load_file(file)?;
        }

        let base_model = EntityType::builder(DEFAULT_TYPE_NAME)
            .id_attribute(config.model.id_attribute.clone())
            .model_config(config.model.clone())
            .build()?;
        info!(
            schemas = registry.len(),
            id_attribute = %config.model.id_attribute,
            "schema factory configured"
        );

        let options = FactoryOptions {
            base_model: Some(base_model),
            config,
            ..FactoryOptions::default()
        };
        Ok(Self::with_registry(registry, options))
    }

    pub(crate) fn from_state(state: Arc<FactoryState>) -> Self {
        Self { state }
    }

    /// Configuration the factory was built from.
    pub fn config(&self) -> &FormaConfig {
        &self.state.options.config
    }

    /// Named conversions available to every schema.
    pub fn conversions(&self) -> &ConversionRegistry {
        &self.state.options.conversions
    }

    /// Register a schema document.
    pub fn register(&self, document: SchemaDocument) -> ModelResult<()> {
        self.register_with(document, BaseTypes::default()).map(|_| ())
    }

    /// Register a schema document with base types for its id.
    ///
    /// Re-registering an id drops its compiled schema and cached types.
    pub fn register_with(&self, document: SchemaDocument, base: BaseTypes) -> ModelResult<String> {
        let document = self.state.registry.write().register(document)?;
        let id = document.require_id()?.to_string();
        self.set_base_types(&id, base);
        self.state.invalidate(&id);
        debug!(schema = %id, "registered schema");
        Ok(id)
    }

    /// Register base types for a schema id.
    pub fn set_base_types(&self, id: &str, base: BaseTypes) {
        if base.is_empty() {
            return;
        }
        if let Some(model) = base.model {
            self.state.base_models.write().insert(id.to_string(), model);
        }
        if let Some(collection) = base.collection {
            self.state
                .base_collections
                .write()
                .insert(id.to_string(), collection);
        }
        self.state.invalidate(id);
    }

    /// Get a registered document.
    pub fn schema(&self, id: &str) -> Option<Arc<SchemaDocument>> {
        self.state.registry.read().get(id)
    }

    /// Check if an id is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.state.registry.read().contains(id)
    }

    /// Registered ids in registration order.
    pub fn ids(&self) -> Vec<String> {
        self.state.registry.read().ids().map(str::to_string).collect()
    }

    /// Build the type for a schema: a collection type for `"type": "array"`
    /// schemas, an entity type otherwise.
    pub fn create(&self, schema: impl Into<SchemaRef>) -> ModelResult<TypeHandle> {
        self.create_with_base(schema, BaseTypes::default())
    }

    /// Build the type for a schema on top of the given base types.
    pub fn create_with_base(
        &self,
        schema: impl Into<SchemaRef>,
        base: BaseTypes,
    ) -> ModelResult<TypeHandle> {
        let id = match schema.into() {
            SchemaRef::Id(id) => {
                self.set_base_types(&id, base);
                id
            }
            SchemaRef::Document(document) if document.id.as_deref().is_some_and(|id| !id.is_empty()) => {
                self.register_with(document, base)?
            }
            SchemaRef::Document(document) => return self.create_anonymous(&document, base),
        };

        let compiled = self.compile(&id)?;
        if compiled.kind() == SchemaKind::Array {
            self.collection_type(&id).map(TypeHandle::Collection)
        } else {
            self.model_type(&id).map(TypeHandle::Model)
        }
    }

    fn create_anonymous(&self, document: &SchemaDocument, base: BaseTypes) -> ModelResult<TypeHandle> {
        let base_model = base
            .model
            .or_else(|| self.state.options.base_model.clone())
            .ok_or_else(|| ModelError::no_base_model("<anonymous>"))?;
        let compiled = self.state.compile_document(document, Some(&base_model))?;
        let item = base_model.derive(
            Arc::new(compiled),
            &self.state.options.conversions,
            Arc::downgrade(&self.state),
        );
        if document.is_array() {
            let base_collection = base
                .collection
                .or_else(|| self.state.options.base_collection.clone())
                .ok_or_else(|| ModelError::no_base_collection("<anonymous>"))?;
            Ok(TypeHandle::Collection(base_collection.derive(item)))
        } else {
            Ok(TypeHandle::Model(item))
        }
    }

    /// Compile a schema, or return the cached compilation.
    pub fn compile(&self, id: &str) -> ModelResult<Arc<CompiledSchema>> {
        self.state.compile(id)
    }

    /// Entity type for a schema id.
    pub fn model_type(&self, id: &str) -> ModelResult<Arc<EntityType>> {
        if let Some(ty) = self.state.model_types.read().get(id) {
            return Ok(Arc::clone(ty));
        }
        let base = self
            .state
            .base_model_for(id)
            .ok_or_else(|| ModelError::no_base_model(id))?;
        let compiled = self.compile(id)?;
        let ty = base.derive(
            compiled,
            &self.state.options.conversions,
            Arc::downgrade(&self.state),
        );
        self.state
            .model_types
            .write()
            .insert(id.to_string(), Arc::clone(&ty));
        trace!(schema = %id, base = %base.name(), "created entity type");
        Ok(ty)
    }

    /// Collection type for a schema id.
    pub fn collection_type(&self, id: &str) -> ModelResult<Arc<CollectionType>> {
        if let Some(ty) = self.state.collection_types.read().get(id) {
            return Ok(Arc::clone(ty));
        }
        let base = self
            .state
            .base_collection_for(id)
            .ok_or_else(|| ModelError::no_base_collection(id))?;
        let item = self.model_type(id)?;
        let ty = base.derive(item);
        self.state
            .collection_types
            .write()
            .insert(id.to_string(), Arc::clone(&ty));
        trace!(schema = %id, base = %base.name(), "created collection type");
        Ok(ty)
    }

    /// Drop every compiled schema and cached type. Registrations are kept.
    pub fn clear_cache(&self) {
        self.state.compiled.lock().clear();
        self.state.model_types.write().clear();
        self.state.collection_types.write().clear();
        self.state.stats.write().cached_count = 0;
        debug!("schema factory cache cleared");
    }

    /// Compiled-schema cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.state.stats.read().clone()
    }
}
