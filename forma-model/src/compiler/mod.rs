//! Schema compilation.
//!
//! Turns a raw [`SchemaDocument`] into a [`CompiledSchema`]: `$ref` links are
//! resolved into relation definitions, type overrides are merged, references
//! are derived where the document leaves them out, and required names and
//! default providers are collected. Properties are processed in declaration
//! order.

mod defaults;
mod relation;

pub use defaults::{DefaultProvider, DefaultValue, PropertyOverride};
pub use relation::{Cardinality, RelationDefinition, RelationTarget, TargetFactory};

use forma_schema::config::ModelConfig;
use forma_schema::{
    ProjectionOptions, ProjectionSpec, PropertyDefinition, PropertyType, SchemaDocument,
    SchemaError, SchemaKind,
};
use indexmap::IndexMap;
use serde_json::{Map, Value as Json};
use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;
use tracing::{debug, trace};

use crate::convert::Converter;
use crate::error::ModelResult;
use crate::value::Attributes;

/// A schema after compilation, shared by every entity of a type.
pub struct CompiledSchema {
    pub(crate) id: Option<String>,
    pub(crate) kind: SchemaKind,
    pub(crate) properties: IndexMap<String, PropertyDefinition>,
    pub(crate) relations: IndexMap<String, RelationDefinition>,
    pub(crate) aliases: HashMap<String, String>,
    pub(crate) required: Vec<String>,
    pub(crate) defaults: IndexMap<String, DefaultValue>,
    pub(crate) converters: IndexMap<String, Converter>,
    pub(crate) projections: IndexMap<String, ProjectionSpec>,
    pub(crate) default_projection_options: Option<ProjectionOptions>,
    pub(crate) extra: Map<String, Json>,
    pub(crate) validator: OnceLock<Result<jsonschema::Validator, String>>,
}

impl fmt::Debug for CompiledSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledSchema")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("properties", &self.properties.keys().collect::<Vec<_>>())
            .field("relations", &self.relations)
            .field("required", &self.required)
            .field("defaults", &self.defaults)
            .finish_non_exhaustive()
    }
}

impl CompiledSchema {
    fn empty(document: &SchemaDocument) -> Self {
        Self {
            id: document.id.clone(),
            kind: document.kind(),
            properties: IndexMap::with_capacity(document.properties.len()),
            relations: IndexMap::new(),
            aliases: HashMap::new(),
            required: Vec::new(),
            defaults: IndexMap::new(),
            converters: IndexMap::new(),
            projections: document.projection.clone(),
            default_projection_options: document.default_projection_options.clone(),
            extra: document.extra.clone(),
            validator: OnceLock::new(),
        }
    }

    /// Schema id.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Declared kind.
    pub fn kind(&self) -> SchemaKind {
        self.kind
    }

    /// Properties after override merging, in declaration order.
    pub fn properties(&self) -> &IndexMap<String, PropertyDefinition> {
        &self.properties
    }

    /// Get a property.
    pub fn property(&self, name: &str) -> Option<&PropertyDefinition> {
        self.properties.get(name)
    }

    /// Check if a property is declared.
    pub fn has_property(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    /// Check if a property is virtual.
    pub fn is_virtual(&self, name: &str) -> bool {
        self.properties.get(name).is_some_and(|p| p.is_virtual())
    }

    /// Relations keyed by declared name.
    pub fn relations(&self) -> &IndexMap<String, RelationDefinition> {
        &self.relations
    }

    /// Get a relation by declared name or role.
    pub fn relation(&self, name: &str) -> Option<&RelationDefinition> {
        self.relations.get(self.resolve_alias(name))
    }

    /// Map a role to the relation's declared name. Other names map to themselves.
    pub fn resolve_alias<'a>(&'a self, name: &'a str) -> &'a str {
        self.aliases.get(name).map(String::as_str).unwrap_or(name)
    }

    /// Required names, de-duplicated, in order of appearance.
    pub fn required(&self) -> &[String] {
        &self.required
    }

    /// Check if a property is required.
    pub fn is_required(&self, name: &str) -> bool {
        self.required.iter().any(|r| r == name)
    }

    /// Default definitions.
    pub fn defaults(&self) -> &IndexMap<String, DefaultValue> {
        &self.defaults
    }

    /// Evaluate every default for a new instance.
    pub fn default_values(&self) -> Attributes {
        self.defaults
            .iter()
            .map(|(name, default)| (name.clone(), default.evaluate()))
            .collect()
    }

    /// Explicit converter of a property.
    pub fn converter(&self, name: &str) -> Option<&Converter> {
        self.converters.get(name)
    }

    /// Get a named projection.
    pub fn projection(&self, name: &str) -> Option<&ProjectionSpec> {
        self.projections.get(name)
    }

    /// Named projections.
    pub fn projections(&self) -> &IndexMap<String, ProjectionSpec> {
        &self.projections
    }

    /// Options used when serializing without explicit options.
    pub fn default_projection_options(&self) -> Option<&ProjectionOptions> {
        self.default_projection_options.as_ref()
    }

    /// Keywords forwarded to validation.
    pub fn extra(&self) -> &Map<String, Json> {
        &self.extra
    }
}

/// Resolves `$ref` targets during compilation.
pub trait ReferenceResolver {
    /// Make sure the referenced schema exists and is compiled.
    ///
    /// A schema that is currently being compiled counts as resolved.
    fn ensure_compiled(&self, id: &str) -> ModelResult<()>;

    /// Schema-level keywords of a referenced document, inherited by the
    /// relation property that points at it.
    fn referenced_keywords(&self, _id: &str) -> Option<Map<String, Json>> {
        None
    }
}

/// Document keywords a relation property never inherits. Object-shape
/// keywords stay with the target type, which validates its own attributes.
const NOT_INHERITED: &[&str] = &[
    "$schema",
    "$id",
    "id",
    "additionalProperties",
    "patternProperties",
    "propertyNames",
    "minProperties",
    "maxProperties",
    "dependencies",
];

/// Resolver for types built outside a factory: every id is unknown.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReferences;

impl ReferenceResolver for NoReferences {
    fn ensure_compiled(&self, id: &str) -> ModelResult<()> {
        Err(SchemaError::not_found(id).into())
    }
}

/// Compiles schema documents.
pub struct SchemaCompiler<'a> {
    resolver: &'a dyn ReferenceResolver,
    model: &'a ModelConfig,
}

impl<'a> SchemaCompiler<'a> {
    /// Create a compiler.
    pub fn new(resolver: &'a dyn ReferenceResolver, model: &'a ModelConfig) -> Self {
        Self { resolver, model }
    }

    /// Compile a document with the given property overrides.
    pub fn compile(
        &self,
        document: &SchemaDocument,
        overrides: &IndexMap<String, PropertyOverride>,
    ) -> ModelResult<CompiledSchema> {
        debug!(schema = ?document.id, "compiling schema");
        let mut compiled = CompiledSchema::empty(document);

        for name in &document.required {
            push_unique(&mut compiled.required, name);
        }
        for (name, value) in &document.defaults {
            compiled
                .defaults
                .insert(name.clone(), DefaultValue::Literal(value.clone()));
        }

        let extra_names = overrides
            .keys()
            .filter(|name| !document.properties.contains_key(*name));

        for name in document.properties.keys().chain(extra_names) {
            let property = document.properties.get(name).cloned().unwrap_or_default();
            self.compile_property(&mut compiled, document, name, property, overrides.get(name))?;
        }

        trace!(
            schema = ?compiled.id,
            relations = compiled.relations.len(),
            required = compiled.required.len(),
            "compiled schema"
        );
        Ok(compiled)
    }

    fn compile_property(
        &self,
        compiled: &mut CompiledSchema,
        document: &SchemaDocument,
        name: &str,
        mut property: PropertyDefinition,
        property_override: Option<&PropertyOverride>,
    ) -> ModelResult<()> {
        let mut target = None;
        let mut default = None;

        if let Some(over) = property_override {
            if let Some(patch) = &over.patch {
                property.merge(patch);
            }
            if let Some(convert) = &over.convert {
                compiled.converters.insert(name.to_string(), convert.clone());
            }
            target.clone_from(&over.target);
            default.clone_from(&over.default);
        }

        if target.is_none() {
            target = self.resolve_reference(document, name, &property)?;
        }
        self.inherit_keywords(document, &mut property);

        if let Some(target) = target {
            let relation = self.build_relation(document, name, &property, target);
            for alias in relation.alias_names.iter().skip(1) {
                compiled.aliases.insert(alias.clone(), name.to_string());
            }
            compiled.relations.insert(name.to_string(), relation);
        } else if property.property_type == Some(PropertyType::Relation) {
            debug!(schema = ?document.id, property = %name, "relation without target, kept as plain property");
        }

        if property.is_required() {
            push_unique(&mut compiled.required, name);
        }

        let default = default.or_else(|| {
            property.default.as_ref().map(|value| {
                if property.property_type == Some(PropertyType::Date) && value == "now" {
                    DefaultValue::Now
                } else {
                    DefaultValue::Literal(value.clone())
                }
            })
        });
        if let Some(default) = default {
            compiled.defaults.insert(name.to_string(), default);
        }

        compiled.properties.insert(name.to_string(), property);
        Ok(())
    }

    fn resolve_reference(
        &self,
        document: &SchemaDocument,
        name: &str,
        property: &PropertyDefinition,
    ) -> ModelResult<Option<RelationTarget>> {
        let Some(reference) = property.reference.as_deref() else {
            return Ok(None);
        };
        match reference {
            "" => Err(SchemaError::invalid_property(
                document.id.as_deref().unwrap_or_default(),
                name,
                "empty `$ref`",
            )
            .into()),
            "#" => Ok(Some(RelationTarget::SelfType)),
            id => {
                self.resolver.ensure_compiled(id)?;
                Ok(Some(RelationTarget::BySchemaId(id.to_string())))
            }
        }
    }

    /// Merge the referenced document's keywords under the property's own.
    /// Structural containers (`properties`, `required`, `projection`, ...)
    /// are typed fields of the document and never reach the property.
    fn inherit_keywords(&self, document: &SchemaDocument, property: &mut PropertyDefinition) {
        let inherited = match property.reference.as_deref() {
            None | Some("") => return,
            Some("#") => Some(document.extra.clone()),
            Some(id) => self.resolver.referenced_keywords(id),
        };
        for (key, value) in inherited.unwrap_or_default() {
            if !NOT_INHERITED.contains(&key.as_str()) {
                property.extra.entry(key).or_insert(value);
            }
        }
    }

    fn build_relation(
        &self,
        document: &SchemaDocument,
        name: &str,
        property: &PropertyDefinition,
        target: RelationTarget,
    ) -> RelationDefinition {
        let cardinality = match &target {
            RelationTarget::Fixed(handle) => handle.cardinality(),
            _ if property.property_type == Some(PropertyType::Array) => Cardinality::Many,
            _ => Cardinality::One,
        };

        let references = property
            .references
            .clone()
            .or_else(|| self.derive_references(document, name, &target))
            .unwrap_or_default();

        let mut alias_names = vec![name.to_string()];
        for role in &property.roles {
            push_unique(&mut alias_names, role);
        }

        RelationDefinition {
            name: name.to_string(),
            target,
            cardinality,
            references,
            static_values: property.values.clone().unwrap_or_default(),
            alias_names,
            projection: property.projection.clone(),
        }
    }

    /// `{identity: "<type>_id"}` when the foreign key is a declared property.
    fn derive_references(
        &self,
        document: &SchemaDocument,
        name: &str,
        target: &RelationTarget,
    ) -> Option<IndexMap<String, String>> {
        let (type_name, id_attribute) = match target {
            RelationTarget::Fixed(handle) => {
                let item = handle.item_type();
                (item.name().to_string(), item.id_attribute().to_string())
            }
            _ => (name.to_string(), self.model.id_attribute.clone()),
        };
        if id_attribute.is_empty() {
            return None;
        }

        let foreign_key = self.model.foreign_key(&type_name);
        if !document.properties.contains_key(&foreign_key) {
            return None;
        }
        trace!(property = %name, %foreign_key, "derived relation references");
        Some(IndexMap::from([(id_attribute, foreign_key)]))
    }
}

fn push_unique(list: &mut Vec<String>, name: &str) {
    if !list.iter().any(|n| n == name) {
        list.push(name.to_string());
    }
}
