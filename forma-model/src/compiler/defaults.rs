//! Default values and property overrides.

use chrono::Utc;
use forma_schema::PropertyDefinition;
use std::fmt;
use std::sync::Arc;

use super::relation::RelationTarget;
use crate::convert::Converter;
use crate::value::Value;

/// Computes a default value per instantiation.
pub type DefaultProvider = Arc<dyn Fn() -> Value + Send + Sync>;

/// Default value of a property.
#[derive(Clone)]
pub enum DefaultValue {
    /// A literal, cloned per instance.
    Literal(serde_json::Value),
    /// The current time, taken per instance.
    Now,
    /// A custom provider.
    Provider(DefaultProvider),
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(v) => f.debug_tuple("Literal").field(v).finish(),
            Self::Now => f.write_str("Now"),
            Self::Provider(_) => f.write_str("Provider(..)"),
        }
    }
}

impl DefaultValue {
    /// Create a provider default.
    pub fn provider<F>(provider: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        Self::Provider(Arc::new(provider))
    }

    /// Produce the value for a new instance.
    pub fn evaluate(&self) -> Value {
        match self {
            Self::Literal(v) => Value::Json(v.clone()),
            Self::Now => Value::Date(Utc::now()),
            Self::Provider(provider) => provider(),
        }
    }
}

/// Per-property hooks a type layers over its schema.
///
/// The patch is merged over the document's property; function-valued hooks
/// (converter, default provider, relation target) can only be given here.
#[derive(Clone, Default)]
pub struct PropertyOverride {
    pub(crate) patch: Option<PropertyDefinition>,
    pub(crate) convert: Option<Converter>,
    pub(crate) default: Option<DefaultValue>,
    pub(crate) target: Option<RelationTarget>,
}

impl fmt::Debug for PropertyOverride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyOverride")
            .field("patch", &self.patch)
            .field("convert", &self.convert.is_some())
            .field("default", &self.default)
            .field("target", &self.target)
            .finish()
    }
}

impl PropertyOverride {
    /// Create an empty override.
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a property patch.
    pub fn patch(mut self, patch: PropertyDefinition) -> Self {
        self.patch = Some(patch);
        self
    }

    /// Set an explicit converter.
    pub fn convert<F>(mut self, convert: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.convert = Some(Arc::new(convert));
        self
    }

    /// Set the default value.
    pub fn default_value(mut self, default: DefaultValue) -> Self {
        self.default = Some(default);
        self
    }

    /// Set a default provider.
    pub fn default_with<F>(self, provider: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.default_value(DefaultValue::provider(provider))
    }

    /// Set the relation target.
    pub fn target(mut self, target: impl Into<RelationTarget>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Layer another override on top of this one.
    pub fn merge(&mut self, other: &PropertyOverride) {
        if let Some(patch) = &other.patch {
            match &mut self.patch {
                Some(existing) => existing.merge(patch),
                None => self.patch = Some(patch.clone()),
            }
        }
        if other.convert.is_some() {
            self.convert.clone_from(&other.convert);
        }
        if other.default.is_some() {
            self.default.clone_from(&other.default);
        }
        if other.target.is_some() {
            self.target.clone_from(&other.target);
        }
    }
}
