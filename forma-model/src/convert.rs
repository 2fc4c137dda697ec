//! Attribute coercion.
//!
//! Every assigned attribute that has a compiled property definition goes
//! through exactly one conversion, chosen in priority order:
//!
//! 1. an explicit converter attached to the property
//! 2. a named `conversion` found in the [`ConversionRegistry`]
//! 3. sanitization for `sanitized_string`
//! 4. numeric coercion for `number` and `integer`
//! 5. boolean coercion for `boolean`
//! 6. date parsing for `date`
//!
//! Conversions never fail. Input that cannot be coerced is kept as-is.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use forma_schema::{PropertyDefinition, PropertyType};
use indexmap::IndexMap;
use serde_json::Value as Json;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

use crate::compiler::CompiledSchema;
use crate::value::{Attributes, Value};

/// A value conversion function.
pub type Converter = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Named conversions that schema properties refer to via `conversion`.
#[derive(Clone, Default)]
pub struct ConversionRegistry {
    conversions: IndexMap<String, Converter>,
}

impl fmt::Debug for ConversionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.conversions.keys()).finish()
    }
}

impl ConversionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a conversion.
    pub fn with<F>(mut self, name: impl Into<String>, conversion: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.register(name, conversion);
        self
    }

    /// Add a conversion in place.
    pub fn register<F>(&mut self, name: impl Into<String>, conversion: F)
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.conversions.insert(name.into(), Arc::new(conversion));
    }

    /// Look up a conversion.
    pub fn get(&self, name: &str) -> Option<&Converter> {
        self.conversions.get(name)
    }

    /// Check if a conversion is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.conversions.contains_key(name)
    }

    /// Copy every conversion of `other` into this registry, replacing clashes.
    pub fn merge(&mut self, other: &ConversionRegistry) {
        for (name, conversion) in &other.conversions {
            self.conversions.insert(name.clone(), Arc::clone(conversion));
        }
    }

    /// Number of registered conversions.
    pub fn len(&self) -> usize {
        self.conversions.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.conversions.is_empty()
    }
}

/// Applies property conversions to an attribute bag.
pub struct AttributeConverter<'a> {
    schema: &'a CompiledSchema,
    conversions: &'a ConversionRegistry,
}

impl<'a> AttributeConverter<'a> {
    /// Create a converter for a compiled schema.
    pub fn new(schema: &'a CompiledSchema, conversions: &'a ConversionRegistry) -> Self {
        Self {
            schema,
            conversions,
        }
    }

    /// Convert every attribute of the bag in place.
    pub fn convert_all(&self, attributes: &mut Attributes) {
        for (name, value) in attributes.iter_mut() {
            if value.is_relation() {
                continue;
            }
            let current = std::mem::take(value);
            *value = self.convert(name, current);
        }
    }

    /// Convert a single attribute.
    pub fn convert(&self, name: &str, value: Value) -> Value {
        let Some(definition) = self.schema.property(name) else {
            return value;
        };

        if let Some(converter) = self.schema.converter(name) {
            return converter(value);
        }

        if let Some(conversion) = definition.conversion.as_deref() {
            match self.conversions.get(conversion) {
                Some(converter) => return converter(value),
                None => trace!(property = %name, conversion, "unknown conversion, skipped"),
            }
        }

        convert_by_type(definition, value)
    }
}

/// Coerce a value according to the property's declared type.
pub fn convert_by_type(definition: &PropertyDefinition, value: Value) -> Value {
    match definition.property_type {
        Some(PropertyType::SanitizedString) => sanitize_value(value),
        Some(PropertyType::Number) => to_number(value),
        Some(PropertyType::Integer) => to_integer(value),
        Some(PropertyType::Boolean) => Value::from(coerce_boolean(&value)),
        Some(PropertyType::Date) => to_date(value),
        _ => value,
    }
}

/// Escape HTML in a string.
pub fn sanitize(input: &str) -> String {
    // Decode first so already-escaped text is not escaped twice.
    let decoded = html_escape::decode_html_entities(input);
    html_escape::encode_safe(&decoded).into_owned()
}

/// Sanitize the textual form of a value. Null stays null.
pub fn sanitize_value(value: Value) -> Value {
    match value {
        Value::Json(Json::Null) => value,
        Value::Json(Json::String(s)) => Value::from(sanitize(&s)),
        other => Value::from(sanitize(&other.to_text())),
    }
}

/// Interpret a value as a boolean.
///
/// Strings are `true` only when they read `"true"` (any case); everything else
/// uses truthiness.
pub fn to_boolean(value: &Value) -> bool {
    match value {
        Value::Json(Json::String(s)) => s.eq_ignore_ascii_case("true"),
        other => is_truthy(other),
    }
}

fn coerce_boolean(value: &Value) -> bool {
    match value {
        Value::Json(Json::String(s)) if s.eq_ignore_ascii_case("false") => false,
        Value::Json(Json::String(s)) if s.eq_ignore_ascii_case("true") => true,
        other => is_truthy(other),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Json(Json::Null) => false,
        Value::Json(Json::Bool(b)) => *b,
        Value::Json(Json::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::Json(Json::String(s)) => !s.is_empty(),
        _ => true,
    }
}

fn parse_number(value: &Value) -> Option<f64> {
    match value {
        Value::Json(Json::Number(n)) => n.as_f64(),
        Value::Json(Json::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            trimmed.parse::<f64>().ok().filter(|f| f.is_finite())
        }
        _ => None,
    }
}

fn to_number(value: Value) -> Value {
    if matches!(&value, Value::Json(Json::Number(n)) if n.is_i64() || n.is_u64()) {
        return value;
    }
    match parse_number(&value) {
        Some(n) if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 => Value::from(n as i64),
        Some(n) => Value::from(n),
        None => value,
    }
}

fn to_integer(value: Value) -> Value {
    if matches!(&value, Value::Json(Json::Number(n)) if n.is_i64() || n.is_u64()) {
        return value;
    }
    match parse_number(&value).map(f64::trunc) {
        // `i64::MAX as f64` rounds up to 2^63, so the upper bound is exclusive.
        Some(n) if n >= i64::MIN as f64 && n < i64::MAX as f64 => Value::from(n as i64),
        _ => value,
    }
}

fn to_date(value: Value) -> Value {
    let parsed = match &value {
        Value::Date(_) => return value,
        Value::Json(Json::Null) => Some(Utc::now()),
        Value::Json(Json::String(s)) => parse_date(s),
        Value::Json(Json::Number(n)) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    };
    parsed.map(Value::Date).unwrap_or(value)
}

/// Parse an RFC 3339 timestamp, a naive ISO timestamp (UTC) or a plain date.
pub fn parse_date(input: &str) -> Option<DateTime<Utc>> {
    let input = input.trim();
    DateTime::parse_from_rfc3339(input)
        .map(|d| d.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|n| n.and_utc())
        })
        .or_else(|| {
            NaiveDate::parse_from_str(input, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|n| n.and_utc())
        })
}
