//! Attribute values.
//!
//! Attributes hold plain JSON, converted dates, or materialized relations.

use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexMap;

use crate::collection::Collection;
use crate::entity::Entity;

/// Ordered attribute map of an entity.
pub type Attributes = IndexMap<String, Value>;

/// A single attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Plain JSON.
    Json(serde_json::Value),
    /// A converted point in time.
    Date(DateTime<Utc>),
    /// A materialized to-one relation.
    Entity(Box<Entity>),
    /// A materialized to-many relation.
    Collection(Box<Collection>),
}

impl Value {
    /// JSON null.
    pub const NULL: Value = Value::Json(serde_json::Value::Null);

    /// Get the JSON value, if this is plain JSON.
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(v) => Some(v),
            _ => None,
        }
    }

    /// Get a string value.
    pub fn as_str(&self) -> Option<&str> {
        self.as_json().and_then(serde_json::Value::as_str)
    }

    /// Get an integer value.
    pub fn as_i64(&self) -> Option<i64> {
        self.as_json().and_then(serde_json::Value::as_i64)
    }

    /// Get a floating point value.
    pub fn as_f64(&self) -> Option<f64> {
        self.as_json().and_then(serde_json::Value::as_f64)
    }

    /// Get a boolean value.
    pub fn as_bool(&self) -> Option<bool> {
        self.as_json().and_then(serde_json::Value::as_bool)
    }

    /// Get a date value.
    pub fn as_date(&self) -> Option<&DateTime<Utc>> {
        match self {
            Self::Date(d) => Some(d),
            _ => None,
        }
    }

    /// Get a related entity.
    pub fn as_entity(&self) -> Option<&Entity> {
        match self {
            Self::Entity(e) => Some(e),
            _ => None,
        }
    }

    /// Get a related entity mutably.
    pub fn as_entity_mut(&mut self) -> Option<&mut Entity> {
        match self {
            Self::Entity(e) => Some(e),
            _ => None,
        }
    }

    /// Get a related collection.
    pub fn as_collection(&self) -> Option<&Collection> {
        match self {
            Self::Collection(c) => Some(c),
            _ => None,
        }
    }

    /// Get a related collection mutably.
    pub fn as_collection_mut(&mut self) -> Option<&mut Collection> {
        match self {
            Self::Collection(c) => Some(c),
            _ => None,
        }
    }

    /// Check if the value is JSON null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Json(serde_json::Value::Null))
    }

    /// Check if the value is a materialized relation.
    pub fn is_relation(&self) -> bool {
        matches!(self, Self::Entity(_) | Self::Collection(_))
    }

    /// Convert into plain JSON.
    ///
    /// Dates become RFC 3339 strings with millisecond precision; relations
    /// are serialized with their default projection options.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Json(v) => v.clone(),
            Self::Date(d) => serde_json::Value::String(format_date(d)),
            Self::Entity(e) => e.to_json(),
            Self::Collection(c) => c.to_json(),
        }
    }

    /// Render the value as text (strings without quotes).
    pub fn to_text(&self) -> String {
        match self {
            Self::Json(serde_json::Value::String(s)) => s.clone(),
            Self::Json(serde_json::Value::Null) => String::new(),
            Self::Json(v) => v.to_string(),
            Self::Date(d) => format_date(d),
            Self::Entity(_) | Self::Collection(_) => self.to_json().to_string(),
        }
    }
}

pub(crate) fn format_date(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Build an attribute map from a JSON object.
///
/// Non-object values yield an empty map.
pub fn attributes_from_json(json: serde_json::Value) -> Attributes {
    match json {
        serde_json::Value::Object(map) => map
            .into_iter()
            .map(|(k, v)| (k, Value::Json(v)))
            .collect(),
        _ => Attributes::new(),
    }
}

/// Convert an attribute map into a JSON object.
pub fn attributes_to_json(attributes: &Attributes) -> serde_json::Map<String, serde_json::Value> {
    attributes
        .iter()
        .map(|(k, v)| (k.clone(), v.to_json()))
        .collect()
}

impl Default for Value {
    fn default() -> Self {
        Self::NULL
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Json(serde_json::Value::String(value.to_string()))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Json(serde_json::Value::String(value))
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Json(serde_json::Value::Bool(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Json(value.into())
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Json(value.into())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Json(value.into())
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Date(value)
    }
}

impl From<Entity> for Value {
    fn from(value: Entity) -> Self {
        Self::Entity(Box::new(value))
    }
}

impl From<Collection> for Value {
    fn from(value: Collection) -> Self {
        Self::Collection(Box::new(value))
    }
}

impl PartialEq<serde_json::Value> for Value {
    fn eq(&self, other: &serde_json::Value) -> bool {
        self.as_json() == Some(other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_from_conversions() {
        assert_eq!(Value::from("a"), json!("a"));
        assert_eq!(Value::from(3), json!(3));
        assert_eq!(Value::from(true), json!(true));
        assert!(Value::default().is_null());
    }

    #[test]
    fn test_date_to_json() {
        let date = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(Value::Date(date).to_json(), json!("2024-01-02T03:04:05.000Z"));
    }

    #[test]
    fn test_to_text() {
        assert_eq!(Value::from("plain").to_text(), "plain");
        assert_eq!(Value::from(11).to_text(), "11");
        assert_eq!(Value::NULL.to_text(), "");
    }

    #[test]
    fn test_attributes_from_json_keeps_order() {
        let attrs = attributes_from_json(json!({"b": 1, "a": 2}));
        assert_eq!(attrs.keys().cloned().collect::<Vec<_>>(), vec!["b", "a"]);
        assert!(attributes_from_json(json!([1, 2])).is_empty());
    }

    #[test]
    fn test_attributes_round_trip_json() {
        let attrs = attributes_from_json(json!({"name": "x", "n": 1}));
        assert_eq!(
            serde_json::Value::Object(attributes_to_json(&attrs)),
            json!({"name": "x", "n": 1})
        );
    }
}
