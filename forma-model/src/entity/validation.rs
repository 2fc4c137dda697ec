//! JSON-Schema validation of entities.
//!
//! The compiled schema is translated into a draft-07 document once per
//! compiled schema and the resulting validator is cached next to it.

use forma_schema::PropertyType;
use jsonschema::error::ValidationErrorKind;
use serde::Serialize;
use serde_json::{Map, Value as Json, json};
use tracing::{debug, warn};

use super::Entity;
use crate::compiler::CompiledSchema;
use crate::value::Value;

/// Keywords of the compiled document that are not forwarded to the validator.
const RESERVED_KEYWORDS: &[&str] = &["$schema", "$id", "id", "$ref", "properties", "required", "type"];

/// A single validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Violation {
    /// JSON pointer to the offending value (empty for the entity itself).
    pub path: String,
    /// Offending property, when one can be named.
    pub property: Option<String>,
    /// Human-readable message.
    pub message: String,
}

impl Violation {
    /// Create a violation for a property.
    pub fn new(property: impl Into<String>, message: impl Into<String>) -> Self {
        let property = property.into();
        Self {
            path: format!("/{property}"),
            property: Some(property),
            message: message.into(),
        }
    }

    /// Create a violation for the entity as a whole.
    pub fn entity(message: impl Into<String>) -> Self {
        Self {
            path: String::new(),
            property: None,
            message: message.into(),
        }
    }
}

impl Entity {
    /// Validate against the schema and the custom validation hook.
    ///
    /// Returns `None` when the entity is valid. Schema-less entities are
    /// always valid.
    pub fn validate(&self) -> Option<Vec<Violation>> {
        let schema = self.schema()?;
        let document = validation_attributes(self, schema);

        let mut violations = schema_violations(schema, &document);
        if let Some(hook) = self.entity_type().custom_validation() {
            violations.extend(hook(self, &document));
        }

        let mut unique = Vec::with_capacity(violations.len());
        for violation in violations {
            if !unique.contains(&violation) {
                unique.push(violation);
            }
        }
        if unique.is_empty() {
            return None;
        }
        debug!(
            schema = ?schema.id(),
            violations = unique.len(),
            "entity failed validation"
        );
        Some(unique)
    }

    /// Check if [`validate`](Self::validate) finds nothing.
    pub fn is_valid(&self) -> bool {
        self.validate().is_none()
    }
}

/// Declared properties first, then undeclared attributes. Null values are
/// dropped unless the property is required.
fn validation_attributes(entity: &Entity, schema: &CompiledSchema) -> Map<String, Json> {
    let keep = |name: &str, value: &Value| !value.is_null() || schema.is_required(name);

    let mut document = Map::new();
    for name in schema.properties().keys() {
        if let Some(value) = entity.attribute(name).filter(|v| keep(name.as_str(), *v)) {
            document.insert(name.clone(), value.to_json());
        }
    }
    for (name, value) in entity.attributes() {
        if !document.contains_key(name) && !schema.has_property(name) && keep(name.as_str(), value) {
            document.insert(name.clone(), value.to_json());
        }
    }
    document
}

fn schema_violations(schema: &CompiledSchema, document: &Map<String, Json>) -> Vec<Violation> {
    let validator = schema
        .validator
        .get_or_init(|| jsonschema::validator_for(&to_json_schema(schema)).map_err(|e| e.to_string()));

    let validator = match validator {
        Ok(validator) => validator,
        Err(message) => {
            warn!(schema = ?schema.id(), %message, "schema cannot be used for validation");
            return vec![Violation::entity(format!("invalid schema: {message}"))];
        }
    };

    let instance = Json::Object(document.clone());
    validator
        .iter_errors(&instance)
        .map(|error| {
            let path = error.instance_path.to_string();
            let property = match &error.kind {
                ValidationErrorKind::Required { property } => property.as_str().map(str::to_string),
                _ => path
                    .trim_start_matches('/')
                    .split('/')
                    .next()
                    .filter(|s| !s.is_empty())
                    .map(str::to_string),
            };
            Violation {
                path,
                property,
                message: error.to_string(),
            }
        })
        .collect()
}

/// Translate a compiled schema into a draft-07 JSON Schema.
pub(crate) fn to_json_schema(schema: &CompiledSchema) -> Json {
    let mut properties = Map::new();
    for (name, property) in schema.properties() {
        if property.is_virtual() {
            continue;
        }
        let mut out = property.extra.clone();
        let relation = schema.relations().get(name);
        match (relation, property.property_type) {
            (Some(relation), _) if relation.cardinality().is_many() => {
                out.insert("type".into(), json!("array"));
            }
            (Some(_), _) => {
                out.insert("type".into(), json!("object"));
            }
            (None, Some(PropertyType::SanitizedString)) => {
                out.insert("type".into(), json!("string"));
            }
            (None, Some(PropertyType::Date)) => {
                out.insert("type".into(), json!("string"));
                out.insert("format".into(), json!("date-time"));
            }
            (None, Some(PropertyType::Relation | PropertyType::Other)) | (None, None) => {}
            (None, Some(other)) => {
                out.insert("type".into(), json!(other.as_str()));
            }
        }
        properties.insert(name.clone(), Json::Object(out));
    }

    let mut document = Map::new();
    document.insert("$schema".into(), json!("http://json-schema.org/draft-07/schema#"));
    document.insert("type".into(), json!("object"));
    document.insert("properties".into(), Json::Object(properties));
    if !schema.required().is_empty() {
        document.insert("required".into(), json!(schema.required()));
    }
    for (key, value) in schema.extra() {
        if !RESERVED_KEYWORDS.contains(&key.as_str()) {
            document.insert(key.clone(), value.clone());
        }
    }
    Json::Object(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EntityType;
    use forma_schema::SchemaDocument;
    use std::sync::Arc;

    fn person() -> Arc<EntityType> {
        EntityType::builder("person")
            .schema(
                SchemaDocument::from_value(json!({
                    "id": "person",
                    "properties": {
                        "firstName": {"type": "string"},
                        "age": {"type": "integer", "minimum": 0},
                        "nickname": {"type": "string"},
                        "born": {"type": "date"}
                    },
                    "required": ["firstName"]
                }))
                .unwrap(),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_missing_required_property() {
        let entity = Entity::from_json(&person(), json!({})).unwrap();
        let violations = entity.validate().unwrap();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].property.as_deref(), Some("firstName"));
        assert!(!entity.is_valid());
    }

    #[test]
    fn test_valid_entity() {
        let entity = Entity::from_json(
            &person(),
            json!({"firstName": "Foo", "born": "2000-01-01", "nickname": null}),
        )
        .unwrap();
        assert_eq!(entity.validate(), None);
    }

    #[test]
    fn test_keyword_violation_has_path() {
        let entity = Entity::from_json(&person(), json!({"firstName": "Foo", "age": -1})).unwrap();
        let violations = entity.validate().unwrap();
        assert_eq!(violations[0].path, "/age");
        assert_eq!(violations[0].property.as_deref(), Some("age"));
    }

    #[test]
    fn test_custom_hook_merged_and_deduplicated() {
        let ty = EntityType::builder("person")
            .schema(
                SchemaDocument::from_value(json!({
                    "properties": {"firstName": {"type": "string"}}
                }))
                .unwrap(),
            )
            .custom_validation(|_, attrs| {
                if attrs.contains_key("firstName") {
                    Vec::new()
                } else {
                    vec![
                        Violation::new("firstName", "needs a name"),
                        Violation::new("firstName", "needs a name"),
                    ]
                }
            })
            .build()
            .unwrap();

        let violations = Entity::from_json(&ty, json!({})).unwrap().validate().unwrap();
        assert_eq!(violations, vec![Violation::new("firstName", "needs a name")]);
        assert!(Entity::from_json(&ty, json!({"firstName": "x"})).unwrap().is_valid());
    }

    #[test]
    fn test_json_schema_translation() {
        let ty = person();
        let document = to_json_schema(ty.schema().unwrap());
        assert_eq!(document["properties"]["born"], json!({"type": "string", "format": "date-time"}));
        assert_eq!(document["properties"]["age"], json!({"type": "integer", "minimum": 0}));
        assert_eq!(document["required"], json!(["firstName"]));
        assert!(document.get("id").is_none());
    }

    #[test]
    fn test_schema_less_entity_is_valid() {
        let entity = Entity::from_json(&EntityType::base("model"), json!({"a": 1})).unwrap();
        assert!(entity.is_valid());
    }
}
