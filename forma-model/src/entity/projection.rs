//! Serialization with projections.

use forma_schema::{Projection, ProjectionOptions, ProjectionSpec, RelationProjection};
use serde_json::{Map, Value as Json};
use std::sync::atomic::Ordering;

use super::Entity;
use crate::compiler::RelationDefinition;
use crate::convert::sanitize_value;
use crate::value::Value;

impl Entity {
    /// Serialize to a JSON object.
    ///
    /// Returns `None` when the entity is already being serialized further up
    /// the stack; such values are left out of the enclosing output.
    pub fn serialize(&self, options: &ProjectionOptions) -> Option<Json> {
        if self.serializing.swap(true, Ordering::AcqRel) {
            return None;
        }
        let json = Projector::new(self, options).run();
        self.serializing.store(false, Ordering::Release);
        Some(Json::Object(json))
    }
}

struct Projector<'a> {
    entity: &'a Entity,
    options: &'a ProjectionOptions,
    projection: Option<&'a ProjectionSpec>,
}

impl<'a> Projector<'a> {
    fn new(entity: &'a Entity, options: &'a ProjectionOptions) -> Self {
        let projection = match &options.projection {
            Some(Projection::Inline(spec)) => Some(spec),
            Some(Projection::Named(name)) => entity.schema().and_then(|s| s.projection(name)),
            None => None,
        };
        Self {
            entity,
            options,
            projection,
        }
    }

    fn run(&self) -> Map<String, Json> {
        let mut json = Map::new();

        match self.entity.schema() {
            Some(schema) => {
                for (name, property) in schema.properties() {
                    let Some(value) = self.entity.store.get(name) else {
                        continue;
                    };
                    if property.is_virtual() {
                        continue;
                    }
                    let out = match schema.relations().get(name) {
                        Some(relation) => self.relation(relation, value),
                        None if property.is_sanitized() => Some(sanitize_value(value.clone()).to_json()),
                        None => Some(value.to_json()),
                    };
                    if let Some(out) = out {
                        json.insert(name.clone(), out);
                    }
                }
            }
            None => {
                for (name, value) in self.entity.attributes() {
                    json.insert(name.clone(), value.to_json());
                }
            }
        }

        for (name, property) in self.entity.entity_type().virtuals() {
            if !self.options.include_virtual_properties.includes(name) {
                continue;
            }
            if let Some(value) = property.get(self.entity) {
                json.insert(name.clone(), value.to_json());
            }
        }

        if let Some(projection) = self.projection {
            projection.apply(&mut json);
        }
        json
    }

    /// Relations are serialized only when recursive; raw values under a
    /// relation name are left out.
    fn relation(&self, relation: &RelationDefinition, value: &Value) -> Option<Json> {
        if !self.options.recursive {
            return None;
        }
        let nested = self.nested_options(relation.name());
        let entry = self.projection.and_then(|p| p.relation(relation.name()));
        let fallback = match entry {
            None => relation.projection(),
            Some(_) => None,
        };

        match value {
            Value::Entity(related) => {
                let mut out = related.serialize(&nested)?;
                let pick = match entry {
                    Some(RelationProjection::Fields(fields)) => Some(fields.as_slice()),
                    _ => fallback,
                };
                if let Some(fields) = pick {
                    pick_fields(&mut out, fields);
                }
                Some(out)
            }
            Value::Collection(collection) => {
                let mut out = collection.serialize(&nested);
                if let (Some(fields), Json::Array(items)) = (fallback, &mut out) {
                    for item in items {
                        pick_fields(item, fields);
                    }
                }
                Some(out)
            }
            _ => None,
        }
    }

    /// Options for a related entity: the caller's options minus the
    /// whitelist, replaced by the projection's entry for the relation.
    fn nested_options(&self, name: &str) -> ProjectionOptions {
        let mut nested = self.options.clone();
        if let Some(Projection::Inline(spec)) = &mut nested.projection {
            spec.only_fields = None;
        }
        match self.projection.and_then(|p| p.relation(name)) {
            Some(RelationProjection::Fields(fields)) => {
                nested.projection = Some(Projection::Inline(ProjectionSpec::only(fields.clone())));
            }
            Some(RelationProjection::Named(named)) => {
                nested.projection = Some(Projection::Named(named.clone()));
            }
            None => {}
        }
        nested
    }
}

fn pick_fields(json: &mut Json, fields: &[String]) {
    if let Json::Object(map) = json {
        map.retain(|key, _| fields.iter().any(|f| f == key));
    }
}

#[cfg(test)]
mod tests {
    use crate::entity::Entity;
    use crate::types::EntityType;
    use forma_schema::{ProjectionOptions, ProjectionSpec, SchemaDocument};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;

    fn address() -> Arc<EntityType> {
        EntityType::builder("address")
            .schema(
                SchemaDocument::from_value(json!({
                    "id": "address",
                    "properties": {
                        "id": {"type": "integer"},
                        "city": {"type": "string"},
                        "street": {"type": "string"}
                    },
                    "projection": {"short": {"onlyFields": ["city"]}}
                }))
                .unwrap(),
            )
            .build()
            .unwrap()
    }

    fn person() -> Arc<EntityType> {
        EntityType::builder("person")
            .schema(
                SchemaDocument::from_value(json!({
                    "id": "person",
                    "properties": {
                        "id": {"type": "integer"},
                        "name": {"type": "string"},
                        "bio": {"type": "string", "sanitize": true},
                        "secret": {"type": "string"},
                        "address_id": {"type": "integer"},
                        "address": {"type": "relation"},
                        "computed": {"type": "string", "virtual": true}
                    },
                    "projection": {
                        "public": {"removeFields": ["secret"], "address": ["city"]}
                    }
                }))
                .unwrap(),
            )
            .relation_target("address", address())
            .getter("label", |e| e.attribute("name").cloned())
            .build()
            .unwrap()
    }

    fn sample() -> Entity {
        Entity::from_json(
            &person(),
            json!({
                "id": 1,
                "name": "Ann",
                "bio": "<b>x",
                "secret": "s",
                "address": {"id": 9, "city": "Oslo", "street": "Main"}
            }),
        )
        .unwrap()
    }

    #[test]
    fn test_flat_serialization_skips_relations() {
        let json = sample().serialize(&ProjectionOptions::new()).unwrap();
        assert_eq!(
            json,
            json!({"id": 1, "name": "Ann", "bio": "&lt;b&gt;x", "secret": "s"})
        );
    }

    #[test]
    fn test_sanitized_string_marked_sanitize_is_escaped_once() {
        let ty = EntityType::builder("note")
            .schema(
                SchemaDocument::from_value(json!({
                    "id": "note",
                    "properties": {"text": {"type": "sanitized_string", "sanitize": true}}
                }))
                .unwrap(),
            )
            .build()
            .unwrap();
        let mut note = Entity::from_json(&ty, json!({"text": "a&b"})).unwrap();

        assert_eq!(note.attribute("text").unwrap(), &json!("a&amp;b"));
        let json = note.serialize(&ProjectionOptions::new()).unwrap();
        assert_eq!(json, json!({"text": "a&amp;b"}));

        note.set("text", note.get_json("text").unwrap()).unwrap();
        assert_eq!(note.attribute("text").unwrap(), &json!("a&amp;b"));

        let copy = Entity::from_json(&ty, json).unwrap();
        assert_eq!(copy.attribute("text").unwrap(), &json!("a&amp;b"));
    }

    #[test]
    fn test_recursive_serialization() {
        let json = sample().serialize(&ProjectionOptions::recursive()).unwrap();
        assert_eq!(json["address"], json!({"id": 9, "city": "Oslo", "street": "Main"}));
    }

    #[test]
    fn test_named_projection_with_relation_fields() {
        let options = ProjectionOptions::recursive().with_projection("public");
        let json = sample().serialize(&options).unwrap();
        assert!(json.get("secret").is_none());
        assert_eq!(json["address"], json!({"city": "Oslo"}));
    }

    #[test]
    fn test_inline_whitelist_is_not_recursive() {
        let options = ProjectionOptions::recursive()
            .with_projection(ProjectionSpec::only(["name", "address"]));
        let json = sample().serialize(&options).unwrap();
        assert_eq!(
            json,
            json!({"name": "Ann", "address": {"id": 9, "city": "Oslo", "street": "Main"}})
        );
    }

    #[test]
    fn test_inline_relation_named_projection() {
        let options = ProjectionOptions::recursive()
            .with_projection(ProjectionSpec::new().relation_named("address", "short"));
        let json = sample().serialize(&options).unwrap();
        assert_eq!(json["address"], json!({"city": "Oslo"}));
    }

    #[test]
    fn test_virtuals_included_on_request() {
        let entity = sample();
        assert!(entity.serialize(&ProjectionOptions::new()).unwrap().get("label").is_none());

        let json = entity
            .serialize(&ProjectionOptions::new().with_virtuals())
            .unwrap();
        assert_eq!(json["label"], json!("Ann"));

        let json = entity
            .serialize(&ProjectionOptions::new().with_virtual_fields(["other"]))
            .unwrap();
        assert!(json.get("label").is_none());
    }

    #[test]
    fn test_reentrant_serialization_is_skipped() {
        let ty = EntityType::builder("loop")
            .getter("me", |e| e.serialize(&ProjectionOptions::new()).map(Into::into))
            .build()
            .unwrap();
        let entity = Entity::from_json(&ty, json!({"a": 1})).unwrap();
        let json = entity.serialize(&ProjectionOptions::new().with_virtuals()).unwrap();
        assert_eq!(json, json!({"a": 1}));
    }
}
