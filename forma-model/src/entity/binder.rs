//! Relation materialization.
//!
//! Before conversion, every relation of the schema gets a chance to turn the
//! incoming bag's raw data into a related entity or collection. Related
//! instances are created silently and know the entity they were created for.

use serde_json::Value as Json;
use std::sync::Arc;
use tracing::{debug, trace};

use super::{Entity, EntityOptions, SetOptions};
use crate::collection::{Collection, CollectionOptions, CollectionType};
use crate::compiler::{Cardinality, CompiledSchema, RelationDefinition, RelationTarget};
use crate::convert::AttributeConverter;
use crate::error::{ModelError, ModelResult};
use crate::types::{EntityType, TypeHandle};
use crate::value::{Attributes, Value, attributes_from_json, attributes_to_json};

pub(crate) struct RelationBinder<'a> {
    entity: &'a Entity,
    schema: &'a CompiledSchema,
    options: SetOptions,
}

impl<'a> RelationBinder<'a> {
    pub(crate) fn new(entity: &'a Entity, schema: &'a CompiledSchema, options: SetOptions) -> Self {
        Self {
            entity,
            schema,
            options,
        }
    }

    pub(crate) fn bind(&self, bag: &mut Attributes) -> ModelResult<()> {
        for relation in self.schema.relations().values() {
            if bag.get(relation.name()).is_some_and(Value::is_relation) {
                continue;
            }
            if relation.target().is_self() && self.options.no_relations {
                continue;
            }
            match relation.cardinality() {
                Cardinality::One => self.bind_one(relation, bag)?,
                Cardinality::Many => self.bind_many(relation, bag)?,
            }
        }
        Ok(())
    }

    fn bind_one(&self, relation: &RelationDefinition, bag: &mut Attributes) -> ModelResult<()> {
        let raw = match bag.get(relation.name()) {
            Some(Value::Json(Json::Object(map))) => Some(map.clone()),
            _ => None,
        };
        let values = relation.relation_values(bag);
        if raw.is_none() && values.is_none() {
            return Ok(());
        }

        let ty = self.model_type(relation, bag)?;
        if raw.is_none() && values.as_ref().is_some_and(|v| self.already_attached(relation, &ty, v)) {
            trace!(relation = %relation.name(), "related entity already attached");
            return Ok(());
        }

        let mut attributes = raw.map(|map| attributes_from_json(Json::Object(map))).unwrap_or_default();
        if let Some(values) = values {
            attributes.extend(values);
        }
        attributes.extend(relation.static_attributes());

        let options = EntityOptions {
            default_projection_options: None,
            no_relations: relation.target().is_self() || self.options.no_relations,
            parent: Some(self.entity.parent_ref(bag)),
            silent: true,
        };
        let related = Entity::new(&ty, attributes, options)?;
        debug!(relation = %relation.name(), target = %ty.name(), "materialized related entity");
        bag.insert(relation.name().to_string(), Value::from(related));
        Ok(())
    }

    fn bind_many(&self, relation: &RelationDefinition, bag: &mut Attributes) -> ModelResult<()> {
        let items = match bag.get(relation.name()) {
            Some(Value::Json(Json::Array(items))) => {
                Some(items.iter().cloned().map(Value::Json).collect::<Vec<_>>())
            }
            Some(Value::Json(object @ Json::Object(_))) => Some(vec![Value::Json(object.clone())]),
            _ => None,
        };
        let values = relation.relation_values(bag);
        if items.is_none() && values.is_none() {
            return Ok(());
        }

        let mut context = values.as_ref().map(attributes_to_json).unwrap_or_default();
        context.extend(relation.static_values().clone());

        let ty = self.collection_type(relation, bag)?;
        let options = CollectionOptions {
            context,
            default_projection_options: None,
            parent: Some(self.entity.parent_ref(bag)),
            no_relations: self.options.no_relations,
        };
        let mut collection = Collection::new(&ty, items.unwrap_or_default(), options)?;
        if !relation.static_values().is_empty() {
            for item in collection.iter_mut() {
                item.set_with(relation.static_attributes(), SetOptions::silent())?;
            }
        }

        debug!(
            relation = %relation.name(),
            target = %ty.name(),
            items = collection.len(),
            "materialized related collection"
        );
        bag.insert(relation.name().to_string(), Value::from(collection));
        Ok(())
    }

    /// The attached entity already carries the reference values, compared
    /// after the target type's conversion.
    fn already_attached(&self, relation: &RelationDefinition, ty: &EntityType, values: &Attributes) -> bool {
        let Some(related) = self.entity.attribute(relation.name()).and_then(Value::as_entity) else {
            return false;
        };
        values.iter().all(|(name, value)| {
            let value = match ty.schema() {
                Some(schema) => AttributeConverter::new(schema, ty.conversions()).convert(name, value.clone()),
                None => value.clone(),
            };
            related.attribute(name) == Some(&value)
        })
    }

    fn resolve(&self, relation: &RelationDefinition, bag: &Attributes) -> ModelResult<TypeHandle> {
        match relation.target() {
            RelationTarget::Fixed(handle) => Ok(handle.clone()),
            RelationTarget::Factory(factory) => Ok(factory(bag)),
            RelationTarget::SelfType => Ok(TypeHandle::Model(Arc::clone(self.entity.entity_type()))),
            RelationTarget::BySchemaId(id) => {
                let ty = self.entity.entity_type();
                let factory = ty.factory().ok_or_else(|| {
                    ModelError::relation(
                        relation.name(),
                        format!("type `{}` has no factory to resolve `{id}`", ty.name()),
                    )
                })?;
                match relation.cardinality() {
                    Cardinality::One => factory.model_type(id).map(TypeHandle::Model),
                    Cardinality::Many => factory.collection_type(id).map(TypeHandle::Collection),
                }
            }
        }
    }

    fn model_type(&self, relation: &RelationDefinition, bag: &Attributes) -> ModelResult<Arc<EntityType>> {
        match self.resolve(relation, bag)? {
            TypeHandle::Model(ty) => Ok(ty),
            TypeHandle::Collection(ty) => Err(ModelError::relation(
                relation.name(),
                format!("expected an entity type, got collection `{}`", ty.name()),
            )),
        }
    }

    fn collection_type(
        &self,
        relation: &RelationDefinition,
        bag: &Attributes,
    ) -> ModelResult<Arc<CollectionType>> {
        match self.resolve(relation, bag)? {
            TypeHandle::Collection(ty) => Ok(ty),
            TypeHandle::Model(ty) => Ok(Arc::new(CollectionType::new(ty.name().to_string(), ty))),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::compiler::RelationTarget;
    use crate::entity::{Entity, EntityOptions};
    use crate::error::ModelError;
    use crate::types::EntityType;
    use forma_schema::SchemaDocument;
    use serde_json::json;
    use std::sync::Arc;

    fn company() -> Arc<EntityType> {
        EntityType::builder("company")
            .schema(
                SchemaDocument::from_value(json!({
                    "id": "company",
                    "properties": {"id": {"type": "integer"}, "name": {"type": "string"}}
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
                        "company_id": {"type": "integer"},
                        "employer": {"type": "relation", "roles": ["boss"]},
                        "spouse_id": {"type": "integer"},
                        "spouse": {"$ref": "#", "references": {"id": "spouse_id"}},
                        "friends": {"type": "array", "$ref": "#"},
                        "offices": {"type": "relation", "values": {"kind": "office"}}
                    }
                }))
                .unwrap(),
            )
            .relation_target("employer", company())
            .relation_target("offices", Arc::new(crate::collection::CollectionType::new("offices", company())))
            .build()
            .unwrap()
    }

    #[test]
    fn test_reference_values_materialize_entity() {
        let p = Entity::from_json(&person(), json!({"id": 1, "company_id": "222"})).unwrap();
        let employer = p.related("employer").unwrap();
        assert_eq!(employer.attribute("id").unwrap(), &json!(222));
        assert_eq!(employer.parent().unwrap().type_name, "person");
        assert_eq!(employer.parent().unwrap().id, Some(json!(1)));
    }

    #[test]
    fn test_raw_object_materializes_entity_and_role_reads_it() {
        let p = Entity::from_json(&person(), json!({"employer": {"id": 5, "name": "ACME"}})).unwrap();
        assert_eq!(p.related("boss").unwrap().attribute("name").unwrap(), &json!("ACME"));
    }

    #[test]
    fn test_role_write_is_stored_under_relation_name() {
        let mut p = Entity::from_json(&person(), json!({"id": 1})).unwrap();
        p.set_json(json!({"boss": {"id": 6, "name": "Initech"}})).unwrap();

        assert!(!p.attributes().contains_key("boss"));
        let employer = p.related("employer").unwrap();
        assert_eq!(employer.attribute("name").unwrap(), &json!("Initech"));
        assert_eq!(p.changed(), ["employer".to_string()]);
    }

    #[test]
    fn test_null_reference_materializes_nothing() {
        let p = Entity::from_json(&person(), json!({"company_id": null})).unwrap();
        assert!(p.related("employer").is_none());
    }

    #[test]
    fn test_self_relation_stops_at_one_level() {
        let p = Entity::from_json(
            &person(),
            json!({"id": 1, "spouse": {"id": 2, "spouse": {"id": 1}}}),
        )
        .unwrap();
        let spouse = p.related("spouse").unwrap();
        assert_eq!(spouse.attribute("id").unwrap(), &json!(2));
        assert!(spouse.related("spouse").is_none());
        assert_eq!(spouse.attribute("spouse").unwrap(), &json!({"id": 1}));
    }

    #[test]
    fn test_no_relations_skips_self_relations() {
        let p = Entity::new(
            &person(),
            crate::value::attributes_from_json(json!({"spouse_id": 4, "company_id": 9})),
            EntityOptions::new().no_relations(),
        )
        .unwrap();
        assert!(p.related("spouse").is_none());
        assert!(p.related("employer").is_some());
    }

    #[test]
    fn test_collection_with_static_values() {
        let p = Entity::from_json(&person(), json!({"offices": [{"id": 1}, {"id": 2}]})).unwrap();
        let offices = p.collection("offices").unwrap();
        assert_eq!(offices.len(), 2);
        assert_eq!(offices.context()["kind"], json!("office"));
        assert!(
            offices
                .iter()
                .all(|o| o.attribute("kind").is_some_and(|k| *k == json!("office")))
        );
    }

    #[test]
    fn test_self_collection() {
        let p = Entity::from_json(&person(), json!({"friends": [{"id": 8}]})).unwrap();
        let friends = p.collection("friends").unwrap();
        assert_eq!(friends.at(0).unwrap().entity_type().name(), "person");
    }

    #[test]
    fn test_schema_id_target_without_factory_fails() {
        let orphan = EntityType::builder("orphan")
            .schema(
                SchemaDocument::from_value(json!({"properties": {"owner": {"type": "relation"}}}))
                    .unwrap(),
            )
            .relation_target("owner", RelationTarget::BySchemaId("company".into()))
            .build()
            .unwrap();
        let err = Entity::from_json(&orphan, json!({"owner": {"id": 1}})).unwrap_err();
        assert!(matches!(err, ModelError::RelationError { .. }));
    }

    #[test]
    fn test_attached_entity_kept_when_references_match() {
        let mut p = Entity::from_json(&person(), json!({"company_id": 3})).unwrap();
        p.related_mut("employer").unwrap().set("name", "kept").unwrap();
        p.set("company_id", 3).unwrap();
        assert_eq!(p.related("employer").unwrap().attribute("name").unwrap(), &json!("kept"));
        p.set("company_id", "3").unwrap();
        assert_eq!(p.related("employer").unwrap().attribute("name").unwrap(), &json!("kept"));

        p.set("company_id", 4).unwrap();
        assert!(p.related("employer").unwrap().attribute("name").is_none());
    }
}
