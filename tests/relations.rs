//! Integration tests for relation materialization.

mod common;

use common::*;
use forma::model::RelationTarget;
use forma::prelude::*;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::{Arc, Mutex};

/// A foreign key alone materializes the related entity
#[test]
fn test_foreign_key_materializes_related_entity() {
    let factory = factory();
    let person = person(&factory, json!({"id": 1, "firstName": "Ann", "company_id": "222"}));

    let employer = person.related("employer").expect("employer materialized");
    assert_eq!(employer.id().expect("employer id"), &json!(222));
    assert_eq!(employer.schema().and_then(|s| s.id()), Some(COMPANY));

    let parent = employer.parent().expect("parent recorded");
    assert_eq!(parent.type_name, "person");
    assert_eq!(parent.schema_id.as_deref(), Some(PERSON));
    assert_eq!(parent.id, Some(json!(1)));
}

/// `{name, foo2_id}` with `bar: {$ref: foo2}` yields `bar.id == foo2_id`
#[test]
fn test_reference_value_becomes_related_identity() {
    let factory = SchemaFactory::new();
    factory
        .register(document(json!({
            "id": "foo2",
            "properties": {"id": {"type": "integer"}, "label": {"type": "string"}}
        })))
        .expect("foo2");
    factory
        .register(document(json!({
            "id": "foo1",
            "properties": {
                "name": {"type": "string"},
                "foo2_id": {"type": "integer"},
                "bar": {"$ref": "foo2", "references": {"id": "foo2_id"}}
            }
        })))
        .expect("foo1");

    let foo = factory
        .model_type("foo1")
        .expect("foo1 type")
        .from_json(json!({"name": "test", "foo2_id": 1}))
        .expect("foo1");
    assert_eq!(foo.related("bar").expect("bar").get_json("id"), Some(json!(1)));
}

/// Raw nested objects are merged with the reference values
#[test]
fn test_raw_nested_object_merges_reference_values() {
    let factory = factory();
    let person = person(
        &factory,
        json!({"firstName": "Ann", "company_id": 5, "employer": {"name": "ACME", "founded": "1999"}}),
    );
    let employer = person.related("employer").expect("employer");
    assert_eq!(
        employer.to_json(),
        json!({"id": 5, "name": "ACME", "founded": 1999})
    );
}

/// A null foreign key leaves the relation empty
#[test]
fn test_null_foreign_key() {
    let factory = factory();
    let person = person(&factory, json!({"firstName": "Ann", "company_id": null}));
    assert!(person.related("employer").is_none());
}

/// Self relations materialize one level only
#[test]
fn test_self_relation_does_not_recurse() {
    let factory = factory();
    let person = person(
        &factory,
        json!({"id": 1, "firstName": "Ann", "spouse": {"id": 2, "firstName": "Bob", "spouse_id": 1}}),
    );
    let spouse = person.related("spouse").expect("spouse");
    assert_eq!(spouse.get_json("firstName"), Some(json!("Bob")));
    assert!(spouse.related("spouse").is_none());
    assert_eq!(spouse.get_json("spouse_id"), Some(json!(1)));
}

/// To-many relations build a collection carrying the relation context
#[test]
fn test_to_many_relation_builds_collection() {
    let factory = factory();
    let person = person(
        &factory,
        json!({
            "id": 4,
            "firstName": "Ann",
            "addresses": [{"city": "Lyon"}, {"city": "Oslo", "street": "Storgata"}]
        }),
    );

    let addresses = person.collection("addresses").expect("addresses");
    assert_eq!(addresses.len(), 2);
    assert_eq!(addresses.context_value("person_id"), Some(&json!(4)));
    assert_eq!(
        addresses.iter().map(|a| a.get_json("city")).collect::<Vec<_>>(),
        vec![Some(json!("Lyon")), Some(json!("Oslo"))]
    );
    assert_eq!(
        addresses.at(1).and_then(|a| a.parent()).map(|p| p.type_name.as_str()),
        Some("person")
    );
}

/// Updating the foreign key replaces the related entity, an unchanged key keeps it
#[test]
fn test_relation_follows_foreign_key_updates() {
    let factory = factory();
    let mut person = person(&factory, json!({"firstName": "Ann", "company_id": 1}));
    person
        .related_mut("employer")
        .expect("employer")
        .set("name", "First")
        .expect("set name");

    person.set("company_id", 1).expect("same key");
    assert_eq!(
        person.related("employer").and_then(|e| e.get_json("name")),
        Some(json!("First"))
    );

    person.set("company_id", 2).expect("new key");
    let employer = person.related("employer").expect("employer");
    assert_eq!(employer.id().expect("id"), &json!(2));
    assert!(employer.get_json("name").is_none());
}

/// Factory targets pick the related type from the incoming attributes
#[test]
fn test_polymorphic_target() {
    let car = EntityType::builder("car").build().expect("car");
    let boat = EntityType::builder("boat").build().expect("boat");

    let owner = EntityType::builder("owner")
        .schema(document(json!({
            "id": "owner",
            "properties": {
                "vehicle_kind": {"type": "string"},
                "vehicle": {"type": "relation"}
            }
        })))
        .relation_target(
            "vehicle",
            RelationTarget::factory(move |attributes| {
                let kind = attributes.get("vehicle_kind").and_then(|v| v.as_str().map(str::to_string));
                match kind.as_deref() {
                    Some("boat") => TypeHandle::from(Arc::clone(&boat)),
                    _ => TypeHandle::from(Arc::clone(&car)),
                }
            }),
        )
        .build()
        .expect("owner");

    let a = owner
        .from_json(json!({"vehicle_kind": "boat", "vehicle": {"wheels": 0}}))
        .expect("boat owner");
    assert_eq!(a.related("vehicle").expect("vehicle").entity_type().name(), "boat");

    let b = owner
        .from_json(json!({"vehicle": {"wheels": 4}}))
        .expect("car owner");
    assert_eq!(b.related("vehicle").expect("vehicle").entity_type().name(), "car");
}

/// Change listeners see the changed keys of each write
#[test]
fn test_change_notification() {
    let factory = factory();
    let mut person = person(&factory, json!({"firstName": "Ann"}));
    assert!(person.changed().is_empty());

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    person.on_change(move |keys| {
        if let Ok(mut seen) = sink.lock() {
            seen.push(keys.to_vec());
        }
    });

    person.set("lastName", "Smith").expect("set");
    person
        .set_with(
            forma::model::value::attributes_from_json(json!({"age": 3})),
            SetOptions::silent(),
        )
        .expect("silent set");
    person.unset("lastName");

    let seen = seen.lock().expect("listener state").clone();
    assert_eq!(seen, vec![vec!["lastName".to_string()], vec!["lastName".to_string()]]);
    assert!(!person.has("lastName"));
    assert!(person.has("age"));
}
