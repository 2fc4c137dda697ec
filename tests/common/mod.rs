//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use forma::prelude::*;
use serde_json::{Value as Json, json};
use std::sync::Arc;

pub const PERSON: &str = "schemas/person";
pub const COMPANY: &str = "schemas/company";
pub const ADDRESS: &str = "schemas/address";

pub fn document(value: Json) -> SchemaDocument {
    SchemaDocument::from_value(value).expect("Failed to parse schema document")
}

pub fn company_schema() -> SchemaDocument {
    document(json!({
        "id": COMPANY,
        "properties": {
            "id": {"type": "integer"},
            "name": {"type": "string"},
            "founded": {"type": "integer"}
        },
        "projection": {
            "summary": {"onlyFields": ["name"]}
        }
    }))
}

pub fn address_schema() -> SchemaDocument {
    document(json!({
        "id": ADDRESS,
        "properties": {
            "id": {"type": "integer"},
            "person_id": {"type": "integer"},
            "city": {"type": "string"},
            "street": {"type": "string"}
        }
    }))
}

pub fn person_schema() -> SchemaDocument {
    document(json!({
        "id": PERSON,
        "properties": {
            "id": {"type": "integer"},
            "firstName": {"type": "string"},
            "lastName": {"type": "string"},
            "age": {"type": "integer"},
            "bio": {"type": "string", "sanitize": true},
            "secret": {"type": "string"},
            "company_id": {"type": "integer"},
            "employer": {"$ref": COMPANY, "references": {"id": "company_id"}},
            "spouse_id": {"type": "integer"},
            "spouse": {"$ref": "#", "references": {"id": "spouse_id"}},
            "addresses": {"type": "array", "$ref": ADDRESS, "references": {"person_id": "id"}}
        },
        "required": ["firstName"],
        "projection": {
            "public": {"removeFields": ["secret"], "employer": ["name"]},
            "card": {"onlyFields": ["firstName", "employer"], "employer": "summary"}
        }
    }))
}

/// Base model for people: a read-only `fullname`.
pub fn person_base() -> Arc<EntityType> {
    EntityType::builder("person")
        .getter("fullname", |person| {
            let first = person.get("firstName").map(|v| v.to_text()).unwrap_or_default();
            let last = person.get("lastName").map(|v| v.to_text()).unwrap_or_default();
            Some(Value::from(format!("{first} {last}").trim().to_string()))
        })
        .build()
        .expect("Failed to build person base type")
}

/// Factory with company, address and person registered.
pub fn factory() -> SchemaFactory {
    let factory = SchemaFactory::new();
    factory.register(company_schema()).expect("Failed to register company");
    factory.register(address_schema()).expect("Failed to register address");
    factory
        .register_with(person_schema(), BaseTypes::new().model(person_base()))
        .expect("Failed to register person");
    factory
}

pub fn person_type(factory: &SchemaFactory) -> Arc<EntityType> {
    factory.model_type(PERSON).expect("Failed to build person type")
}

pub fn person(factory: &SchemaFactory, json: Json) -> Entity {
    person_type(factory)
        .from_json(json)
        .expect("Failed to create person")
}
