//! Integration tests for virtual and templated properties.

mod common;

use common::*;
use forma::model::Attributes;
use forma::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use pretty_assertions::assert_eq;
use serde_json::json;

/// A getter-only virtual is hidden by default, shown on request and tracks changes
#[test]
fn test_getter_only_virtual() {
    let factory = factory();
    let mut person = person(&factory, json!({"firstName": "Ann", "lastName": "Lee"}));

    assert_eq!(person.to_json().get("fullname"), None);

    let with_virtuals = ProjectionOptions::new().with_virtuals();
    assert_eq!(
        person.serialize(&with_virtuals).expect("serialized")["fullname"],
        json!("Ann Lee")
    );

    person.set("lastName", "Smith").expect("set");
    assert_eq!(person.get_json("fullname"), Some(json!("Ann Smith")));
    assert_eq!(
        person.serialize(&with_virtuals).expect("serialized")["fullname"],
        json!("Ann Smith")
    );
}

/// Writing a getter-only virtual is ignored
#[test]
fn test_getter_only_virtual_ignores_writes() {
    let factory = factory();
    let mut person = person(&factory, json!({"firstName": "Ann", "fullname": "Zed Zed"}));
    assert_eq!(person.get_json("fullname"), Some(json!("Ann")));
    assert!(person.attributes().get("fullname").is_none());

    person.set("fullname", "Bob Bob").expect("ignored write");
    assert_eq!(person.get_json("fullname"), Some(json!("Ann")));
}

fn contact_type() -> Arc<EntityType> {
    let name = VirtualProperty::getter(|e| {
        let first = e.attribute("first").map(Value::to_text).unwrap_or_default();
        let last = e.attribute("last").map(Value::to_text).unwrap_or_default();
        Some(Value::from(format!("{first} {last}")))
    })
    .with_setter(|e, _name, value, options| {
        let text = value.to_text();
        let (first, last) = text.split_once(' ').unwrap_or((text.as_str(), ""));
        e.set_with(
            Attributes::from([
                ("first".to_string(), Value::from(first)),
                ("last".to_string(), Value::from(last)),
            ]),
            options,
        )
    });

    EntityType::builder("contact")
        .virtual_property("name", name)
        .build()
        .expect("contact")
}

/// Virtual setters write through to stored attributes
#[test]
fn test_virtual_setter() {
    let contact = contact_type()
        .from_json(json!({"name": "Ada Lovelace"}))
        .expect("contact");

    assert_eq!(contact.get_json("first"), Some(json!("Ada")));
    assert_eq!(contact.get_json("last"), Some(json!("Lovelace")));
    assert_eq!(contact.get_json("name"), Some(json!("Ada Lovelace")));
}

/// A silent write through a virtual setter stays silent
#[test]
fn test_virtual_setter_honors_silent() {
    let mut contact = contact_type().from_json(json!({})).expect("contact");
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    contact.on_change(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    contact
        .set_with(
            Attributes::from([("name".to_string(), Value::from("Grace Hopper"))]),
            SetOptions::silent(),
        )
        .expect("silent write");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(contact.get_json("first"), Some(json!("Grace")));

    contact.set("name", "Alan Kay").expect("write");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

/// Selected virtuals only
#[test]
fn test_virtual_selection() {
    let factory = factory();
    let person = person(&factory, json!({"firstName": "Ann"}));

    let selected = person
        .serialize(&ProjectionOptions::new().with_virtual_fields(["fullname"]))
        .expect("serialized");
    assert_eq!(selected["fullname"], json!("Ann"));

    let other = person
        .serialize(&ProjectionOptions::new().with_virtual_fields(["nickname"]))
        .expect("serialized");
    assert_eq!(other.get("fullname"), None);
}

/// Templates render attributes and call arguments
#[test]
fn test_templated_property() {
    let factory = factory();
    let person = person(&factory, json!({"id": 3, "firstName": "Ann", "company_id": 9}));

    let url = Template::new("/companies/{company_id}/people/{id}");
    assert_eq!(person.format(&url, &[]), "/companies/9/people/3");

    let page = Template::new("/people/{id}?page={arguments[0]}");
    assert_eq!(person.format(&page, &[Value::from(2)]), "/people/3?page=2");

    let ty = EntityType::builder("link")
        .virtual_property("href", Template::new("/links/{slug}").into_virtual())
        .build()
        .expect("link");
    let link = ty.from_json(json!({"slug": "home"})).expect("link");
    assert_eq!(
        link.serialize(&ProjectionOptions::new().with_virtuals()),
        Some(json!({"slug": "home", "href": "/links/home"}))
    );
}
