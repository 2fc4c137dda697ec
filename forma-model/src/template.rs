//! Templated properties.
//!
//! A template such as `/companies/{company_id}/employees/{id}` renders
//! `{name}` placeholders from an entity's attributes and `{arguments[n]}`
//! placeholders from call arguments.

use regex_lite::Regex;
use std::sync::{Arc, OnceLock};

use crate::entity::Entity;
use crate::types::VirtualProperty;
use crate::value::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Text(String),
    Attribute(String),
    Argument(usize),
}

fn placeholder_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\{([^}]+)\}+").ok())
        .as_ref()
}

fn argument_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^\s*arguments\[(\d+)\]\s*$").ok())
        .as_ref()
}

/// A parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    parts: Vec<Part>,
}

impl Template {
    /// Parse a template.
    pub fn new(source: impl Into<String>) -> Self {
        let source = source.into();
        let parts = parse(&source);
        Self { source, parts }
    }

    /// The template text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Attribute names referenced by the template.
    pub fn attributes(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().filter_map(|part| match part {
            Part::Attribute(name) => Some(name.as_str()),
            _ => None,
        })
    }

    /// Render the template. Missing values render as empty text.
    pub fn render(&self, entity: &Entity, arguments: &[Value]) -> String {
        let mut out = String::with_capacity(self.source.len());
        for part in &self.parts {
            match part {
                Part::Text(text) => out.push_str(text),
                Part::Attribute(name) => {
                    if let Some(value) = entity.get(name) {
                        out.push_str(&value.to_text());
                    }
                }
                Part::Argument(index) => {
                    if let Some(value) = arguments.get(*index) {
                        out.push_str(&value.to_text());
                    }
                }
            }
        }
        out
    }

    /// Expose the template as a read-only virtual property.
    pub fn into_virtual(self) -> VirtualProperty {
        let template = Arc::new(self);
        VirtualProperty::getter(move |entity| Some(Value::from(template.render(entity, &[]))))
    }
}

fn parse(source: &str) -> Vec<Part> {
    let Some(pattern) = placeholder_pattern() else {
        return vec![Part::Text(source.to_string())];
    };

    let mut parts = Vec::new();
    let mut last = 0;
    for captures in pattern.captures_iter(source) {
        let (Some(whole), Some(inner)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        if whole.start() > last {
            parts.push(Part::Text(source[last..whole.start()].to_string()));
        }
        let inner = inner.as_str();
        let argument = argument_pattern()
            .and_then(|p| p.captures(inner))
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok());
        parts.push(match argument {
            Some(index) => Part::Argument(index),
            None => Part::Attribute(inner.trim().to_string()),
        });
        last = whole.end();
    }
    if last < source.len() {
        parts.push(Part::Text(source[last..].to_string()));
    }
    parts
}

impl Entity {
    /// Render a template against this entity.
    pub fn format(&self, template: &Template, arguments: &[Value]) -> String {
        template.render(self, arguments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EntityType;
    use serde_json::json;

    #[test]
    fn test_attribute_placeholders() {
        let ty = EntityType::base("employee");
        let entity = Entity::from_json(&ty, json!({"company_id": 5, "employer_id": "e1"})).unwrap();
        let template = Template::new("/companies/{company_id}/employees/{employer_id}");

        assert_eq!(template.render(&entity, &[]), "/companies/5/employees/e1");
        assert_eq!(
            template.attributes().collect::<Vec<_>>(),
            vec!["company_id", "employer_id"]
        );
    }

    #[test]
    fn test_argument_placeholders() {
        let ty = EntityType::base("employee");
        let entity = Entity::from_json(&ty, json!({"id": 1})).unwrap();
        let template = Template::new("/items/{id}?page={arguments[0]}&q={arguments[1]}");
        assert_eq!(
            entity.format(&template, &[Value::from(2), Value::from("x")]),
            "/items/1?page=2&q=x"
        );
        assert_eq!(template.render(&entity, &[]), "/items/1?page=&q=");
    }

    #[test]
    fn test_missing_attribute_renders_empty() {
        let ty = EntityType::base("employee");
        let entity = Entity::from_json(&ty, json!({})).unwrap();
        assert_eq!(Template::new("a{missing}b").render(&entity, &[]), "ab");
        assert_eq!(Template::new("no placeholders").render(&entity, &[]), "no placeholders");
    }

    #[test]
    fn test_template_as_virtual_property() {
        let ty = EntityType::builder("employee")
            .virtual_property("url", Template::new("/employees/{id}").into_virtual())
            .build()
            .unwrap();
        let entity = Entity::from_json(&ty, json!({"id": 3})).unwrap();
        assert_eq!(entity.get_json("url"), Some(json!("/employees/3")));
    }
}
