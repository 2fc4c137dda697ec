//! Schema registry.
//!
//! Stores raw schema documents keyed by id. Ids that are not registered can be
//! fetched lazily through a [`SchemaSource`]; fetched documents are registered
//! under the requested id so the source is consulted at most once per id.

use indexmap::IndexMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::document::SchemaDocument;
use crate::error::{SchemaError, SchemaResult};

/// Provides schema documents the registry does not know about yet.
pub trait SchemaSource: Send + Sync {
    /// Fetch the document for an id, or `None` if the source has none.
    fn fetch(&self, id: &str) -> SchemaResult<Option<SchemaDocument>>;
}

/// Reads `<root>/<id>.json` from disk.
#[derive(Debug, Clone)]
pub struct FileSchemaSource {
    root: PathBuf,
}

impl FileSchemaSource {
    /// Create a source rooted at a directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Get the file path for an id.
    pub fn path_for(&self, id: &str) -> PathBuf {
        let relative = id.trim_start_matches('/');
        if relative.ends_with(".json") {
            self.root.join(relative)
        } else {
            self.root.join(format!("{relative}.json"))
        }
    }
}

impl SchemaSource for FileSchemaSource {
    fn fetch(&self, id: &str) -> SchemaResult<Option<SchemaDocument>> {
        let path = self.path_for(id);
        if !path.is_file() {
            return Ok(None);
        }
        read_document(&path).map(Some)
    }
}

/// Registry of raw schema documents.
#[derive(Default, Clone)]
pub struct SchemaRegistry {
    schemas: IndexMap<String, Arc<SchemaDocument>>,
    source: Option<Arc<dyn SchemaSource>>,
}

impl fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field("schemas", &self.schemas.keys().collect::<Vec<_>>())
            .field("has_source", &self.source.is_some())
            .finish()
    }
}

impl SchemaRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the source used for unknown ids.
    pub fn with_source(mut self, source: impl SchemaSource + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    /// Set the source used for unknown ids.
    pub fn set_source(&mut self, source: Arc<dyn SchemaSource>) {
        self.source = Some(source);
    }

    /// Register a document under its id, replacing any previous document.
    pub fn register(&mut self, schema: SchemaDocument) -> SchemaResult<Arc<SchemaDocument>> {
        let id = schema.require_id()?.to_string();
        let schema = Arc::new(schema);
        if self.schemas.insert(id.clone(), Arc::clone(&schema)).is_some() {
            debug!(schema = %id, "replaced registered schema");
        } else {
            debug!(schema = %id, "registered schema");
        }
        Ok(schema)
    }

    /// Get a registered document.
    pub fn get(&self, id: &str) -> Option<Arc<SchemaDocument>> {
        self.schemas.get(id).cloned()
    }

    /// Check if an id is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.schemas.contains_key(id)
    }

    /// Get a document, fetching it from the source if needed.
    pub fn resolve(&mut self, id: &str) -> SchemaResult<Arc<SchemaDocument>> {
        if let Some(schema) = self.schemas.get(id) {
            return Ok(Arc::clone(schema));
        }

        let fetched = match &self.source {
            Some(source) => source.fetch(id)?,
            None => None,
        };

        match fetched {
            Some(mut schema) => {
                debug!(schema = %id, "fetched schema from source");
                if schema.id.is_none() {
                    schema.id = Some(id.to_string());
                }
                let schema = Arc::new(schema);
                self.schemas.insert(id.to_string(), Arc::clone(&schema));
                Ok(schema)
            }
            None => Err(SchemaError::not_found(id)),
        }
    }

    /// Remove a document.
    pub fn remove(&mut self, id: &str) -> Option<Arc<SchemaDocument>> {
        self.schemas.shift_remove(id)
    }

    /// Read a JSON document from disk and register it.
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> SchemaResult<Arc<SchemaDocument>> {
        let schema = read_document(path.as_ref())?;
        self.register(schema)
    }

    /// Registered ids in registration order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }

    /// Number of registered documents.
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

fn read_document(path: &Path) -> SchemaResult<SchemaDocument> {
    let content = std::fs::read_to_string(path).map_err(|e| SchemaError::IoError {
        path: path.display().to_string(),
        source: e,
    })?;
    serde_json::from_str(&content)
        .map_err(|e| SchemaError::invalid_document(path.display().to_string(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{PropertyDefinition, PropertyType};

    fn person() -> SchemaDocument {
        SchemaDocument::new("schemas/person")
            .with_property("name", PropertyDefinition::new(PropertyType::String))
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = SchemaRegistry::new();
        registry.register(person()).unwrap();

        assert!(registry.contains("schemas/person"));
        assert_eq!(registry.len(), 1);
        let schema = registry.get("schemas/person").unwrap();
        assert!(schema.has_property("name"));
    }

    #[test]
    fn test_register_without_id_fails() {
        let mut registry = SchemaRegistry::new();
        let err = registry.register(SchemaDocument::default()).unwrap_err();
        assert!(matches!(err, SchemaError::RegistrationError { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_reregister_replaces() {
        let mut registry = SchemaRegistry::new();
        registry.register(person()).unwrap();
        registry
            .register(SchemaDocument::new("schemas/person"))
            .unwrap();

        assert_eq!(registry.len(), 1);
        assert!(!registry.get("schemas/person").unwrap().has_property("name"));
    }

    #[test]
    fn test_resolve_unknown_fails() {
        let mut registry = SchemaRegistry::new();
        let err = registry.resolve("nope").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_resolve_fetches_from_source_once() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("schemas")).unwrap();
        std::fs::write(
            dir.path().join("schemas/company.json"),
            r#"{"properties": {"name": {"type": "string"}}}"#,
        )
        .unwrap();

        let mut registry = SchemaRegistry::new().with_source(FileSchemaSource::new(dir.path()));
        let schema = registry.resolve("schemas/company").unwrap();
        assert_eq!(schema.id.as_deref(), Some("schemas/company"));
        assert!(registry.contains("schemas/company"));

        std::fs::remove_file(dir.path().join("schemas/company.json")).unwrap();
        assert!(registry.resolve("schemas/company").is_ok());
        assert!(registry.resolve("schemas/other").unwrap_err().is_not_found());
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("person.json");
        std::fs::write(&path, r#"{"id": "person", "properties": {}}"#).unwrap();

        let mut registry = SchemaRegistry::new();
        registry.load_file(&path).unwrap();
        assert_eq!(registry.ids().collect::<Vec<_>>(), vec!["person"]);
    }

    #[test]
    fn test_load_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{").unwrap();

        let mut registry = SchemaRegistry::new();
        let err = registry.load_file(&path).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidDocument { .. }));
    }

    #[test]
    fn test_remove() {
        let mut registry = SchemaRegistry::new();
        registry.register(person()).unwrap();
        assert!(registry.remove("schemas/person").is_some());
        assert!(registry.remove("schemas/person").is_none());
    }
}
