//! Configuration file parsing for `forma.toml`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{SchemaError, SchemaResult};

/// Main configuration structure for `forma.toml`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FormaConfig {
    /// Model defaults.
    #[serde(default)]
    pub model: ModelConfig,

    /// Schema documents to load.
    #[serde(default)]
    pub schemas: SchemasConfig,

    /// Debug/logging settings.
    #[serde(default)]
    pub debug: DebugConfig,

    /// Environment-specific overrides.
    #[serde(default)]
    pub environments: HashMap<String, EnvironmentOverride>,
}

impl FormaConfig {
    /// Load configuration from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> SchemaResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| SchemaError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        let mut config = Self::parse(&content)?;
        if let Some(parent) = path.parent() {
            config.schemas.resolve_relative_to(parent);
        }
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> SchemaResult<Self> {
        let expanded = expand_env_vars(content);

        let config: Self =
            toml::from_str(&expanded).map_err(|e| SchemaError::TomlError { source: e })?;
        config.check()?;
        Ok(config)
    }

    /// Apply environment-specific overrides.
    pub fn with_environment(mut self, env: &str) -> Self {
        if let Some(overrides) = self.environments.remove(env) {
            if let Some(model) = overrides.model {
                if let Some(id_attribute) = model.id_attribute {
                    self.model.id_attribute = id_attribute;
                }
                if let Some(suffix) = model.foreign_key_suffix {
                    self.model.foreign_key_suffix = suffix;
                }
            }
            if let Some(debug) = overrides.debug {
                if debug.log_level.is_some() {
                    self.debug.log_level = debug.log_level;
                }
                if debug.log_format.is_some() {
                    self.debug.log_format = debug.log_format;
                }
            }
        }
        self
    }

    fn check(&self) -> SchemaResult<()> {
        if self.model.id_attribute.is_empty() {
            return Err(SchemaError::ConfigError {
                message: "`model.id_attribute` must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

/// Model defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ModelConfig {
    /// Identity attribute of entity types.
    #[serde(default = "default_id_attribute")]
    pub id_attribute: String,

    /// Suffix of derived foreign key names (`<type><suffix>`).
    #[serde(default = "default_foreign_key_suffix")]
    pub foreign_key_suffix: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            id_attribute: default_id_attribute(),
            foreign_key_suffix: default_foreign_key_suffix(),
        }
    }
}

impl ModelConfig {
    /// Build the foreign key name for a related type.
    pub fn foreign_key(&self, type_name: &str) -> String {
        format!("{}{}", type_name, self.foreign_key_suffix)
    }
}

fn default_id_attribute() -> String {
    "id".to_string()
}

fn default_foreign_key_suffix() -> String {
    "_id".to_string()
}

/// Schema document locations.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SchemasConfig {
    /// JSON schema documents registered at start-up.
    #[serde(default)]
    pub files: Vec<PathBuf>,

    /// Directory unknown schema ids are fetched from (`<root>/<id>.json`).
    #[serde(default)]
    pub root: Option<PathBuf>,
}

impl SchemasConfig {
    fn resolve_relative_to(&mut self, base: &Path) {
        for file in &mut self.files {
            if file.is_relative() {
                *file = base.join(&*file);
            }
        }
        if let Some(root) = &mut self.root {
            if root.is_relative() {
                *root = base.join(&*root);
            }
        }
    }
}

/// Debug/logging configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DebugConfig {
    /// Log level (`trace`, `debug`, `info`, `warn`, `error`).
    #[serde(default)]
    pub log_level: Option<String>,

    /// Log format (`json`, `pretty`, `compact`).
    #[serde(default)]
    pub log_format: Option<String>,
}

/// Environment-specific configuration overrides.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EnvironmentOverride {
    /// Model overrides.
    pub model: Option<ModelOverride>,

    /// Debug overrides.
    pub debug: Option<DebugConfig>,
}

/// Model configuration overrides.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ModelOverride {
    /// Override id_attribute.
    pub id_attribute: Option<String>,

    /// Override foreign_key_suffix.
    pub foreign_key_suffix: Option<String>,
}

/// Expand environment variables in the format `${VAR_NAME}`.
fn expand_env_vars(content: &str) -> String {
    let Ok(re) = regex_lite::Regex::new(r"\$\{([^}]+)\}") else {
        return content.to_string();
    };

    re.replace_all(content, |caps: &regex_lite::Captures<'_>| {
        std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
    })
    .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = FormaConfig::default();
        assert_eq!(config.model.id_attribute, "id");
        assert_eq!(config.model.foreign_key("company"), "company_id");
        assert!(config.schemas.files.is_empty());
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
            [model]
            id_attribute = "uuid"
            foreign_key_suffix = "Id"

            [schemas]
            files = ["schemas/person.json"]

            [debug]
            log_level = "debug"
        "#;

        let config = FormaConfig::parse(toml).unwrap();
        assert_eq!(config.model.id_attribute, "uuid");
        assert_eq!(config.model.foreign_key("company"), "companyId");
        assert_eq!(config.schemas.files, vec![PathBuf::from("schemas/person.json")]);
        assert_eq!(config.debug.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = FormaConfig::parse("[model]\nprimary = \"id\"\n").unwrap_err();
        assert!(matches!(err, SchemaError::TomlError { .. }));
    }

    #[test]
    fn test_empty_id_attribute_rejected() {
        let err = FormaConfig::parse("[model]\nid_attribute = \"\"\n").unwrap_err();
        assert!(matches!(err, SchemaError::ConfigError { .. }));
    }

    #[test]
    fn test_environment_override() {
        let toml = r#"
            [debug]
            log_level = "info"

            [environments.test.debug]
            log_level = "trace"

            [environments.test.model]
            foreign_key_suffix = "Ref"
        "#;

        let config = FormaConfig::parse(toml).unwrap().with_environment("test");
        assert_eq!(config.debug.log_level.as_deref(), Some("trace"));
        assert_eq!(config.model.foreign_key_suffix, "Ref");
        assert_eq!(config.model.id_attribute, "id");
    }

    #[test]
    fn test_from_file_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forma.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[schemas]\nfiles = [\"person.json\"]\nroot = \"schemas\"").unwrap();

        let config = FormaConfig::from_file(&path).unwrap();
        assert_eq!(config.schemas.files, vec![dir.path().join("person.json")]);
        assert_eq!(config.schemas.root, Some(dir.path().join("schemas")));
    }

    #[test]
    fn test_env_var_expansion() {
        // SAFETY: This test runs single-threaded and we clean up after
        unsafe {
            std::env::set_var("FORMA_TEST_ID_ATTR", "key");
        }
        let expanded = expand_env_vars("id_attribute = \"${FORMA_TEST_ID_ATTR}\"");
        assert_eq!(expanded, "id_attribute = \"key\"");
        unsafe {
            std::env::remove_var("FORMA_TEST_ID_ATTR");
        }
        assert_eq!(expand_env_vars("${FORMA_UNSET_VAR_X}"), "${FORMA_UNSET_VAR_X}");
    }
}
