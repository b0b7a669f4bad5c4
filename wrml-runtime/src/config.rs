//! Runtime configuration

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Settings for a [`RuntimeContext`](crate::RuntimeContext), usually read
/// from a `wrml.yml` file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeConfig {
    /// Field whose value is a model's heap identity
    #[serde(default = "default_identity_field")]
    pub identity_field: String,

    /// Directories of schema documents, searched in order
    #[serde(default)]
    pub schema_paths: Vec<PathBuf>,

    /// Layer the built-in system schemas beneath the loaded ones
    #[serde(default = "default_true")]
    pub bootstrap: bool,

    // Internal: path to config file (for relative path resolution)
    #[serde(skip)]
    config_path: Option<PathBuf>,
}

fn default_identity_field() -> String {
    String::from("id")
}

fn default_true() -> bool {
    true
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            identity_field: default_identity_field(),
            schema_paths: Vec::new(),
            bootstrap: true,
            config_path: None,
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::from_yaml(&contents)?;

        // Store config file path for relative path resolution
        config.config_path = Some(path.to_path_buf());

        Ok(config)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(contents)?)
    }

    pub fn with_identity_field(mut self, field: impl Into<String>) -> Self {
        self.identity_field = field.into();
        self
    }

    pub fn with_schema_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.schema_paths.push(path.into());
        self
    }

    pub fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    /// Schema directories, resolved relative to the config file
    pub fn schema_dirs(&self) -> Vec<PathBuf> {
        self.schema_paths
            .iter()
            .map(|p| self.resolve_path(p))
            .collect()
    }

    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            return path.to_path_buf();
        }
        match self.config_path.as_deref().and_then(Path::parent) {
            Some(parent) => parent.join(path),
            None => path.to_path_buf(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_values() {
        let config = RuntimeConfig::from_yaml("{}").unwrap();
        assert_eq!(config, RuntimeConfig::default());
        assert_eq!(config.identity_field, "id");
        assert!(config.bootstrap);
        assert!(config.schema_paths.is_empty());
    }

    #[test]
    fn test_paths_resolve_against_config_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("wrml.yml");
        std::fs::write(
            &path,
            "identityField: uri\nbootstrap: false\nschemaPaths:\n  - schemas\n  - /opt/shared\n",
        )
        .unwrap();

        let config = RuntimeConfig::from_file(&path).unwrap();
        assert_eq!(config.identity_field, "uri");
        assert!(!config.bootstrap);
        assert_eq!(
            config.schema_dirs(),
            vec![dir.path().join("schemas"), PathBuf::from("/opt/shared")]
        );
    }

    #[test]
    fn test_parse_error() {
        let err = RuntimeConfig::from_yaml("identityField: [").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }
}
