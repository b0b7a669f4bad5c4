//! Schema documents loaded from disk

use super::SchemaSource;
use crate::error::SchemaSourceError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;
use wrml_types::{Schema, SchemaId};

/// Serves schema documents read from `*.json`, `*.yaml` and `*.yml` files
///
/// Files are read once, eagerly, at construction. Each file holds one
/// schema document; its `id` field is authoritative, not its file name.
#[derive(Debug, Default)]
pub struct DirectorySchemaSource {
    roots: Vec<PathBuf>,
    schemas: HashMap<SchemaId, Arc<Schema>>,
    origins: HashMap<SchemaId, PathBuf>,
}

impl DirectorySchemaSource {
    /// Load every schema document beneath `root`
    pub fn open(root: impl AsRef<Path>) -> Result<Self, SchemaSourceError> {
        Self::open_all([root])
    }

    /// Load every schema document beneath each of `roots`
    pub fn open_all<I, P>(roots: I) -> Result<Self, SchemaSourceError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut source = Self::default();
        for root in roots {
            source.load_dir(root.as_ref())?;
        }
        Ok(source)
    }

    fn load_dir(&mut self, root: &Path) -> Result<(), SchemaSourceError> {
        let mut files: Vec<PathBuf> = Vec::new();
        for entry in WalkDir::new(root).follow_links(true) {
            let entry = entry.map_err(|e| SchemaSourceError::Io {
                path: e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf()),
                source: e
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("directory walk failed")),
            })?;
            if entry.file_type().is_file() && schema_format(entry.path()).is_some() {
                files.push(entry.into_path());
            }
        }
        // Stable order so duplicate reports name the same pair every run
        files.sort();

        for path in files {
            let schema = read_schema(&path)?;
            self.insert(schema, path)?;
        }

        tracing::debug!(root = %root.display(), schemas = self.schemas.len(), "loaded schema directory");
        self.roots.push(root.to_path_buf());
        Ok(())
    }

    fn insert(&mut self, schema: Schema, path: PathBuf) -> Result<(), SchemaSourceError> {
        if let Some(first) = self.origins.get(&schema.id) {
            return Err(SchemaSourceError::Duplicate {
                id: schema.id.clone(),
                first: first.clone(),
                second: path,
            });
        }
        self.origins.insert(schema.id.clone(), path);
        self.schemas.insert(schema.id.clone(), Arc::new(schema));
        Ok(())
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// File a schema was loaded from
    pub fn origin(&self, id: &SchemaId) -> Option<&Path> {
        self.origins.get(id).map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

impl SchemaSource for DirectorySchemaSource {
    fn get_schema(&self, id: &SchemaId) -> Result<Arc<Schema>, SchemaSourceError> {
        self.schemas
            .get(id)
            .cloned()
            .ok_or_else(|| SchemaSourceError::NotFound(id.clone()))
    }

    fn has_schema(&self, id: &SchemaId) -> bool {
        self.schemas.contains_key(id)
    }

    fn source_name(&self) -> &str {
        "directory"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SchemaFormat {
    Json,
    Yaml,
}

fn schema_format(path: &Path) -> Option<SchemaFormat> {
    match path.extension()?.to_str()? {
        "json" => Some(SchemaFormat::Json),
        "yaml" | "yml" => Some(SchemaFormat::Yaml),
        _ => None,
    }
}

fn read_schema(path: &Path) -> Result<Schema, SchemaSourceError> {
    let contents = std::fs::read_to_string(path).map_err(|source| SchemaSourceError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    match schema_format(path) {
        Some(SchemaFormat::Yaml) => {
            serde_yaml::from_str(&contents).map_err(|source| SchemaSourceError::Yaml {
                path: path.to_path_buf(),
                source,
            })
        }
        _ => serde_json::from_str(&contents).map_err(|source| SchemaSourceError::Json {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;
    use wrml_types::Value;

    #[test]
    fn test_load_json_and_yaml() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("document.json"),
            r#"{ "id": "urn:test:Document", "fields": [ { "name": "id", "kind": "text", "readOnly": true } ] }"#,
        )
        .unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(
            dir.path().join("nested/story.yaml"),
            "id: urn:test:Story\nbaseSchemaIds:\n  - \"urn:test:Document\"\nfields:\n  - name: title\n    kind: text\n",
        )
        .unwrap();
        fs::write(dir.path().join("README.md"), "not a schema").unwrap();

        let source = DirectorySchemaSource::open(dir.path()).unwrap();
        assert_eq!(source.len(), 2);

        let story = source.get_schema(&SchemaId::new("urn:test:Story")).unwrap();
        assert_eq!(story.base_schema_ids, vec![SchemaId::new("urn:test:Document")]);
        assert!(story.fields.contains_key("title"));

        let document = source.get_schema(&SchemaId::new("urn:test:Document")).unwrap();
        assert!(document.fields["id"].read_only);
        assert!(source
            .origin(&SchemaId::new("urn:test:Document"))
            .unwrap()
            .ends_with("document.json"));
    }

    #[test]
    fn test_plain_defaults_read_back() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("counter.json"),
            r#"{ "id": "urn:test:Counter", "fields": [ { "name": "enabled", "kind": "boolean", "defaultValue": true } ] }"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("gauge.yaml"),
            "id: urn:test:Gauge\nbaseSchemaIds:\n  - \"urn:test:Counter\"\nfields:\n  - name: level\n    kind: integer\n    defaultValue: 3\n  - name: unit\n    kind: choice\n    choices: [cm, mm]\n    defaultValue: mm\n",
        )
        .unwrap();

        let context = crate::RuntimeContext::new(Arc::new(DirectorySchemaSource::open(dir.path()).unwrap()));
        let gauge = context.new_model(&SchemaId::new("urn:test:Gauge")).unwrap();
        let gauge = gauge.read();
        assert_eq!(gauge.get_field_value("level"), Value::Integer(3));
        assert_eq!(gauge.get_field_value("enabled"), Value::Boolean(true));
        assert_eq!(gauge.get_field_value("unit"), Value::Choice("mm".to_string()));
    }

    #[test]
    fn test_default_of_wrong_kind_rejected() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("bad.yml"),
            "id: urn:test:Bad\nfields:\n  - name: level\n    kind: integer\n    defaultValue: high\n",
        )
        .unwrap();

        let err = DirectorySchemaSource::open(dir.path()).unwrap_err();
        assert!(matches!(err, SchemaSourceError::Yaml { .. }));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.json"), r#"{ "id": "urn:test:A" }"#).unwrap();
        fs::write(dir.path().join("b.yml"), "id: urn:test:A\n").unwrap();

        let err = DirectorySchemaSource::open(dir.path()).unwrap_err();
        assert!(matches!(err, SchemaSourceError::Duplicate { .. }));
    }

    #[test]
    fn test_malformed_document() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("broken.json"), "{ not json").unwrap();

        let err = DirectorySchemaSource::open(dir.path()).unwrap_err();
        assert!(matches!(err, SchemaSourceError::Json { .. }));
    }
}
