use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    SerdeJSONError(#[from] serde_json::Error),
    #[error("Unknown model \"{0}\"")]
    UnknownModel(String),
}

/// One operator node as reported by the upstream model parser.
///
/// There is no operator-type field; the type is inferred from the shape of
/// the record by [`crate::classifier`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerRecord {
    pub id: i64,
    #[serde(rename = "inputs", default)]
    pub input_tensors: Vec<String>,
    #[serde(rename = "outputs", default)]
    pub output_tensors: Vec<String>,
    #[serde(rename = "attributes", default)]
    pub attribute_names: Vec<String>,
}

impl LayerRecord {
    pub fn new(
        id: i64,
        input_tensors: &[&str],
        output_tensors: &[&str],
        attribute_names: &[&str],
    ) -> Self {
        Self {
            id,
            input_tensors: input_tensors.iter().map(|x| x.to_string()).collect(),
            output_tensors: output_tensors.iter().map(|x| x.to_string()).collect(),
            attribute_names: attribute_names.iter().map(|x| x.to_string()).collect(),
        }
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute_names.iter().any(|x| x == name)
    }
}

/// Per-model metadata: the flat layer list plus the declared graph boundary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub outputs: Vec<String>,
    #[serde(default)]
    pub layers: Vec<LayerRecord>,
    #[serde(rename = "fileName", default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub producer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCatalogEntry {
    pub id: u64,
    pub file_name: String,
    pub metadata_json: ModelMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogFile {
    Entries(Vec<ModelCatalogEntry>),
    Single(ModelMetadata),
}

/// The set of models available for selection, in provider order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelCatalog {
    entries: Vec<ModelCatalogEntry>,
}

impl ModelCatalog {
    pub fn new(entries: Vec<ModelCatalogEntry>) -> Self {
        Self { entries }
    }

    /// Accepts either a list of catalog entries or a bare metadata object,
    /// the latter becoming a single entry named after `fallback_name`.
    pub fn from_json_str(json: &str, fallback_name: &str) -> Result<Self, MetadataError> {
        let catalog = match serde_json::from_str::<CatalogFile>(json)? {
            CatalogFile::Entries(entries) => Self::new(entries),
            CatalogFile::Single(metadata) => {
                let file_name = metadata
                    .file_name
                    .clone()
                    .unwrap_or_else(|| fallback_name.to_string());
                Self::new(vec![ModelCatalogEntry {
                    id: 0,
                    file_name,
                    metadata_json: metadata,
                    uploaded_at: None,
                }])
            }
        };
        log::debug!("Loaded catalog with {} models", catalog.entries.len());
        Ok(catalog)
    }

    pub fn load(path: &Path) -> Result<Self, MetadataError> {
        let fallback_name = path
            .file_stem()
            .and_then(|x| x.to_str())
            .unwrap_or_default()
            .to_string();
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json, &fallback_name)
    }

    pub fn entries(&self) -> &[ModelCatalogEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn first(&self) -> Option<&ModelCatalogEntry> {
        self.entries.first()
    }

    pub fn get(&self, file_name: &str) -> Result<&ModelCatalogEntry, MetadataError> {
        self.entries
            .iter()
            .find(|x| x.file_name == file_name)
            .ok_or_else(|| MetadataError::UnknownModel(file_name.to_string()))
    }
}
