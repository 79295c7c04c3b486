//! Project content inspected by pre-export validators.
//!
//! Content is a flat list of items (issues, evidence, notes, ...) each with a
//! title and free-form fields. It is loaded from a JSON document:
//!
//! ```json
//! { "items": [ { "kind": "issue", "title": "XSS", "fields": { "Severity": "High" } } ],
//!   "required_fields": { "issue": ["Severity"] } }
//! ```

use crate::error::ApiError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    pub kind: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectContent {
    #[serde(default)]
    pub items: Vec<ContentItem>,
    /// Field names every item of a kind must fill in
    #[serde(default)]
    pub required_fields: BTreeMap<String, Vec<String>>,
}

impl ProjectContent {
    pub fn from_json(raw: &str) -> Result<Self, ApiError> {
        serde_json::from_str(raw)
            .map_err(|e| ApiError::ContentError(format!("invalid project content: {}", e)))
    }

    pub fn load(path: &Path) -> Result<Self, ApiError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ApiError::ContentError(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&raw)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn with_item(mut self, item: ContentItem) -> Self {
        self.items.push(item);
        self
    }

    pub fn require(mut self, kind: &str, field: &str) -> Self {
        self.required_fields
            .entry(kind.to_string())
            .or_default()
            .push(field.to_string());
        self
    }

    /// Required fields missing or blank on `item`.
    pub fn missing_fields(&self, item: &ContentItem) -> Vec<String> {
        self.required_fields
            .get(&item.kind)
            .map(|fields| {
                fields
                    .iter()
                    .filter(|f| item.fields.get(*f).map_or(true, |v| v.trim().is_empty()))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl ContentItem {
    pub fn new(kind: &str, title: &str) -> Self {
        Self {
            kind: kind.to_string(),
            title: title.to_string(),
            fields: BTreeMap::new(),
        }
    }

    pub fn field(mut self, name: &str, value: &str) -> Self {
        self.fields.insert(name.to_string(), value.to_string());
        self
    }
}

/// Where a validation job reads project content from. Called from the
/// background worker, never from the request path.
pub trait ContentSource: Send + Sync {
    fn load(&self) -> Result<ProjectContent, ApiError>;
}

/// Content held in memory.
pub struct StaticContent(pub ProjectContent);

impl ContentSource for StaticContent {
    fn load(&self) -> Result<ProjectContent, ApiError> {
        Ok(self.0.clone())
    }
}

/// Content read from a JSON file each time a job runs.
pub struct JsonFileContent {
    path: PathBuf,
}

impl JsonFileContent {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ContentSource for JsonFileContent {
    fn load(&self) -> Result<ProjectContent, ApiError> {
        ProjectContent::load(&self.path)
    }
}
