//! Plugin catalog: the external source of installed components.

use crate::config::ExportConfig;
use crate::error::ApiError;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// One component as the catalog reports it. Several components may belong to
/// the same owning module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogComponent {
    pub name: String,
    pub module: String,
    pub description: String,
    pub capabilities: Vec<String>,
    pub routes: BTreeMap<String, String>,
    pub templates_dir: PathBuf,
    pub validators: Vec<String>,
}

impl CatalogComponent {
    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|c| c == capability)
    }
}

/// Source of installed components.
///
/// Implementations return [`ApiError::Discovery`] when the catalog cannot be read.
pub trait PluginCatalog: Send + Sync {
    fn components(&self) -> Result<Vec<CatalogComponent>, ApiError>;
}

/// Catalog backed by the `[plugins.*]` tables of the configuration.
pub struct ConfigCatalog {
    components: Vec<CatalogComponent>,
}

impl ConfigCatalog {
    /// Build the catalog. Each plugin's templates live in
    /// `<templates_root>/<plugin name>` unless the entry overrides `templates_dir`.
    pub fn from_config(config: &ExportConfig, workspace_root: &Path) -> Self {
        let templates_root = config.resolve_templates_root(workspace_root);
        let mut components: Vec<CatalogComponent> = config
            .plugins
            .iter()
            .map(|(name, entry)| {
                let module = entry.module.clone().unwrap_or_else(|| name.clone());
                let templates_dir = match &entry.templates_dir {
                    Some(dir) if dir.is_absolute() => dir.clone(),
                    Some(dir) => workspace_root.join(dir),
                    None => templates_root.join(&module),
                };
                CatalogComponent {
                    name: name.clone(),
                    module,
                    description: entry.description.clone(),
                    capabilities: entry.capabilities.clone(),
                    routes: entry.routes.clone(),
                    templates_dir,
                    validators: entry.validators.clone(),
                }
            })
            .collect();
        components.sort_by(|a, b| a.name.cmp(&b.name));
        Self { components }
    }
}

impl PluginCatalog for ConfigCatalog {
    fn components(&self) -> Result<Vec<CatalogComponent>, ApiError> {
        Ok(self.components.clone())
    }
}

/// Fixed in-process catalog, for embedders registering plugins in code.
#[derive(Default)]
pub struct StaticCatalog {
    components: Vec<CatalogComponent>,
}

impl StaticCatalog {
    pub fn new(components: Vec<CatalogComponent>) -> Self {
        Self { components }
    }

    pub fn with(mut self, component: CatalogComponent) -> Self {
        self.components.push(component);
        self
    }
}

impl PluginCatalog for StaticCatalog {
    fn components(&self) -> Result<Vec<CatalogComponent>, ApiError> {
        Ok(self.components.clone())
    }
}
