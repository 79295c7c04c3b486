//! Plugin registry: export-capable plugins indexed by name.

use crate::error::ApiError;
use crate::plugin::catalog::{CatalogComponent, PluginCatalog};
use crate::plugin::{Plugin, EXPORT_CAPABILITY};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Registry of export plugins.
///
/// Holds the snapshot taken by the last [`PluginRegistry::list_export_plugins`]
/// call; [`PluginRegistry::find_by_name`] answers from that snapshot.
pub struct PluginRegistry {
    catalog: Arc<dyn PluginCatalog>,
    plugins: RwLock<BTreeMap<String, Plugin>>,
}

impl PluginRegistry {
    pub fn new(catalog: Arc<dyn PluginCatalog>) -> Self {
        Self {
            catalog,
            plugins: RwLock::new(BTreeMap::new()),
        }
    }

    /// Query the catalog for export-capable components, collapse them to their
    /// owning module and return the plugins sorted by name.
    pub fn list_export_plugins(&self) -> Result<Vec<Plugin>, ApiError> {
        let components = self.catalog.components()?;
        let plugins = collapse_by_module(components);
        debug!(count = plugins.len(), "Discovered export plugins");

        let listed: Vec<Plugin> = plugins.values().cloned().collect();
        *self.plugins.write() = plugins;
        Ok(listed)
    }

    /// Exact-name lookup against the last listed snapshot.
    pub fn find_by_name(&self, name: &str) -> Option<Plugin> {
        self.plugins.read().get(name).cloned()
    }

    /// Exact-name lookup, refreshing the snapshot first if nothing was listed yet.
    pub fn get_or_error(&self, name: &str) -> Result<Plugin, ApiError> {
        if self.plugins.read().is_empty() {
            self.list_export_plugins()?;
        }
        self.find_by_name(name).ok_or_else(|| {
            warn!(plugin = %name, "Rejected unknown export plugin");
            ApiError::UnknownPlugin(name.to_string())
        })
    }
}

fn collapse_by_module(components: Vec<CatalogComponent>) -> BTreeMap<String, Plugin> {
    let mut plugins: BTreeMap<String, Plugin> = BTreeMap::new();
    for component in components
        .into_iter()
        .filter(|c| c.has_capability(EXPORT_CAPABILITY))
    {
        match plugins.get_mut(&component.module) {
            Some(existing) => {
                if existing.description.is_empty() {
                    existing.description = component.description;
                }
                for (route, path) in component.routes {
                    existing.routes.entry(route).or_insert(path);
                }
                for validator in component.validators {
                    if !existing.validators.contains(&validator) {
                        existing.validators.push(validator);
                    }
                }
            }
            None => {
                plugins.insert(
                    component.module.clone(),
                    Plugin {
                        name: component.module,
                        description: component.description,
                        routes: component.routes,
                        templates_dir: component.templates_dir,
                        validators: component.validators,
                    },
                );
            }
        }
    }
    plugins
}
