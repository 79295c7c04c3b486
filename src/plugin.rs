//! Export plugins
//!
//! A plugin is a statically registered capability descriptor: a stable name, a
//! description, the named routes its own export flow answers on, the directory
//! holding its report templates and the validators it wants run before export.
//! Nothing here loads or evaluates plugin code.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

pub mod catalog;
pub mod registry;

pub use catalog::{CatalogComponent, ConfigCatalog, PluginCatalog, StaticCatalog};
pub use registry::PluginRegistry;

/// Capability a catalog component must declare to be offered as an exporter
pub const EXPORT_CAPABILITY: &str = "export";

/// An installed export plugin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plugin {
    /// Unique among registered plugins
    pub name: String,
    pub description: String,
    /// Named routes of the plugin's own export flow (name -> path)
    pub routes: BTreeMap<String, String>,
    /// Absolute directory holding this plugin's templates
    pub templates_dir: PathBuf,
    /// Validator names to run; empty means every registered validator
    pub validators: Vec<String>,
}

impl Plugin {
    /// Look up one of the plugin's named routes.
    pub fn route(&self, name: &str) -> Option<&str> {
        self.routes.get(name).map(String::as_str)
    }
}
