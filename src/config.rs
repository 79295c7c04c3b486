//! Configuration System
//!
//! Layered configuration for the export manager: merge-policy defaults, the
//! user-level config file, workspace config files and `EXPORT__*` environment
//! overrides, in increasing precedence.

use crate::error::ApiError;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

mod facade;
mod merge_policy;
mod sources;

pub use facade::ConfigLoader;
pub use sources::global_file::global_config_path;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Directory holding one templates sub-directory per plugin
    #[serde(default = "default_templates_root")]
    pub templates_root: PathBuf,

    /// The plugin catalog, keyed by component name
    #[serde(default)]
    pub plugins: HashMap<String, PluginEntry>,

    /// Background validation jobs
    #[serde(default)]
    pub jobs: JobsConfig,

    /// Storage paths
    #[serde(default)]
    pub storage: StorageConfig,

    /// Export handoff limits
    #[serde(default)]
    pub handoff: HandoffConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// A component entry in the plugin catalog
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginEntry {
    /// Owning module; several components of one module collapse into one plugin.
    /// Defaults to the component name.
    #[serde(default)]
    pub module: Option<String>,

    #[serde(default)]
    pub description: String,

    /// Declared capabilities, e.g. `export`
    #[serde(default)]
    pub capabilities: Vec<String>,

    /// Named export routes (name -> path)
    #[serde(default)]
    pub routes: BTreeMap<String, String>,

    /// Overrides `<templates_root>/<plugin name>`
    #[serde(default)]
    pub templates_dir: Option<PathBuf>,

    /// Validator names to run before export; empty runs every registered validator
    #[serde(default)]
    pub validators: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    /// Number of background worker tasks
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Jobs waiting beyond this are refused with a scheduling error
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,

    /// Finished jobs older than this are pruned
    #[serde(default = "default_retention_ms")]
    pub retention_ms: u64,
}

fn default_workers() -> usize {
    2
}

fn default_max_queue_size() -> usize {
    64
}

fn default_retention_ms() -> u64 {
    1000 * 60 * 60 * 24 * 14
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            max_queue_size: default_max_queue_size(),
            retention_ms: default_retention_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// sled database holding job status and validation logs
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
}

fn default_store_path() -> PathBuf {
    PathBuf::from(".export-manager/store")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
        }
    }
}

impl StorageConfig {
    /// Resolve the store path against the workspace root.
    pub fn resolve_store_path(&self, workspace_root: &Path) -> PathBuf {
        resolve_against(workspace_root, &self.store_path)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandoffConfig {
    /// How long an issued handoff token stays redeemable
    #[serde(default = "default_handoff_ttl_ms")]
    pub ttl_ms: u64,

    /// Maximum serialized size of one handoff context
    #[serde(default = "default_handoff_max_bytes")]
    pub max_bytes: usize,
}

fn default_handoff_ttl_ms() -> u64 {
    60_000
}

fn default_handoff_max_bytes() -> usize {
    4096
}

impl Default for HandoffConfig {
    fn default() -> Self {
        Self {
            ttl_ms: default_handoff_ttl_ms(),
            max_bytes: default_handoff_max_bytes(),
        }
    }
}

fn default_templates_root() -> PathBuf {
    PathBuf::from("templates/reports")
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            templates_root: default_templates_root(),
            plugins: HashMap::new(),
            jobs: JobsConfig::default(),
            storage: StorageConfig::default(),
            handoff: HandoffConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ExportConfig {
    /// Templates root resolved against the workspace root.
    pub fn resolve_templates_root(&self, workspace_root: &Path) -> PathBuf {
        resolve_against(workspace_root, &self.templates_root)
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.templates_root.as_os_str().is_empty() {
            errors.push(ValidationError::System(
                "templates_root cannot be empty".to_string(),
            ));
        }
        if self.storage.store_path.as_os_str().is_empty() {
            errors.push(ValidationError::System(
                "storage.store_path cannot be empty".to_string(),
            ));
        }
        if self.jobs.workers == 0 {
            errors.push(ValidationError::Jobs("workers must be at least 1".to_string()));
        }
        if self.jobs.max_queue_size == 0 {
            errors.push(ValidationError::Jobs(
                "max_queue_size must be at least 1".to_string(),
            ));
        }
        if self.handoff.max_bytes == 0 {
            errors.push(ValidationError::System(
                "handoff.max_bytes must be at least 1".to_string(),
            ));
        }

        for (name, entry) in &self.plugins {
            let plugin_name = entry.module.as_deref().unwrap_or(name);
            if plugin_name.trim().is_empty() {
                errors.push(ValidationError::Plugin(
                    name.clone(),
                    "plugin name cannot be empty".to_string(),
                ));
            } else if plugin_name.contains(['/', '\\']) || plugin_name == ".." {
                errors.push(ValidationError::Plugin(
                    name.clone(),
                    "plugin name cannot contain path separators".to_string(),
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate and fold the error list into a single `ApiError`.
    pub fn validated(self) -> Result<Self, ApiError> {
        self.validate().map_err(|errors| {
            let error_msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            ApiError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                error_msgs.join("\n")
            ))
        })?;
        Ok(self)
    }
}

fn resolve_against(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

/// Configuration validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    Plugin(String, String),
    Jobs(String),
    System(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Plugin(name, msg) => write!(f, "Plugin '{}': {}", name, msg),
            ValidationError::Jobs(msg) => write!(f, "Jobs: {}", msg),
            ValidationError::System(msg) => write!(f, "System: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}
