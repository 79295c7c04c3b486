//! Config loader: the single entry point that assembles every source.

use super::merge_policy::builder_with_defaults;
use super::sources::{environment, global_file, workspace_file};
use super::ExportConfig;
use crate::error::ApiError;
use config::File;
use std::path::Path;
use tracing::debug;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for a workspace.
    ///
    /// Precedence (highest last): defaults, user config file, workspace
    /// `config/config.toml`, workspace `config/{EXPORT_ENV}.toml`, environment.
    pub fn load(workspace_root: &Path) -> Result<ExportConfig, ApiError> {
        let builder = builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = workspace_file::add_to_builder(builder, workspace_root)?;
        let builder = environment::add_to_builder(builder);

        let config: ExportConfig = builder.build()?.try_deserialize()?;
        debug!(
            workspace = %workspace_root.display(),
            plugins = config.plugins.len(),
            "Configuration loaded"
        );
        config.validated()
    }

    /// Load configuration from one explicit file, skipping the user and workspace files.
    pub fn load_from_file(path: &Path) -> Result<ExportConfig, ApiError> {
        if !path.exists() {
            return Err(ApiError::ConfigError(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        let builder = builder_with_defaults()?.add_source(File::from(path.to_path_buf()));
        let builder = environment::add_to_builder(builder);
        let config: ExportConfig = builder.build()?.try_deserialize()?;
        config.validated()
    }
}
