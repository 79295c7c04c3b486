//! CLI route: one table from parsed commands to the export service.

use crate::config::{ConfigLoader, ExportConfig};
use crate::content::JsonFileContent;
use crate::error::{ApiError, StorageError};
use crate::export::ExportService;
use crate::jobs::{StatusSnapshot, ValidationJob};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::cli::output::{
    format_job_text, format_log_lines, format_plugins_text, format_prune_text,
    format_response_text, format_selection_text, format_snapshot_text, format_templates_text,
    to_json,
};
use crate::cli::parse::{Commands, OutputFormat};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Default project content location, relative to the workspace root
pub const DEFAULT_CONTENT_PATH: &str = ".export-manager/content.json";

/// Runtime context for CLI execution: workspace, loaded config and the async runtime.
pub struct RunContext {
    workspace_root: PathBuf,
    config: ExportConfig,
    format: OutputFormat,
    runtime: tokio::runtime::Runtime,
}

impl RunContext {
    /// Load configuration (explicit file, else layered sources) and build the runtime.
    pub fn new(
        workspace_root: PathBuf,
        config_path: Option<PathBuf>,
        format: OutputFormat,
    ) -> Result<Self, ApiError> {
        let config = match config_path {
            Some(ref path) => ConfigLoader::load_from_file(path)?,
            None => ConfigLoader::load(&workspace_root)?,
        }
        .validated()?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(config.jobs.workers.max(1))
            .enable_all()
            .build()
            .map_err(StorageError::IoError)?;

        Ok(Self {
            workspace_root,
            config,
            format,
            runtime,
        })
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Execute a CLI command via the single route table.
    pub fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        match command {
            Commands::Plugins => {
                let plugins = self.service(None)?.index()?;
                match self.format {
                    OutputFormat::Json => to_json(&plugins),
                    OutputFormat::Text => Ok(format_plugins_text(&plugins)),
                }
            }
            Commands::Templates { plugin } => {
                let templates = self.service(None)?.templates(plugin)?;
                match self.format {
                    OutputFormat::Json => to_json(&json!({ "plugin": plugin, "templates": templates })),
                    OutputFormat::Text => Ok(format_templates_text(plugin, &templates)),
                }
            }
            Commands::Resolve { plugin, template } => {
                let selection = self.service(None)?.select(plugin, Some(template))?;
                let resolved = selection.template.ok_or(ApiError::TemplateRejected)?;
                match self.format {
                    OutputFormat::Json => to_json(&resolved),
                    OutputFormat::Text => Ok(format_selection_text(&resolved)),
                }
            }
            Commands::Validate {
                plugin,
                template,
                content,
                wait,
            } => self.handle_validate(plugin, template, content.as_deref(), *wait),
            Commands::Status {
                job_id,
                log_uid,
                after,
            } => {
                let snapshot = self
                    .service(None)?
                    .validation_status(job_id, *log_uid, *after)?;
                self.render_snapshot(&snapshot)
            }
            Commands::Export {
                plugin,
                template,
                route,
            } => {
                let service = self.service(None)?;
                let response = ExportService::rescue(service.create(
                    plugin,
                    template.as_deref(),
                    route,
                ));
                match self.format {
                    OutputFormat::Json => to_json(&response),
                    OutputFormat::Text => Ok(format_response_text(&response)),
                }
            }
            Commands::Config => match self.format {
                OutputFormat::Json => to_json(&self.config),
                OutputFormat::Text => toml::to_string_pretty(&self.config)
                    .map_err(|e| ApiError::ConfigError(format!("Failed to render config: {}", e))),
            },
            Commands::Prune => {
                let report = self.service(None)?.prune_now()?;
                match self.format {
                    OutputFormat::Json => to_json(&report),
                    OutputFormat::Text => Ok(format_prune_text(&report)),
                }
            }
        }
    }

    fn service(&self, content: Option<&Path>) -> Result<ExportService, ApiError> {
        let content_path = content
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.workspace_root.join(DEFAULT_CONTENT_PATH));
        debug!(content = %content_path.display(), "Opening export service");
        ExportService::from_config(
            &self.config,
            &self.workspace_root,
            Arc::new(JsonFileContent::new(content_path)),
        )
    }

    /// Start a job and keep the process alive until the queue drains, since
    /// workers live in this process. With `wait`, log records are printed as
    /// they arrive.
    fn handle_validate(
        &self,
        plugin: &str,
        template: &str,
        content: Option<&Path>,
        wait: bool,
    ) -> Result<String, ApiError> {
        let service = self.service(content)?;
        self.runtime.block_on(async {
            service.start()?;
            let outcome = self.run_validation(&service, plugin, template, wait).await;
            service.shutdown().await?;
            outcome
        })
    }

    async fn run_validation(
        &self,
        service: &ExportService,
        plugin: &str,
        template: &str,
        wait: bool,
    ) -> Result<String, ApiError> {
        let job = service.validate(plugin, template)?;
        info!(job_id = %job.job_id, log_uid = job.log_uid, "Validation started from CLI");

        if !wait {
            service.queue().wait_idle(None).await?;
            return self.render_job(&job);
        }

        if self.format == OutputFormat::Text {
            println!("{}", format_job_text(&job));
        }
        let mut cursor = 0;
        loop {
            let snapshot = service.validation_status(&job.job_id, job.log_uid, cursor)?;
            if self.format == OutputFormat::Text && !snapshot.logs().is_empty() {
                println!("{}", format_log_lines(snapshot.logs()));
            }
            cursor = snapshot.next_cursor(cursor);
            if snapshot.is_terminal() {
                let last = service.validation_status(&job.job_id, job.log_uid, 0)?;
                return match self.format {
                    OutputFormat::Json => to_json(&last),
                    OutputFormat::Text => Ok(format!("Validation {}.", last.status())),
                };
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    fn render_job(&self, job: &ValidationJob) -> Result<String, ApiError> {
        match self.format {
            OutputFormat::Json => to_json(job),
            OutputFormat::Text => Ok(format_job_text(job)),
        }
    }

    fn render_snapshot(&self, snapshot: &StatusSnapshot) -> Result<String, ApiError> {
        match self.format {
            OutputFormat::Json => to_json(snapshot),
            OutputFormat::Text => Ok(format_snapshot_text(snapshot)),
        }
    }
}
