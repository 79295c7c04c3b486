//! Export flow facade
//!
//! Ties plugin discovery, template resolution, validation jobs, status polling
//! and the redirect handoff together behind the operations a front end calls:
//! `index`, `select`, `create`, `validate` and `validation_status`.

use crate::config::ExportConfig;
use crate::content::ContentSource;
use crate::error::{ApiError, StorageError};
use crate::handoff::{HandoffContext, HandoffStore};
use crate::jobs::status::now_millis;
use crate::jobs::{
    JobQueue, JobStatusStore, JobStatusTracker, QueueConfig, StatusSnapshot, ValidationJob,
    ValidationJobRunner, ValidatorRegistry,
};
use crate::log::LogStore;
use crate::plugin::{ConfigCatalog, Plugin, PluginCatalog, PluginRegistry};
use crate::template::{TemplateResolver, TemplateSelection};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Where the export manager's plugin picker lives
pub const EXPORT_MANAGER_PATH: &str = "/export";
/// Where unexpected failures send the user
pub const UPLOAD_MANAGER_PATH: &str = "/upload";
/// Content source handed to plugins through the handoff
pub const CONTENT_SERVICE: &str = "project";

const UNKNOWN_PLUGIN_FLASH: &str = "Something fishy is going on...";
const SCHEDULING_FLASH: &str = "The validation could not be started. Please try again.";
const GENERIC_FLASH: &str = "Something went wrong while preparing the export. Please try again.";

/// One plugin as shown on the export index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginInfo {
    pub name: String,
    pub description: String,
    pub routes: BTreeMap<String, String>,
    pub templates: Vec<String>,
    /// Templates directory relative to the workspace root when it lies inside it
    pub templates_dir: String,
}

/// A validated plugin plus the template picked for it, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub plugin: Plugin,
    pub template: Option<TemplateSelection>,
    /// A template name was supplied but did not resolve
    pub template_rejected: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlashLevel {
    Notice,
    Alert,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub level: FlashLevel,
    pub message: String,
}

/// Result handed back to the front end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Redirect { to: String, flash: Option<Flash> },
}

impl Response {
    pub fn redirect(to: impl Into<String>) -> Self {
        Response::Redirect {
            to: to.into(),
            flash: None,
        }
    }

    pub fn redirect_with(to: impl Into<String>, level: FlashLevel, message: impl Into<String>) -> Self {
        Response::Redirect {
            to: to.into(),
            flash: Some(Flash {
                level,
                message: message.into(),
            }),
        }
    }

    pub fn location(&self) -> &str {
        match self {
            Response::Redirect { to, .. } => to,
        }
    }

    pub fn flash(&self) -> Option<&Flash> {
        match self {
            Response::Redirect { flash, .. } => flash.as_ref(),
        }
    }
}

/// Counts removed by [`ExportService::prune`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PruneReport {
    pub jobs: usize,
    pub log_records: usize,
}

pub struct ExportService {
    workspace_root: PathBuf,
    registry: PluginRegistry,
    resolver: TemplateResolver,
    queue: Arc<JobQueue>,
    statuses: Arc<JobStatusStore>,
    logs: Arc<LogStore>,
    runner: ValidationJobRunner,
    tracker: JobStatusTracker,
    handoff: HandoffStore,
    retention_ms: u64,
}

impl ExportService {
    /// Open the service with the plugin catalog taken from `config`.
    pub fn from_config(
        config: &ExportConfig,
        workspace_root: &Path,
        content: Arc<dyn ContentSource>,
    ) -> Result<Self, ApiError> {
        let catalog = Arc::new(ConfigCatalog::from_config(config, workspace_root));
        Self::open(
            config,
            workspace_root,
            catalog,
            content,
            ValidatorRegistry::with_builtins(),
        )
    }

    /// Open the sled store under the configured path and wire every component.
    pub fn open(
        config: &ExportConfig,
        workspace_root: &Path,
        catalog: Arc<dyn PluginCatalog>,
        content: Arc<dyn ContentSource>,
        validators: ValidatorRegistry,
    ) -> Result<Self, ApiError> {
        let store_path = config.storage.resolve_store_path(workspace_root);
        std::fs::create_dir_all(&store_path).map_err(StorageError::IoError)?;
        let db = sled::open(&store_path).map_err(|e| {
            StorageError::IoError(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("Failed to open sled database: {}", e),
            ))
        })?;

        let statuses = JobStatusStore::shared(db.clone())?;
        let logs = LogStore::shared(db)?;
        let queue = Arc::new(JobQueue::new(
            Arc::clone(&statuses),
            QueueConfig::from(&config.jobs),
        ));
        let runner = ValidationJobRunner::new(
            Arc::clone(&queue),
            Arc::clone(&logs),
            validators,
            content,
        );
        let tracker = JobStatusTracker::new(Arc::clone(&statuses), Arc::clone(&logs));

        info!(store = %store_path.display(), "Export service opened");
        Ok(Self {
            workspace_root: workspace_root.to_path_buf(),
            registry: PluginRegistry::new(catalog),
            resolver: TemplateResolver::new(),
            queue,
            statuses,
            logs,
            runner,
            tracker,
            handoff: HandoffStore::new(&config.handoff),
            retention_ms: config.jobs.retention_ms,
        })
    }

    /// Start background workers. Must be called within a tokio runtime.
    pub fn start(&self) -> Result<(), ApiError> {
        self.queue.start()
    }

    /// Stop workers after their current job and flush the store.
    pub async fn shutdown(&self) -> Result<(), ApiError> {
        self.queue.stop().await?;
        self.statuses.flush()?;
        self.logs.flush()?;
        Ok(())
    }

    pub fn queue(&self) -> &Arc<JobQueue> {
        &self.queue
    }

    pub fn handoff(&self) -> &HandoffStore {
        &self.handoff
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    /// Template basenames offered by one plugin.
    pub fn templates(&self, plugin: &str) -> Result<Vec<String>, ApiError> {
        let selection = self.select(plugin, None)?;
        self.resolver.list_templates(&selection.plugin)
    }

    /// Every export plugin with its routes and templates.
    pub fn index(&self) -> Result<Vec<PluginInfo>, ApiError> {
        self.registry
            .list_export_plugins()?
            .into_iter()
            .map(|plugin| {
                let templates = self.resolver.list_templates(&plugin)?;
                Ok(PluginInfo {
                    templates_dir: self.display_dir(&plugin.templates_dir),
                    name: plugin.name,
                    description: plugin.description,
                    routes: plugin.routes,
                    templates,
                })
            })
            .collect()
    }

    /// Validate a client supplied plugin name and optional template name.
    ///
    /// An unknown plugin fails before any template or job work happens. A
    /// template that does not resolve is dropped: the selection then carries no
    /// template and `template_rejected` is set.
    pub fn select(&self, plugin: &str, template: Option<&str>) -> Result<Selection, ApiError> {
        // Refresh so plugins installed since the last call are seen
        self.registry.list_export_plugins()?;
        let plugin = self.registry.get_or_error(plugin)?;

        let Some(name) = template else {
            return Ok(Selection {
                plugin,
                template: None,
                template_rejected: false,
            });
        };
        match self.resolver.resolve(&plugin, name) {
            Ok(selection) => Ok(Selection {
                plugin,
                template: Some(selection),
                template_rejected: false,
            }),
            Err(ApiError::TemplateRejected) => Ok(Selection {
                plugin,
                template: None,
                template_rejected: true,
            }),
            Err(other) => Err(other),
        }
    }

    /// Hand the selection to the plugin's `route` and redirect there with a
    /// one-time token.
    pub fn create(
        &self,
        plugin: &str,
        template: Option<&str>,
        route: &str,
    ) -> Result<Response, ApiError> {
        let selection = self.select(plugin, template)?;
        let path = selection
            .plugin
            .route(route)
            .ok_or_else(|| ApiError::UnknownRoute {
                plugin: selection.plugin.name.clone(),
                route: route.to_string(),
            })?
            .to_string();

        let context = HandoffContext {
            plugin: selection.plugin.name.clone(),
            route: route.to_string(),
            template: selection.template.as_ref().map(|t| t.template.clone()),
            template_path: selection.template.as_ref().map(|t| t.path.clone()),
            content_service: CONTENT_SERVICE.to_string(),
        };
        let token = self.handoff.issue(context)?;
        let separator = if path.contains('?') { '&' } else { '?' };
        let to = format!("{}{}token={}", path, separator, token);

        info!(plugin = %selection.plugin.name, route = %route, "Handing off to plugin export");
        if selection.template_rejected {
            Ok(Response::redirect_with(
                to,
                FlashLevel::Alert,
                "The selected template is not available; continuing without one.",
            ))
        } else {
            Ok(Response::redirect(to))
        }
    }

    /// Start a pre-export validation for the plugin and template.
    pub fn validate(&self, plugin: &str, template: &str) -> Result<ValidationJob, ApiError> {
        let selection = self.select(plugin, Some(template))?;
        let template = selection.template.ok_or(ApiError::TemplateRejected)?;
        self.runner.start(&selection.plugin, &template.template)
    }

    /// Poll a validation job. Never fails for an unknown job id.
    pub fn validation_status(
        &self,
        job_id: &str,
        log_uid: u64,
        after: u64,
    ) -> Result<StatusSnapshot, ApiError> {
        self.tracker.poll(job_id, log_uid, after)
    }

    /// Remove finished jobs older than the retention window, with their logs.
    pub fn prune(&self, now_ms: u64) -> Result<PruneReport, ApiError> {
        let removed = self.statuses.prune_finished(self.retention_ms, now_ms)?;
        let mut report = PruneReport {
            jobs: removed.len(),
            log_records: 0,
        };
        for record in removed {
            if let Some(uid) = record.options.get("log_uid").and_then(|v| v.as_u64()) {
                report.log_records += self.logs.delete_uid(uid)?;
            }
        }
        if report.jobs > 0 {
            info!(jobs = report.jobs, log_records = report.log_records, "Pruned finished validation jobs");
        }
        Ok(report)
    }

    pub fn prune_now(&self) -> Result<PruneReport, ApiError> {
        self.prune(now_millis())
    }

    /// Turn a failed front-end operation into a redirect with a flash message.
    pub fn rescue(result: Result<Response, ApiError>) -> Response {
        match result {
            Ok(response) => response,
            Err(err) => Self::rescue_error(&err),
        }
    }

    pub fn rescue_error(err: &ApiError) -> Response {
        match err {
            ApiError::UnknownPlugin(_) => {
                warn!(error = %err, "Rejected unknown export plugin");
                Response::redirect_with(EXPORT_MANAGER_PATH, FlashLevel::Alert, UNKNOWN_PLUGIN_FLASH)
            }
            ApiError::TemplateRejected | ApiError::UnknownRoute { .. } => {
                warn!(error = %err, "Rejected export selection");
                Response::redirect_with(EXPORT_MANAGER_PATH, FlashLevel::Alert, err.to_string())
            }
            ApiError::Scheduling(_) => {
                warn!(error = %err, "Validation job not scheduled");
                Response::redirect_with(EXPORT_MANAGER_PATH, FlashLevel::Error, SCHEDULING_FLASH)
            }
            _ => {
                error!(error = %err, "Export flow failed");
                Response::redirect_with(UPLOAD_MANAGER_PATH, FlashLevel::Error, GENERIC_FLASH)
            }
        }
    }

    fn display_dir(&self, dir: &Path) -> String {
        let root = dunce::canonicalize(&self.workspace_root).unwrap_or_else(|_| self.workspace_root.clone());
        let dir = dunce::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf());
        match dir.strip_prefix(&root) {
            Ok(relative) => format!("/{}", relative.display()),
            Err(_) => dir.display().to_string(),
        }
    }
}
