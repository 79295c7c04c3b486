//! Validation job runner
//!
//! Starts a pre-export validation as a background job. The job's log uid is
//! allocated up front, an "enqueueing" record is written so pollers see
//! progress immediately, and the caller gets the job back without waiting.
//! All log appends for one run happen inside that run's single future.

use crate::content::{ContentSource, ProjectContent};
use crate::error::ApiError;
use crate::jobs::queue::{JobHandle, JobQueue, JobWork};
use crate::jobs::status::JobState;
use crate::jobs::validators::{ValidationContext, Validator, ValidatorRegistry};
use crate::log::{LogStore, LogWriter};
use crate::plugin::Plugin;
use crate::template::TemplateResolver;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Name under which validation jobs are submitted
pub const VALIDATION_JOB_NAME: &str = "project_validator";

/// A validation run as returned to the caller of [`ValidationJobRunner::start`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationJob {
    pub job_id: String,
    pub log_uid: u64,
    pub plugin: String,
    pub template: String,
    pub status: JobState,
}

/// Per-validator progress as published in the job payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorProgress {
    pub name: String,
    pub state: CheckState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckState {
    Pending,
    Running,
    Passed,
    Failed,
}

pub struct ValidationJobRunner {
    queue: Arc<JobQueue>,
    logs: Arc<LogStore>,
    validators: ValidatorRegistry,
    content: Arc<dyn ContentSource>,
}

impl ValidationJobRunner {
    pub fn new(
        queue: Arc<JobQueue>,
        logs: Arc<LogStore>,
        validators: ValidatorRegistry,
        content: Arc<dyn ContentSource>,
    ) -> Self {
        Self {
            queue,
            logs,
            validators,
            content,
        }
    }

    /// Start validating project content for `plugin` and `template`.
    ///
    /// Returns as soon as the job is queued. Fails with
    /// [`ApiError::Scheduling`] when the queue refuses the job.
    pub fn start(&self, plugin: &Plugin, template: &str) -> Result<ValidationJob, ApiError> {
        let log_uid = self.logs.allocate_uid()?;
        let writer = self.logs.writer(log_uid);
        writer.write(format!(
            "Enqueueing pre-export validation job to start in the background. Job id is {}",
            log_uid
        ))?;

        let mut options = Map::new();
        options.insert("plugin".to_string(), json!(plugin.name));
        options.insert("template".to_string(), json!(template));
        options.insert("log_uid".to_string(), json!(log_uid));

        let run = ValidationRun {
            plugin: plugin.clone(),
            template: template.to_string(),
            validators: self.validators.select(&plugin.validators),
            content: Arc::clone(&self.content),
            writer: writer.clone(),
        };
        let work: JobWork = Box::new(move |handle| run.execute(handle).boxed());

        let job_id = match self.queue.submit(VALIDATION_JOB_NAME, options, work) {
            Ok(id) => id,
            Err(err) => {
                warn!(log_uid, plugin = %plugin.name, error = %err, "Validation job refused");
                writer.write_best_effort(format!("Could not schedule validation: {}", err));
                return Err(err);
            }
        };

        info!(
            job_id = %job_id,
            log_uid,
            plugin = %plugin.name,
            template = %template,
            "Validation job enqueued"
        );

        Ok(ValidationJob {
            job_id,
            log_uid,
            plugin: plugin.name.clone(),
            template: template.to_string(),
            status: JobState::Queued,
        })
    }
}

struct ValidationRun {
    plugin: Plugin,
    template: String,
    validators: Vec<Arc<dyn Validator>>,
    content: Arc<dyn ContentSource>,
    writer: LogWriter,
}

impl ValidationRun {
    async fn execute(self, handle: JobHandle) {
        let mut progress: Vec<ValidatorProgress> = self
            .validators
            .iter()
            .map(|v| ValidatorProgress {
                name: v.name().to_string(),
                state: CheckState::Pending,
            })
            .collect();

        self.set_state(&handle, JobState::Running, "Validating project contents");
        self.publish(&handle, None, &progress);
        self.writer.write_best_effort(format!(
            "Running {} validator(s): {}",
            progress.len(),
            progress
                .iter()
                .map(|p| p.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ));

        let source = Arc::clone(&self.content);
        let loaded = tokio::task::spawn_blocking(move || source.load())
            .await
            .unwrap_or_else(|join| {
                Err(ApiError::ContentError(format!("content loader crashed: {}", join)))
            });
        let content = match loaded {
            Ok(content) => content,
            Err(err) => {
                self.writer
                    .write_best_effort(format!("Could not load project contents: {}", err));
                self.set_state(&handle, JobState::Failed, "Project contents unavailable");
                return;
            }
        };
        let ctx = self.context(content);

        let mut failed = 0usize;
        for (index, validator) in self.validators.iter().enumerate() {
            let name = validator.name().to_string();
            progress[index].state = CheckState::Running;
            self.publish(&handle, Some(&name), &progress);
            self.writer.write_best_effort(format!("Running {}...", name));

            let outcome = AssertUnwindSafe(validator.validate(&ctx)).catch_unwind().await;
            let (passed, messages) = match outcome {
                Ok(Ok(report)) => (report.passed, report.messages),
                Ok(Err(err)) => (false, vec![format!("check errored: {}", err)]),
                Err(_) => {
                    error!(validator = %name, "Validator panicked");
                    (false, vec!["check crashed".to_string()])
                }
            };

            for message in messages {
                self.writer.write_best_effort(format!("[{}] {}", name, message));
            }
            progress[index].state = if passed {
                CheckState::Passed
            } else {
                failed += 1;
                CheckState::Failed
            };
            self.writer.write_best_effort(format!(
                "{} {}.",
                name,
                if passed { "passed" } else { "failed" }
            ));
        }

        self.publish(&handle, None, &progress);
        let total = progress.len();
        let summary = format!(
            "Validation finished: {} of {} check(s) passed.",
            total - failed,
            total
        );
        self.writer.write_best_effort(summary.clone());

        let state = if failed == 0 {
            JobState::Completed
        } else {
            JobState::Failed
        };
        self.set_state(&handle, state, &summary);
    }

    fn context(&self, content: ProjectContent) -> ValidationContext {
        let template_path = TemplateResolver::new()
            .resolve(&self.plugin, &self.template)
            .ok()
            .map(|selection| selection.path);
        ValidationContext {
            plugin: self.plugin.clone(),
            template: self.template.clone(),
            template_path,
            content: Arc::new(content),
        }
    }

    fn set_state(&self, handle: &JobHandle, state: JobState, message: &str) {
        if let Err(err) = handle.set_state(state, Some(message.to_string())) {
            error!(job_id = %handle.job_id(), state = %state, error = %err, "Failed to update job status");
        }
    }

    fn publish(&self, handle: &JobHandle, validating: Option<&str>, progress: &[ValidatorProgress]) {
        let mut fields = Map::new();
        fields.insert(
            "validating".to_string(),
            validating.map_or(Value::Null, |name| json!(name)),
        );
        fields.insert(
            "validators".to_string(),
            serde_json::to_value(progress).unwrap_or_else(|_| json!([])),
        );
        if let Err(err) = handle.merge_payload(fields) {
            error!(job_id = %handle.job_id(), error = %err, "Failed to publish validator progress");
        }
    }
}
