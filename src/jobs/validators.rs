//! Pre-export content validators
//!
//! Validators are registered explicitly in a [`ValidatorRegistry`]; a plugin
//! picks a subset by name. Each validator inspects the project content and
//! reports pass/fail plus the messages to append to the validation log.

use crate::content::ProjectContent;
use crate::error::ApiError;
use crate::plugin::Plugin;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

/// What a validator gets to look at
#[derive(Debug, Clone)]
pub struct ValidationContext {
    pub plugin: Plugin,
    pub template: String,
    /// Resolved template path, when the template resolved
    pub template_path: Option<PathBuf>,
    pub content: Arc<ProjectContent>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidatorReport {
    pub passed: bool,
    pub messages: Vec<String>,
}

impl ValidatorReport {
    pub fn pass() -> Self {
        Self {
            passed: true,
            messages: Vec::new(),
        }
    }

    pub fn fail(messages: Vec<String>) -> Self {
        Self {
            passed: false,
            messages,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.messages.push(message.into());
        self
    }
}

#[async_trait]
pub trait Validator: Send + Sync {
    /// Stable name, used for selection and in job payloads
    fn name(&self) -> &str;

    /// An `Err` means the check itself broke; the job records it as a failure.
    async fn validate(&self, ctx: &ValidationContext) -> Result<ValidatorReport, ApiError>;
}

/// Explicit registration list of validators
#[derive(Clone, Default)]
pub struct ValidatorRegistry {
    validators: Vec<Arc<dyn Validator>>,
}

impl ValidatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in validators.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(ProjectHasContent));
        registry.register(Arc::new(RequiredFields));
        registry.register(Arc::new(TemplateReadable));
        registry
    }

    /// Register a validator, replacing one with the same name.
    pub fn register(&mut self, validator: Arc<dyn Validator>) {
        self.validators.retain(|v| v.name() != validator.name());
        self.validators.push(validator);
    }

    pub fn names(&self) -> Vec<String> {
        self.validators.iter().map(|v| v.name().to_string()).collect()
    }

    /// Validators for a plugin, in registration order. An empty selection means all.
    pub fn select(&self, names: &[String]) -> Vec<Arc<dyn Validator>> {
        if names.is_empty() {
            return self.validators.clone();
        }
        for name in names {
            if !self.validators.iter().any(|v| v.name() == name) {
                warn!(validator = %name, "Plugin requested an unregistered validator");
            }
        }
        self.validators
            .iter()
            .filter(|v| names.iter().any(|n| n == v.name()))
            .cloned()
            .collect()
    }
}

/// The project must contain at least one item.
pub struct ProjectHasContent;

#[async_trait]
impl Validator for ProjectHasContent {
    fn name(&self) -> &str {
        "project_has_content"
    }

    async fn validate(&self, ctx: &ValidationContext) -> Result<ValidatorReport, ApiError> {
        if ctx.content.is_empty() {
            Ok(ValidatorReport::fail(vec![
                "The project has no content to export.".to_string(),
            ]))
        } else {
            Ok(ValidatorReport::pass().with_message(format!(
                "Found {} content item(s).",
                ctx.content.items.len()
            )))
        }
    }
}

/// Every item has a title and all fields its kind requires.
pub struct RequiredFields;

#[async_trait]
impl Validator for RequiredFields {
    fn name(&self) -> &str {
        "required_fields"
    }

    async fn validate(&self, ctx: &ValidationContext) -> Result<ValidatorReport, ApiError> {
        let mut messages = Vec::new();
        for (index, item) in ctx.content.items.iter().enumerate() {
            let label = if item.title.trim().is_empty() {
                messages.push(format!("{} #{} has no title.", item.kind, index + 1));
                format!("{} #{}", item.kind, index + 1)
            } else {
                format!("{} '{}'", item.kind, item.title)
            };
            let missing = ctx.content.missing_fields(item);
            if !missing.is_empty() {
                messages.push(format!("{} is missing: {}.", label, missing.join(", ")));
            }
        }
        if messages.is_empty() {
            Ok(ValidatorReport::pass())
        } else {
            Ok(ValidatorReport::fail(messages))
        }
    }
}

/// The selected template exists and is a non-empty regular file.
pub struct TemplateReadable;

#[async_trait]
impl Validator for TemplateReadable {
    fn name(&self) -> &str {
        "template_readable"
    }

    async fn validate(&self, ctx: &ValidationContext) -> Result<ValidatorReport, ApiError> {
        let Some(path) = &ctx.template_path else {
            return Ok(ValidatorReport::fail(vec![format!(
                "Template '{}' is not available for {}.",
                ctx.template, ctx.plugin.name
            )]));
        };
        match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_file() && meta.len() > 0 => Ok(ValidatorReport::pass()),
            Ok(_) => Ok(ValidatorReport::fail(vec![format!(
                "Template '{}' is empty.",
                ctx.template
            )])),
            Err(_) => Ok(ValidatorReport::fail(vec![format!(
                "Template '{}' can no longer be read.",
                ctx.template
            )])),
        }
    }
}
