//! CLI output: error mapping and text/JSON rendering of command results.

use crate::error::ApiError;
use crate::export::{PruneReport, PluginInfo, Response};
use crate::jobs::{StatusSnapshot, ValidationJob};
use crate::log::LogRecord;
use crate::template::TemplateSelection;
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;
use serde::Serialize;

/// Map domain/service errors to a string for CLI output.
pub fn map_error(e: &ApiError) -> String {
    match e {
        ApiError::UnknownPlugin(name) => format!("Unknown export plugin '{}'. Run `export-manager plugins`.", name),
        ApiError::Scheduling(_) => format!("{} Try again.", e),
        _ => e.to_string(),
    }
}

pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, ApiError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| ApiError::StorageError(crate::error::StorageError::Codec(e.to_string())))
}

fn heading(title: &str) -> String {
    format!("{}", title.bold().underline())
}

pub fn format_plugins_text(plugins: &[PluginInfo]) -> String {
    if plugins.is_empty() {
        return "No export plugins installed.".to_string();
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Plugin", "Description", "Templates", "Routes", "Templates dir"]);
    for plugin in plugins {
        table.add_row(vec![
            plugin.name.clone(),
            plugin.description.clone(),
            plugin.templates.join("\n"),
            plugin.routes.keys().cloned().collect::<Vec<_>>().join("\n"),
            plugin.templates_dir.clone(),
        ]);
    }
    format!("{}\n\n{}", heading("Export plugins"), table)
}

pub fn format_templates_text(plugin: &str, templates: &[String]) -> String {
    if templates.is_empty() {
        return format!("{} has no templates.", plugin);
    }
    let mut out = format!("{}\n", heading(&format!("Templates for {}", plugin)));
    for name in templates {
        out.push_str(&format!("  {}\n", name));
    }
    out
}

pub fn format_selection_text(selection: &TemplateSelection) -> String {
    format!(
        "{} {} / {}\n  {}",
        "resolved".green(),
        selection.plugin,
        selection.template,
        selection.path.display()
    )
}

/// The workspace store stays locked until `validate` exits, so the status
/// command only works from another process after that.
pub fn format_job_text(job: &ValidationJob) -> String {
    format!(
        "Validation job {} queued for {} / {}\n  log uid: {}\n  \
         once this command exits: export-manager status {} {}\n  \
         pass --wait to stream the log while the job runs",
        job.job_id, job.plugin, job.template, job.log_uid, job.job_id, job.log_uid
    )
}

pub fn format_log_lines(records: &[LogRecord]) -> String {
    records
        .iter()
        .map(|r| format!("{:>4}  {}", r.id.dimmed(), r.message))
        .collect::<Vec<_>>()
        .join("\n")
}

fn colored_status(status: &str) -> String {
    match status {
        "completed" => status.green().to_string(),
        "failed" => status.red().to_string(),
        "running" => status.yellow().to_string(),
        _ => status.to_string(),
    }
}

pub fn format_snapshot_text(snapshot: &StatusSnapshot) -> String {
    let mut out = format!("Status: {}\n", colored_status(snapshot.status()));
    if let Some(step) = snapshot.validating() {
        out.push_str(&format!("Validating: {}\n", step));
    }
    if !snapshot.validators().is_empty() {
        let mut table = Table::new();
        table.load_preset(UTF8_BORDERS_ONLY);
        table.set_header(vec!["Validator", "State"]);
        for entry in snapshot.validators() {
            let name = entry.get("name").and_then(|v| v.as_str()).unwrap_or("-");
            let state = entry.get("state").and_then(|v| v.as_str()).unwrap_or("-");
            table.add_row(vec![name.to_string(), state.to_string()]);
        }
        out.push_str(&format!("{}\n", table));
    }
    if snapshot.logs().is_empty() {
        out.push_str("No new log records.");
    } else {
        out.push_str(&format_log_lines(snapshot.logs()));
    }
    out
}

pub fn format_response_text(response: &Response) -> String {
    let mut out = format!("Redirect to {}", response.location());
    if let Some(flash) = response.flash() {
        out.push_str(&format!("\n{}: {}", format!("{:?}", flash.level).to_lowercase().yellow(), flash.message));
    }
    out
}

pub fn format_prune_text(report: &PruneReport) -> String {
    format!(
        "Pruned {} job(s) and {} log record(s).",
        report.jobs, report.log_records
    )
}
