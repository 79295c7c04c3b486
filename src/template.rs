//! Template resolution
//!
//! Maps a `(plugin, template name)` pair to an absolute file path inside the
//! plugin's templates directory. Any name that could escape the directory, or
//! that does not name an existing regular file, is rejected without exposing a
//! path to the caller.

pub mod path;

use crate::error::ApiError;
use crate::plugin::Plugin;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use self::path::{canonicalize_path, find_equivalent_entry, is_contained, is_plain_relative};

/// A template accepted for a plugin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateSelection {
    pub plugin: String,
    pub template: String,
    /// Canonical absolute path, always inside the plugin's templates directory
    pub path: PathBuf,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateResolver;

impl TemplateResolver {
    pub fn new() -> Self {
        Self
    }

    /// Basenames of every entry directly inside the plugin's templates
    /// directory, sorted. A missing directory yields an empty list.
    pub fn list_templates(&self, plugin: &Plugin) -> Result<Vec<String>, ApiError> {
        if !plugin.templates_dir.is_dir() {
            debug!(
                plugin = %plugin.name,
                dir = %plugin.templates_dir.display(),
                "Templates directory missing"
            );
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in WalkDir::new(&plugin.templates_dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(false)
        {
            let entry = entry.map_err(|e| {
                ApiError::StorageError(crate::error::StorageError::IoError(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    format!("Failed to list templates: {}", e),
                )))
            })?;
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    /// Resolve a template name for a plugin.
    ///
    /// Accepted only when the name is a plain relative path, its canonical form
    /// lies inside the canonical templates directory, and it is a regular file.
    /// The name is joined exactly as given; a single-segment name that does not
    /// exist falls back to the entry it is Unicode-equivalent to.
    pub fn resolve(&self, plugin: &Plugin, name: &str) -> Result<TemplateSelection, ApiError> {
        if !is_plain_relative(name) {
            warn!(plugin = %plugin.name, "Rejected template name with traversal or absolute path");
            return Err(ApiError::TemplateRejected);
        }

        let root = canonicalize_path(&plugin.templates_dir).map_err(|e| {
            debug!(plugin = %plugin.name, error = %e, "Templates directory unavailable");
            ApiError::TemplateRejected
        })?;

        let candidate = canonicalize_path(&root.join(name))
            .or_else(|err| {
                // Only a single segment is matched up to Unicode equivalence
                if Path::new(name).components().count() != 1 {
                    return Err(err);
                }
                match find_equivalent_entry(&root, name) {
                    Some(entry) => canonicalize_path(&entry),
                    None => Err(err),
                }
            })
            .map_err(|_| {
                debug!(plugin = %plugin.name, "Template does not exist");
                ApiError::TemplateRejected
            })?;

        if !is_contained(&root, &candidate) {
            warn!(plugin = %plugin.name, "Rejected template resolving outside its directory");
            return Err(ApiError::TemplateRejected);
        }

        let is_file = std::fs::metadata(&candidate)
            .map(|m| m.is_file())
            .unwrap_or(false);
        if !is_file {
            debug!(plugin = %plugin.name, "Template is not a regular file");
            return Err(ApiError::TemplateRejected);
        }

        Ok(TemplateSelection {
            plugin: plugin.name.clone(),
            template: name.to_string(),
            path: candidate,
        })
    }
}
