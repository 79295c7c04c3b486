//! Shared test utilities for integration tests
//!
//! Provides isolated XDG/env setup and a ready-made workspace with an `alpha`
//! export plugin, its templates directory and a service wired to a temp store.

use export_manager::config::ExportConfig;
use export_manager::content::{ContentItem, ProjectContent, StaticContent};
use export_manager::export::ExportService;
use export_manager::jobs::{StatusSnapshot, ValidatorRegistry};
use export_manager::plugin::{CatalogComponent, StaticCatalog};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Serializes environment variable access across all tests
static XDG_ENV_MUTEX: Mutex<()> = Mutex::new(());

/// Environment variable state to restore after test
struct EnvState {
    home: Option<String>,
    xdg_config_home: Option<String>,
    xdg_data_home: Option<String>,
    export_env: Option<String>,
}

impl EnvState {
    fn capture() -> Self {
        Self {
            home: std::env::var("HOME").ok(),
            xdg_config_home: std::env::var("XDG_CONFIG_HOME").ok(),
            xdg_data_home: std::env::var("XDG_DATA_HOME").ok(),
            export_env: std::env::var("EXPORT_ENV").ok(),
        }
    }

    fn restore(self) {
        if let Some(orig) = self.home {
            std::env::set_var("HOME", orig);
        } else {
            std::env::remove_var("HOME");
        }

        if let Some(orig) = self.xdg_config_home {
            std::env::set_var("XDG_CONFIG_HOME", orig);
        } else {
            std::env::remove_var("XDG_CONFIG_HOME");
        }

        if let Some(orig) = self.xdg_data_home {
            std::env::set_var("XDG_DATA_HOME", orig);
        } else {
            std::env::remove_var("XDG_DATA_HOME");
        }

        if let Some(orig) = self.export_env {
            std::env::set_var("EXPORT_ENV", orig);
        } else {
            std::env::remove_var("EXPORT_ENV");
        }
    }
}

/// Set up isolated XDG directories for a test with automatic cleanup
///
/// This function:
/// - Creates isolated XDG_CONFIG_HOME and XDG_DATA_HOME directories in the temp dir
/// - Sets HOME to ensure fallback paths work correctly
/// - Clears `EXPORT_ENV` so only `config/config.toml` and `config/development.toml` apply
/// - Automatically restores original environment variables after the test
/// - Uses a global mutex to prevent race conditions in parallel test execution
pub fn with_xdg_env<F, R>(test_dir: &TempDir, f: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = XDG_ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let env_state = EnvState::capture();

    // Set up test directories
    let test_config_home = test_dir.path().to_path_buf();
    let test_data_home = test_dir.path().join("data");
    let test_home = test_dir.path().join("home");

    std::fs::create_dir_all(&test_data_home).unwrap();
    std::fs::create_dir_all(&test_home).unwrap();

    // Set environment variables
    std::env::set_var("HOME", test_home.to_str().unwrap());
    std::env::set_var("XDG_CONFIG_HOME", test_config_home.to_str().unwrap());
    std::env::set_var("XDG_DATA_HOME", test_data_home.to_str().unwrap());
    std::env::remove_var("EXPORT_ENV");

    // Run test
    let result = f();

    // Restore original environment
    env_state.restore();

    result
}

/// Templates directory of the `alpha` plugin inside a workspace
pub fn alpha_templates_dir(workspace: &Path) -> PathBuf {
    workspace.join("templates").join("reports").join("alpha")
}

/// A workspace with one `alpha` export plugin holding `report.docx`.
pub struct Fixture {
    pub dir: TempDir,
    pub service: ExportService,
}

impl Fixture {
    pub fn new(content: ProjectContent) -> Self {
        Self::with_config(content, ExportConfig::default())
    }

    pub fn with_config(content: ProjectContent, config: ExportConfig) -> Self {
        let dir = TempDir::new().unwrap();
        let templates = alpha_templates_dir(dir.path());
        std::fs::create_dir_all(&templates).unwrap();
        std::fs::write(templates.join("report.docx"), "docx body").unwrap();

        let mut routes = BTreeMap::new();
        routes.insert("generate".to_string(), "/alpha/generate".to_string());
        let catalog = StaticCatalog::default()
            .with(CatalogComponent {
                name: "alpha".to_string(),
                module: "alpha".to_string(),
                description: "Alpha Word exporter".to_string(),
                capabilities: vec!["export".to_string()],
                routes,
                templates_dir: templates,
                validators: Vec::new(),
            })
            .with(CatalogComponent {
                name: "uploader".to_string(),
                module: "uploader".to_string(),
                description: "Not an exporter".to_string(),
                capabilities: vec!["upload".to_string()],
                ..CatalogComponent::default()
            });

        let service = ExportService::open(
            &config,
            dir.path(),
            Arc::new(catalog),
            Arc::new(StaticContent(content)),
            ValidatorRegistry::with_builtins(),
        )
        .unwrap();
        Self { dir, service }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

pub fn valid_content() -> ProjectContent {
    ProjectContent::default()
        .require("issue", "Severity")
        .with_item(ContentItem::new("issue", "Stored XSS").field("Severity", "High"))
}

/// Poll with an advancing cursor until the job is terminal, returning every
/// snapshot seen.
pub async fn poll_until_terminal(
    service: &ExportService,
    job_id: &str,
    log_uid: u64,
    timeout: Duration,
) -> Vec<StatusSnapshot> {
    let started = Instant::now();
    let mut cursor = 0;
    let mut seen = Vec::new();
    loop {
        let snapshot = service.validation_status(job_id, log_uid, cursor).unwrap();
        cursor = snapshot.next_cursor(cursor);
        let done = snapshot.is_terminal();
        seen.push(snapshot);
        if done {
            return seen;
        }
        assert!(started.elapsed() < timeout, "job {} did not finish", job_id);
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
