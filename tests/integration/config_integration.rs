//! Layered configuration: user file, workspace files, environment, and the
//! plugin catalog built from it.

use super::test_utils::with_xdg_env;
use export_manager::config::{global_config_path, ConfigLoader, ExportConfig, PluginEntry};
use export_manager::content::{ProjectContent, StaticContent};
use export_manager::export::ExportService;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

fn write(path: PathBuf, body: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, body).unwrap();
}

#[test]
fn test_workspace_file_overrides_user_file() {
    let xdg = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();

    let config = with_xdg_env(&xdg, || {
        write(
            global_config_path().unwrap(),
            "[jobs]\nworkers = 3\nmax_queue_size = 10\n",
        );
        write(
            workspace.path().join("config").join("config.toml"),
            "[jobs]\nmax_queue_size = 20\n",
        );
        write(
            workspace.path().join("config").join("development.toml"),
            "[handoff]\nttl_ms = 5000\n",
        );
        ConfigLoader::load(workspace.path()).unwrap()
    });

    assert_eq!(config.jobs.workers, 3);
    assert_eq!(config.jobs.max_queue_size, 20);
    assert_eq!(config.handoff.ttl_ms, 5000);
    assert_eq!(config.handoff.max_bytes, 4096);
}

#[test]
fn test_environment_overrides_files() {
    let xdg = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();

    let config = with_xdg_env(&xdg, || {
        write(
            workspace.path().join("config").join("config.toml"),
            "[jobs]\nworkers = 2\n",
        );
        std::env::set_var("EXPORT__JOBS__WORKERS", "7");
        let loaded = ConfigLoader::load(workspace.path());
        std::env::remove_var("EXPORT__JOBS__WORKERS");
        loaded.unwrap()
    });

    assert_eq!(config.jobs.workers, 7);
}

#[test]
fn test_configured_plugins_become_export_plugins() {
    let xdg = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    let templates = workspace.path().join("templates").join("reports").join("word");
    std::fs::create_dir_all(&templates).unwrap();
    std::fs::write(templates.join("b.docx"), "b").unwrap();
    std::fs::write(templates.join("a.docx"), "a").unwrap();

    let config = with_xdg_env(&xdg, || {
        write(
            workspace.path().join("config").join("config.toml"),
            r#"
[plugins.word]
description = "Word export"
capabilities = ["export"]

[plugins.word.routes]
generate = "/word/generate"

[plugins.calendar]
description = "Not an exporter"
capabilities = ["import"]
"#,
        );
        ConfigLoader::load(workspace.path()).unwrap()
    });

    let service = ExportService::from_config(
        &config,
        workspace.path(),
        Arc::new(StaticContent(ProjectContent::default())),
    )
    .unwrap();
    let index = service.index().unwrap();
    assert_eq!(index.len(), 1);
    assert_eq!(index[0].name, "word");
    assert_eq!(index[0].templates, vec!["a.docx", "b.docx"]);
}

#[test]
fn test_config_round_trips_through_toml() {
    let mut config = ExportConfig::default();
    config.plugins.insert(
        "word".to_string(),
        PluginEntry {
            description: "Word export".to_string(),
            capabilities: vec!["export".to_string()],
            ..PluginEntry::default()
        },
    );
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("export.toml");
    std::fs::write(&path, toml::to_string_pretty(&config).unwrap()).unwrap();

    let loaded = ConfigLoader::load_from_file(&path).unwrap();
    assert_eq!(loaded.plugins["word"].description, "Word export");
    assert_eq!(loaded.jobs.retention_ms, config.jobs.retention_ms);
}
