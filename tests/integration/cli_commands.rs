//! CLI route table against a real workspace on disk.

use super::test_utils::with_xdg_env;
use export_manager::cli::{Commands, OutputFormat, RunContext, DEFAULT_CONTENT_PATH};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn workspace() -> (TempDir, PathBuf) {
    let temp = TempDir::new().unwrap();
    let root = temp.path().to_path_buf();
    let templates = root.join("templates").join("reports").join("alpha");
    std::fs::create_dir_all(&templates).unwrap();
    std::fs::write(templates.join("report.docx"), "docx body").unwrap();

    let config = root.join("export.toml");
    std::fs::write(
        &config,
        r#"
[plugins.alpha]
description = "Alpha Word exporter"
capabilities = ["export"]

[plugins.alpha.routes]
generate = "/alpha/generate"
"#,
    )
    .unwrap();

    let content = root.join(DEFAULT_CONTENT_PATH);
    std::fs::create_dir_all(content.parent().unwrap()).unwrap();
    std::fs::write(
        &content,
        r#"{ "items": [ { "kind": "issue", "title": "XSS", "fields": { "Severity": "High" } } ] }"#,
    )
    .unwrap();
    (temp, config)
}

fn run(root: &Path, config: &Path, command: Commands) -> Value {
    let context =
        RunContext::new(root.to_path_buf(), Some(config.to_path_buf()), OutputFormat::Json)
            .unwrap();
    let output = context.execute(&command).unwrap();
    serde_json::from_str(&output).unwrap()
}

#[test]
fn test_plugins_and_templates_commands() {
    let xdg = TempDir::new().unwrap();
    let (temp, config) = workspace();
    with_xdg_env(&xdg, || {
        let plugins = run(temp.path(), &config, Commands::Plugins);
        assert_eq!(plugins[0]["name"], json!("alpha"));
        assert_eq!(plugins[0]["templates"], json!(["report.docx"]));

        let templates = run(
            temp.path(),
            &config,
            Commands::Templates {
                plugin: "alpha".to_string(),
            },
        );
        assert_eq!(templates["templates"], json!(["report.docx"]));
    });
}

#[test]
fn test_resolve_command_rejects_traversal() {
    let xdg = TempDir::new().unwrap();
    let (temp, config) = workspace();
    with_xdg_env(&xdg, || {
        let context =
            RunContext::new(temp.path().to_path_buf(), Some(config.clone()), OutputFormat::Text)
                .unwrap();
        let err = context
            .execute(&Commands::Resolve {
                plugin: "alpha".to_string(),
                template: "../../export.toml".to_string(),
            })
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid template");
    });
}

#[test]
fn test_validate_then_status() {
    let xdg = TempDir::new().unwrap();
    let (temp, config) = workspace();
    with_xdg_env(&xdg, || {
        let job = run(
            temp.path(),
            &config,
            Commands::Validate {
                plugin: "alpha".to_string(),
                template: "report.docx".to_string(),
                content: None,
                wait: false,
            },
        );
        assert_eq!(job["log_uid"], json!(1));
        let job_id = job["job_id"].as_str().unwrap().to_string();

        let status = run(
            temp.path(),
            &config,
            Commands::Status {
                job_id,
                log_uid: 1,
                after: 0,
            },
        );
        assert_eq!(status["status"], json!("completed"));
        assert_eq!(status["logs"][0]["id"], json!(1));
        assert_eq!(status["validating"], Value::Null);

        let unknown = run(
            temp.path(),
            &config,
            Commands::Status {
                job_id: "nope".to_string(),
                log_uid: 99,
                after: 0,
            },
        );
        assert_eq!(unknown["status"], json!("unknown"));
        assert_eq!(unknown["validators"], json!([]));
    });
}

#[test]
fn test_export_command_redirects_or_rescues() {
    let xdg = TempDir::new().unwrap();
    let (temp, config) = workspace();
    with_xdg_env(&xdg, || {
        let ok = run(
            temp.path(),
            &config,
            Commands::Export {
                plugin: "alpha".to_string(),
                template: Some("report.docx".to_string()),
                route: "generate".to_string(),
            },
        );
        assert_eq!(ok["type"], json!("redirect"));
        assert!(ok["to"].as_str().unwrap().starts_with("/alpha/generate?token="));

        let rescued = run(
            temp.path(),
            &config,
            Commands::Export {
                plugin: "beta".to_string(),
                template: None,
                route: "generate".to_string(),
            },
        );
        assert_eq!(rescued["to"], json!("/export"));
        assert_eq!(rescued["flash"]["level"], json!("alert"));
    });
}
