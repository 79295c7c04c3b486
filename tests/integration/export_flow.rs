//! End-to-end export flow: discovery, selection, validation kickoff, polling
//! and the handoff into a plugin route.

use super::test_utils::{valid_content, Fixture};
use export_manager::error::ApiError;
use export_manager::export::{ExportService, FlashLevel, EXPORT_MANAGER_PATH};
use export_manager::jobs::JobState;
use export_manager::template::TemplateResolver;
use serde_json::{json, Value};

#[test]
fn test_alpha_end_to_end() {
    let fixture = Fixture::new(valid_content());
    let service = &fixture.service;

    let plugins = service.registry().list_export_plugins().unwrap();
    assert_eq!(plugins.len(), 1);
    let alpha = &plugins[0];
    assert_eq!(alpha.name, "alpha");

    let resolver = TemplateResolver::new();
    assert_eq!(resolver.list_templates(alpha).unwrap(), vec!["report.docx"]);
    assert!(resolver.resolve(alpha, "report.docx").is_ok());
    assert!(matches!(
        resolver.resolve(alpha, "../../secret"),
        Err(ApiError::TemplateRejected)
    ));

    let job = service.validate("alpha", "report.docx").unwrap();
    assert_eq!(job.log_uid, 1);
    assert_eq!(job.status, JobState::Queued);

    let snapshot = service.validation_status(&job.job_id, 1, 0).unwrap();
    assert!(matches!(snapshot.status(), "queued" | "running"));
    let first = &snapshot.logs()[0];
    assert_eq!(first.id, 1);
    assert!(first.message.contains("Job id is 1"));
}

#[test]
fn test_index_only_offers_export_plugins() {
    let fixture = Fixture::new(valid_content());
    let index = fixture.service.index().unwrap();
    let names: Vec<&str> = index.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["alpha"]);
    assert_eq!(index[0].templates_dir, "/templates/reports/alpha");
    assert_eq!(index[0].routes.get("generate").unwrap(), "/alpha/generate");
}

#[test]
fn test_unknown_plugin_never_starts_a_job() {
    let fixture = Fixture::new(valid_content());
    let service = &fixture.service;

    for name in ["beta", "uploader", "ALPHA", "alpha ", "../alpha"] {
        let err = service.validate(name, "report.docx").unwrap_err();
        assert!(matches!(err, ApiError::UnknownPlugin(_)), "{}", name);
    }
    assert_eq!(service.queue().stats().pending, 0);

    // No uid was consumed by the rejected attempts
    let job = service.validate("alpha", "report.docx").unwrap();
    assert_eq!(job.log_uid, 1);
}

#[test]
fn test_unknown_job_polls_as_default_snapshot() {
    let fixture = Fixture::new(valid_content());
    let snapshot = fixture.service.validation_status("nope", 42, 0).unwrap();
    let doc = snapshot.to_json();
    assert_eq!(doc["status"], json!("unknown"));
    assert_eq!(doc["validating"], Value::Null);
    assert_eq!(doc["validators"], json!([]));
    assert_eq!(doc["logs"], json!([]));
}

#[test]
fn test_export_handoff_carries_resolved_path_once() {
    let fixture = Fixture::new(valid_content());
    let service = &fixture.service;

    let response = service
        .create("alpha", Some("report.docx"), "generate")
        .unwrap();
    let (path, token) = response.location().split_once("?token=").unwrap();
    assert_eq!(path, "/alpha/generate");

    let context = service.handoff().redeem(token).unwrap();
    assert_eq!(context.template.as_deref(), Some("report.docx"));
    let expected = dunce::canonicalize(
        super::test_utils::alpha_templates_dir(fixture.path()).join("report.docx"),
    )
    .unwrap();
    assert_eq!(context.template_path, Some(expected));
    assert!(matches!(
        service.handoff().redeem(token),
        Err(ApiError::HandoffExpired)
    ));
}

#[test]
fn test_export_with_traversal_continues_without_template() {
    let fixture = Fixture::new(valid_content());
    let service = &fixture.service;

    let response = service
        .create("alpha", Some("../../../etc/passwd"), "generate")
        .unwrap();
    let flash = response.flash().unwrap();
    assert_eq!(flash.level, FlashLevel::Alert);
    assert!(!flash.message.contains("passwd"));

    let token = response.location().split_once("?token=").unwrap().1;
    let context = service.handoff().redeem(token).unwrap();
    assert!(context.template.is_none());
    assert!(context.template_path.is_none());
}

#[test]
fn test_rescue_turns_failures_into_redirects() {
    let fixture = Fixture::new(valid_content());
    let service = &fixture.service;

    let response = ExportService::rescue(service.create("beta", None, "generate"));
    assert_eq!(response.location(), EXPORT_MANAGER_PATH);
    assert_eq!(response.flash().unwrap().message, "Something fishy is going on...");

    let response = ExportService::rescue(service.create("alpha", None, "missing"));
    assert_eq!(response.location(), EXPORT_MANAGER_PATH);
    assert!(response.flash().unwrap().message.contains("missing"));
}
