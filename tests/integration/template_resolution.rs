//! Adversarial template names through the selection entry point.

use super::test_utils::{alpha_templates_dir, valid_content, Fixture};
use export_manager::error::ApiError;

const HOSTILE_NAMES: &[&str] = &[
    "../../secret",
    "../alpha/report.docx",
    "./../../secret",
    "..",
    ".",
    "",
    "/etc/passwd",
    "//etc/passwd",
    "report.docx/../../secret",
    "..%2F..%2Fsecret",
    "report.docx\0.png",
];

#[test]
fn test_hostile_names_never_select_a_template() {
    let fixture = Fixture::new(valid_content());
    std::fs::write(fixture.path().join("templates").join("secret"), "s3cret").unwrap();
    std::fs::write(fixture.path().join("secret"), "s3cret").unwrap();

    for name in HOSTILE_NAMES {
        let selection = fixture.service.select("alpha", Some(name)).unwrap();
        assert!(selection.template.is_none(), "accepted {:?}", name);
        assert!(selection.template_rejected, "{:?}", name);
    }
}

#[test]
fn test_sibling_directory_sharing_prefix_is_outside() {
    let fixture = Fixture::new(valid_content());
    let sibling = fixture
        .path()
        .join("templates")
        .join("reports")
        .join("alpha-evil");
    std::fs::create_dir_all(&sibling).unwrap();
    std::fs::write(sibling.join("report.docx"), "evil").unwrap();

    let selection = fixture
        .service
        .select("alpha", Some("../alpha-evil/report.docx"))
        .unwrap();
    assert!(selection.template.is_none());
}

#[cfg(unix)]
#[test]
fn test_symlink_out_of_templates_dir_is_rejected() {
    let fixture = Fixture::new(valid_content());
    let outside = fixture.path().join("outside.docx");
    std::fs::write(&outside, "outside").unwrap();
    std::os::unix::fs::symlink(&outside, alpha_templates_dir(fixture.path()).join("link.docx"))
        .unwrap();

    let selection = fixture.service.select("alpha", Some("link.docx")).unwrap();
    assert!(selection.template.is_none());
    assert!(selection.template_rejected);
}

#[test]
fn test_resolution_is_idempotent() {
    let fixture = Fixture::new(valid_content());
    let first = fixture.service.select("alpha", Some("report.docx")).unwrap();
    let second = fixture.service.select("alpha", Some("report.docx")).unwrap();
    let path = first.template.as_ref().unwrap().path.clone();
    assert_eq!(first, second);
    assert!(path.is_absolute());
    assert!(path.starts_with(dunce::canonicalize(alpha_templates_dir(fixture.path())).unwrap()));
}

#[test]
fn test_validate_refuses_rejected_template() {
    let fixture = Fixture::new(valid_content());
    let err = fixture
        .service
        .validate("alpha", "../../secret")
        .unwrap_err();
    assert!(matches!(err, ApiError::TemplateRejected));
    assert_eq!(err.to_string(), "Invalid template");
}
