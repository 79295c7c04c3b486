//! Property-based tests for template path containment

use export_manager::plugin::Plugin;
use export_manager::template::path::is_plain_relative;
use export_manager::template::TemplateResolver;
use proptest::prelude::*;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tempfile::TempDir;
use unicode_normalization::UnicodeNormalization;

fn segment() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("..".to_string()),
        Just(".".to_string()),
        "[a-z]{1,8}",
        "[a-z]{1,6}\\.docx",
        "[a-zà-öα-ω]{1,6}\\.docx",
        Just("cafe\u{301}.docx".to_string()),
        Just("caf\u{e9}.docx".to_string()),
    ]
}

fn plugin_in(temp: &TempDir) -> Plugin {
    let dir = temp.path().join("templates");
    std::fs::create_dir_all(dir.join("sub")).unwrap();
    std::fs::write(dir.join("report.docx"), "docx").unwrap();
    std::fs::write(dir.join("sub").join("inner.docx"), "docx").unwrap();
    std::fs::write(dir.join("cafe\u{301}.docx"), "docx").unwrap();
    std::fs::write(temp.path().join("secret.docx"), "secret").unwrap();
    Plugin {
        name: "alpha".to_string(),
        description: String::new(),
        routes: BTreeMap::new(),
        templates_dir: dir,
        validators: Vec::new(),
    }
}

/// Names with a `..` segment or a leading root are rejected whether or not the
/// traversed target exists.
#[test]
fn test_traversal_names_are_always_rejected() {
    let temp = TempDir::new().unwrap();
    let plugin = plugin_in(&temp);
    let resolver = TemplateResolver::new();
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(
            &(prop::collection::vec(segment(), 1..6), any::<bool>()),
            |(segments, absolute)| {
                let joined = segments.join("/");
                let name = if absolute {
                    format!("/{}", joined)
                } else {
                    joined
                };
                let hostile = absolute || segments.iter().any(|s| s == "..");
                prop_assume!(hostile);

                assert!(!is_plain_relative(&name));
                assert!(resolver.resolve(&plugin, &name).is_err(), "accepted {}", name);
                Ok(())
            },
        )
        .unwrap();
}

/// Whatever the name, an accepted path lies inside the templates directory and
/// re-resolving gives the same answer.
#[test]
fn test_accepted_paths_stay_inside_and_are_stable() {
    let temp = TempDir::new().unwrap();
    let plugin = plugin_in(&temp);
    let root = dunce::canonicalize(&plugin.templates_dir).unwrap();
    let resolver = TemplateResolver::new();
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&prop::collection::vec(segment(), 1..5), |segments| {
            let name = segments.join("/");
            let first = resolver.resolve(&plugin, &name).ok();
            let second = resolver.resolve(&plugin, &name).ok();
            assert_eq!(first, second);
            if let Some(selection) = first {
                let path: PathBuf = selection.path;
                assert!(path.starts_with(&root) && path != root);
                assert!(path.is_file());
            }
            Ok(())
        })
        .unwrap();
}

/// A file stored under a decomposed name resolves to itself whether it is
/// asked for in its stored spelling or its composed spelling.
#[test]
fn test_decomposed_file_names_resolve_in_either_form() {
    let temp = TempDir::new().unwrap();
    let plugin = plugin_in(&temp);
    let resolver = TemplateResolver::new();
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&"[a-zà-öα-ω]{1,8}", |stem| {
            let stored: String = format!("{}.docx", stem).nfd().collect();
            let composed: String = stored.nfc().collect();
            let on_disk = plugin.templates_dir.join(&stored);
            std::fs::write(&on_disk, "docx").unwrap();
            let expected = dunce::canonicalize(&on_disk).unwrap();

            let listed = resolver.list_templates(&plugin).unwrap();
            assert!(listed.contains(&stored));
            assert_eq!(resolver.resolve(&plugin, &stored).unwrap().path, expected);
            assert_eq!(resolver.resolve(&plugin, &composed).unwrap().path, expected);

            std::fs::remove_file(&on_disk).unwrap();
            Ok(())
        })
        .unwrap();
}
