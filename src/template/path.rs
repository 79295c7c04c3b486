//! Path canonicalization and containment checks for template names

use crate::error::StorageError;
use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};
use unicode_normalization::UnicodeNormalization;

/// Canonicalize a path that must exist: resolves symlinks, `.` and `..`.
///
/// The result is the on-disk spelling, byte for byte.
pub fn canonicalize_path(path: &Path) -> Result<PathBuf, StorageError> {
    dunce::canonicalize(path)
        .map_err(|e| StorageError::InvalidPath(format!("Failed to canonicalize path: {}", e)))
}

/// NFC form of a name, used only to compare names, never to open them.
pub fn nfc_key(name: &str) -> String {
    name.nfc().collect()
}

/// Find the entry of `dir` whose name is canonically equivalent to `name`.
///
/// Lets `caf\u{e9}.docx` find a file stored as `cafe\u{301}.docx`. The entry's
/// own spelling is returned. Ambiguous matches yield `None`.
pub fn find_equivalent_entry(dir: &Path, name: &str) -> Option<PathBuf> {
    let key = nfc_key(name);
    let mut found = None;
    for entry in std::fs::read_dir(dir).ok()?.flatten() {
        let file_name = entry.file_name();
        if file_name.to_str().map(nfc_key).as_deref() == Some(key.as_str()) {
            if found.is_some() {
                return None;
            }
            found = Some(dir.join::<&OsStr>(file_name.as_ref()));
        }
    }
    found
}

/// True when `name` is a plain relative path: no root, no drive prefix, no `..`.
///
/// `.` segments are harmless and allowed.
pub fn is_plain_relative(name: &str) -> bool {
    if name.is_empty() || name.contains('\0') {
        return false;
    }
    let mut saw_normal = false;
    for component in Path::new(name).components() {
        match component {
            Component::Normal(_) => saw_normal = true,
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return false,
        }
    }
    saw_normal
}

/// True when `candidate` lies strictly inside `root`.
///
/// Both paths must already be canonical. The comparison is per path segment, so
/// `/t/templates-evil/x` is not inside `/t/templates`.
pub fn is_contained(root: &Path, candidate: &Path) -> bool {
    candidate != root && candidate.starts_with(root)
}
