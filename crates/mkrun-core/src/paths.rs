//! Lexical path helpers shared by discovery and include resolution.

use std::path::{Component, Path, PathBuf};

/// Normalizes a path lexically, dropping `.` and folding `..` into its parent.
///
/// No filesystem access happens, so the result is stable for documents that
/// do not exist on disk.
pub fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = matches!(
                    normalized.components().next_back(),
                    Some(Component::Normal(_))
                ) && normalized.pop();
                if !popped && !normalized.has_root() {
                    normalized.push(Component::ParentDir);
                }
            }
            other => normalized.push(other),
        }
    }
    if normalized.as_os_str().is_empty() {
        normalized.push(Component::CurDir);
    }
    normalized
}

/// Directory containing `path`, `.` for a bare file name.
pub fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Path of `path` relative to `base`, or `path` itself when it lies elsewhere.
pub fn relative_to<'path>(path: &'path Path, base: &Path) -> &'path Path {
    path.strip_prefix(base).unwrap_or(path)
}
