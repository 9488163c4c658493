// src/file_resolver.rs

use crate::types::{ResolvedFile, SourceLanguage};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use walkdir::{DirEntry, WalkDir};

/// Directories that never hold project sources worth analysing.
const SKIPPED_DIRS: &[&str] = &[
    "target",
    "build",
    "out",
    "node_modules",
    "__pycache__",
    "venv",
];

// Hidden directories (.git, .venv, .idea, ...) and build outputs are pruned from the walk.
fn is_skipped_dir(entry: &DirEntry) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || SKIPPED_DIRS.contains(&name.as_ref())
}

/// Attempts to create a ResolvedFile instance from a path under the project root.
fn create_resolved_file(path_to_resolve: &Path, project_root: &Path) -> Result<ResolvedFile, String> {
    let canonical_path = fs::canonicalize(path_to_resolve)
        .map_err(|e| format!("Failed to canonicalize path {:?}: {}", path_to_resolve, e))?;

    let display_path = pathdiff::diff_paths(path_to_resolve, project_root)
        .unwrap_or_else(|| canonical_path.clone());

    Ok(ResolvedFile::new(display_path, canonical_path))
}

/// Lists every source file of `language` under `project_root`, sorted by relative path.
///
/// When `include` is given, only files whose project-relative path matches it are kept.
pub fn discover_sources(
    project_root: &Path,
    language: SourceLanguage,
    include: Option<&glob::Pattern>,
) -> Vec<ResolvedFile> {
    let extension = language.extension();

    let mut files: Vec<ResolvedFile> = WalkDir::new(project_root)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| !is_skipped_dir(e))
        .filter_map(|e| match e {
            Ok(entry) => Some(entry),
            Err(err) => {
                tracing::warn!("Skipping unreadable entry under {:?}: {}", project_root, err);
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == extension))
        .filter_map(|entry| match create_resolved_file(entry.path(), project_root) {
            Ok(resolved) => Some(resolved),
            Err(err_msg) => {
                tracing::warn!("Could not process file {:?}: {}", entry.path(), err_msg);
                None
            }
        })
        .filter(|file| include.is_none_or(|pattern| pattern.matches_path(file.display_path())))
        .collect();

    // A file reachable through a symlink is kept once, under its first path in sorted order.
    files.sort_by(|a, b| a.display_path().cmp(b.display_path()));
    let mut seen = HashSet::new();
    files.retain(|file| seen.insert(file.canonical_path().to_path_buf()));
    files
}
