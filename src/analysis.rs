// src/analysis.rs

use crate::error::AppError;
use crate::file_resolver::discover_sources;
use crate::symbol_extractor::{extract_java, extract_python};
use crate::types::{PyModule, ResolvedFile, SourceLanguage, SymbolTable};
use std::fs;
use std::path::Path;

fn read_source(file: &ResolvedFile) -> Option<String> {
    match fs::read_to_string(file.canonical_path()) {
        Ok(source) => Some(source),
        Err(e) => {
            tracing::warn!("Skipping {:?}: {}", file.display_path(), e);
            None
        }
    }
}

/// Parses every Java file under `project_root` into a symbol table keyed by canonical path.
///
/// Files that cannot be read or parsed are logged and left out.
pub fn java_symbol_table(
    project_root: &Path,
    include: Option<&glob::Pattern>,
) -> Result<SymbolTable, AppError> {
    if !project_root.is_dir() {
        return Err(AppError::ProjectNotFound(project_root.to_path_buf()));
    }

    let mut table = SymbolTable::new();
    for file in discover_sources(project_root, SourceLanguage::Java, include) {
        let Some(source) = read_source(&file) else {
            continue;
        };
        let key = file.canonical_path().to_path_buf();
        match extract_java(file, &source) {
            Ok(unit) => {
                tracing::debug!(
                    "{:?}: {} type(s)",
                    unit.file.display_path(),
                    unit.type_declarations.len()
                );
                table.insert(key, unit);
            }
            Err(e) => tracing::warn!("Skipping: {}", e),
        }
    }
    tracing::info!("Analysed {} Java file(s) under {:?}", table.len(), project_root);
    Ok(table)
}

/// Parses every Python file under `project_root`, in path order.
pub fn python_modules(
    project_root: &Path,
    include: Option<&glob::Pattern>,
) -> Result<Vec<PyModule>, AppError> {
    if !project_root.is_dir() {
        return Err(AppError::ProjectNotFound(project_root.to_path_buf()));
    }

    let mut modules = Vec::new();
    for file in discover_sources(project_root, SourceLanguage::Python, include) {
        let Some(source) = read_source(&file) else {
            continue;
        };
        match extract_python(file, &source) {
            Ok(module) => modules.push(module),
            Err(e) => tracing::warn!("Skipping: {}", e),
        }
    }
    tracing::info!("Analysed {} Python module(s) under {:?}", modules.len(), project_root);
    Ok(modules)
}
