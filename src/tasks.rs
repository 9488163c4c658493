// src/tasks.rs

use crate::prompt::format_instruction;
use crate::sanitizer::sanitize_focal_class;
use crate::types::{BackendKind, PyModule, SourceLanguage, SymbolTable};
use std::fs;

const LOCAL_MODEL: &str = "granite-code:20b-instruct";
const HOSTED_TESTGEN_MODEL: &str = "ibm/granite-34b-code-java-testgen-v1";
const HOSTED_INSTRUCT_MODEL: &str = "ibm/granite-34b-code-instruct";

/// What to ask the model for each method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    JavaTest,
    PythonTest,
    PythonSummary,
}

impl Task {
    pub fn language(self) -> SourceLanguage {
        match self {
            Task::JavaTest => SourceLanguage::Java,
            Task::PythonTest | Task::PythonSummary => SourceLanguage::Python,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Task::JavaTest => "write a junit test",
            Task::PythonTest => "write a test case in python using `unittest`",
            Task::PythonSummary => "generate a brief summary",
        }
    }

    /// Title of the answer panel.
    pub fn title(self) -> &'static str {
        match self {
            Task::JavaTest | Task::PythonTest => "Generated Test",
            Task::PythonSummary => "Summary",
        }
    }

    /// Highlighting used for the answer.
    pub fn syntax(self) -> &'static str {
        match self {
            Task::JavaTest => "java",
            Task::PythonTest => "python",
            Task::PythonSummary => "markdown",
        }
    }

    /// Summaries are prose, so they are shown raw instead of code-extracted.
    pub fn extract_code(self) -> bool {
        !matches!(self, Task::PythonSummary)
    }

    pub fn default_model(self, backend: BackendKind) -> &'static str {
        match (backend, self) {
            (BackendKind::Local, _) => LOCAL_MODEL,
            (BackendKind::Hosted, Task::PythonSummary) => HOSTED_INSTRUCT_MODEL,
            (BackendKind::Hosted, _) => HOSTED_TESTGEN_MODEL,
        }
    }
}

/// One focal method, ready to prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    /// Human-readable name for logs, e.g. `add(int, int)` in `com.example.Calculator`.
    pub label: String,
    /// 1-based, inclusive line span of the method in its file.
    pub lines: (usize, usize),
    pub instruction: String,
}

/// One job per non-constructor method, with the class reduced to what the method needs.
pub fn java_jobs(table: &SymbolTable, task: Task) -> Vec<Job> {
    let mut jobs = Vec::new();
    for unit in table.values() {
        let source = match fs::read_to_string(unit.file.canonical_path()) {
            Ok(source) => source,
            Err(e) => {
                tracing::warn!("Skipping {:?}: {}", unit.file.display_path(), e);
                continue;
            }
        };

        for (type_name, type_declaration) in &unit.type_declarations {
            for method in type_declaration.callable_declarations.values() {
                if method.is_constructor {
                    continue;
                }

                let code = match sanitize_focal_class(&source, type_name, &method.declaration) {
                    Ok(sanitized) => sanitized,
                    Err(e) => {
                        tracing::warn!(
                            "Could not sanitize {} for {}: {}; using the method alone",
                            type_name,
                            method.declaration,
                            e
                        );
                        method.code.clone()
                    }
                };

                jobs.push(Job {
                    label: format!("{} in class {}", method.declaration, type_name),
                    lines: (method.start_line, method.end_line),
                    instruction: format_instruction(
                        &code,
                        &method.declaration,
                        Some(type_name.as_str()),
                        task.description(),
                        task.language().fence_tag(),
                    ),
                });
            }
        }
    }
    jobs
}

/// One job per top-level function; the function body is the whole snippet.
pub fn python_jobs(modules: &[PyModule], task: Task) -> Vec<Job> {
    modules
        .iter()
        .flat_map(|module| {
            module.functions.iter().map(move |function| Job {
                label: format!("{} in module {}", function.name, module.name),
                lines: (function.start_line, function.end_line),
                instruction: format_instruction(
                    &function.body,
                    &function.name,
                    None,
                    task.description(),
                    task.language().fence_tag(),
                ),
            })
        })
        .collect()
}
