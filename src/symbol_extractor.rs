// src/symbol_extractor.rs

use crate::error::AppError;
use crate::types::{Callable, CompilationUnit, PyFunction, PyModule, ResolvedFile, TypeDeclaration};
use std::collections::BTreeMap;
use tree_sitter::{Language, Node, Parser, Query, QueryCursor, StreamingIterator, Tree};

/// Top-level Python functions, with or without decorators.
const PYTHON_FUNCTIONS_QUERY: &str = r#"
(module
  (function_definition name: (identifier) @name) @definition.function)
(module
  (decorated_definition
    definition: (function_definition name: (identifier) @name)) @definition.function)
"#;

pub(crate) fn java_language() -> Language {
    tree_sitter_java::LANGUAGE.into()
}

fn python_language() -> Language {
    tree_sitter_python::LANGUAGE.into()
}

pub(crate) fn parse(source_code: &str, language: &Language) -> Result<Tree, String> {
    let mut parser = Parser::new();
    parser
        .set_language(language)
        .map_err(|e| format!("Error setting language: {}", e))?;

    parser
        .parse(source_code, None)
        .ok_or_else(|| "Internal error: Failed to parse source code.".to_string())
}

pub(crate) fn node_text<'s>(node: Node<'_>, source: &'s str) -> &'s str {
    &source[node.byte_range()]
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

// --- Java ---

/// A method or constructor node inside a type body.
pub(crate) struct Member<'t> {
    pub node: Node<'t>,
    pub name: String,
    pub declaration: String,
    pub is_constructor: bool,
}

/// Named children of a type body, flattening the declarations section of an enum body.
fn body_members(body: Node<'_>) -> Vec<Node<'_>> {
    let mut members = Vec::new();
    let mut cursor = body.walk();
    for child in body.named_children(&mut cursor) {
        if child.kind() == "enum_body_declarations" {
            let mut inner = child.walk();
            members.extend(child.named_children(&mut inner));
        } else {
            members.push(child);
        }
    }
    members
}

fn is_type_declaration(kind: &str) -> bool {
    matches!(
        kind,
        "class_declaration" | "interface_declaration" | "enum_declaration" | "record_declaration"
    )
}

/// Renders one parameter as its type: `int`, `List<String>`, `String...`.
fn parameter_type(param: Node<'_>, source: &str) -> Option<String> {
    match param.kind() {
        "formal_parameter" => {
            let ty = param.child_by_field_name("type")?;
            let mut rendered = collapse_whitespace(node_text(ty, source));
            if let Some(dims) = param.child_by_field_name("dimensions") {
                rendered.push_str(&collapse_whitespace(node_text(dims, source)));
            }
            Some(rendered)
        }
        "spread_parameter" => {
            let mut cursor = param.walk();
            let ty = param
                .named_children(&mut cursor)
                .find(|c| !matches!(c.kind(), "modifiers" | "variable_declarator"))?;
            Some(format!("{}...", collapse_whitespace(node_text(ty, source))))
        }
        _ => None,
    }
}

/// Builds the `name(T1, T2)` signature of a method or constructor node.
pub(crate) fn java_declaration(node: Node<'_>, source: &str) -> Option<(String, String)> {
    let name = node_text(node.child_by_field_name("name")?, source).to_string();
    let params: Vec<String> = match node.child_by_field_name("parameters") {
        Some(list) => {
            let mut cursor = list.walk();
            list.named_children(&mut cursor)
                .filter_map(|p| parameter_type(p, source))
                .collect()
        }
        None => Vec::new(),
    };
    let declaration = format!("{}({})", name, params.join(", "));
    Some((name, declaration))
}

/// Members of one type body (nested types excluded).
pub(crate) fn type_members<'t>(type_node: Node<'t>, source: &str) -> Vec<Member<'t>> {
    let Some(body) = type_node.child_by_field_name("body") else {
        return Vec::new();
    };
    body_members(body)
        .into_iter()
        .filter(|m| matches!(m.kind(), "method_declaration" | "constructor_declaration"))
        .filter_map(|node| {
            let (name, declaration) = java_declaration(node, source)?;
            Some(Member {
                node,
                name,
                declaration,
                is_constructor: node.kind() == "constructor_declaration",
            })
        })
        .collect()
}

/// Every type declaration in the tree with its qualified name, outermost first.
pub(crate) fn java_types<'t>(
    root: Node<'t>,
    source: &str,
    package: Option<&str>,
) -> Vec<(String, Node<'t>)> {
    fn visit<'t>(node: Node<'t>, source: &str, prefix: &str, out: &mut Vec<(String, Node<'t>)>) {
        let mut cursor = node.walk();
        let children: Vec<Node<'t>> = match node.kind() {
            "program" => node.named_children(&mut cursor).collect(),
            _ => match node.child_by_field_name("body") {
                Some(body) => body_members(body),
                None => Vec::new(),
            },
        };

        for child in children {
            if !is_type_declaration(child.kind()) {
                continue;
            }
            let Some(name_node) = child.child_by_field_name("name") else {
                continue;
            };
            let name = node_text(name_node, source);
            let qualified = if prefix.is_empty() {
                name.to_string()
            } else {
                format!("{}.{}", prefix, name)
            };
            out.push((qualified.clone(), child));
            visit(child, source, &qualified, out);
        }
    }

    let mut out = Vec::new();
    visit(root, source, package.unwrap_or(""), &mut out);
    out
}

pub(crate) fn java_package(root: Node<'_>, source: &str) -> Option<String> {
    let mut cursor = root.walk();
    let package = root
        .named_children(&mut cursor)
        .find(|c| c.kind() == "package_declaration")?;
    let mut inner = package.walk();
    let name = package
        .named_children(&mut inner)
        .find(|c| matches!(c.kind(), "scoped_identifier" | "identifier"))?;
    Some(node_text(name, source).to_string())
}

/// Builds the symbol-table entry for one Java file.
pub fn extract_java(file: ResolvedFile, source_code: &str) -> Result<CompilationUnit, AppError> {
    let tree = parse(source_code, &java_language()).map_err(|message| AppError::AnalysisError {
        path: file.display_path().to_path_buf(),
        message,
    })?;
    let root = tree.root_node();
    if root.has_error() {
        tracing::debug!("{:?} contains syntax errors; extracting what parsed", file.display_path());
    }

    let package = java_package(root, source_code);
    let mut type_declarations = BTreeMap::new();

    for (qualified_name, type_node) in java_types(root, source_code, package.as_deref()) {
        let name = type_node
            .child_by_field_name("name")
            .map(|n| node_text(n, source_code).to_string())
            .unwrap_or_default();

        let callable_declarations: BTreeMap<String, Callable> = type_members(type_node, source_code)
            .into_iter()
            .map(|member| {
                let callable = Callable {
                    name: member.name,
                    declaration: member.declaration.clone(),
                    is_constructor: member.is_constructor,
                    code: node_text(member.node, source_code).to_string(),
                    start_line: member.node.start_position().row + 1,
                    end_line: member.node.end_position().row + 1,
                };
                (member.declaration, callable)
            })
            .collect();

        type_declarations.insert(
            qualified_name.clone(),
            TypeDeclaration {
                name,
                qualified_name,
                callable_declarations,
            },
        );
    }

    Ok(CompilationUnit {
        file,
        package,
        type_declarations,
    })
}

// --- Python ---

/// Dotted module name for a project-relative path: `pkg/util.py` -> `pkg.util`.
fn module_name(file: &ResolvedFile) -> String {
    let without_ext = file.display_path().with_extension("");
    let mut parts: Vec<String> = without_ext
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.len() > 1 && parts.last().is_some_and(|p| p == "__init__") {
        parts.pop();
    }
    parts.join(".")
}

/// Extracts the top-level functions of one Python file.
///
/// Uses a tree-sitter query and keeps the outermost node of each definition,
/// so decorated functions carry their decorators.
pub fn extract_python(file: ResolvedFile, source_code: &str) -> Result<PyModule, AppError> {
    let analysis_error = |message: String| AppError::AnalysisError {
        path: file.display_path().to_path_buf(),
        message,
    };
    let language = python_language();
    let tree = parse(source_code, &language).map_err(analysis_error)?;

    let query = Query::new(&language, PYTHON_FUNCTIONS_QUERY).map_err(|e| {
        analysis_error(format!(
            "Internal error: Failed to compile tree-sitter query. {}",
            e
        ))
    })?;

    let mut query_cursor = QueryCursor::new();
    let mut matches = query_cursor.matches(&query, tree.root_node(), source_code.as_bytes());

    let mut functions = Vec::new();
    while let Some(mat) = matches.next() {
        let mut definition = None;
        let mut name = None;
        for cap in mat.captures {
            let capture_name = query.capture_names()[cap.index as usize];
            if capture_name.starts_with("definition") {
                definition = Some(cap.node);
            } else if capture_name == "name" {
                name = Some(node_text(cap.node, source_code).to_string());
            }
        }
        if let (Some(node), Some(name)) = (definition, name) {
            functions.push((
                node.start_byte(),
                PyFunction {
                    name,
                    body: node_text(node, source_code).to_string(),
                    start_line: node.start_position().row + 1,
                    end_line: node.end_position().row + 1,
                },
            ));
        }
    }

    // Sort by source position.
    functions.sort_by_key(|(byte, _)| *byte);
    functions.dedup_by_key(|(byte, _)| *byte);

    let name = module_name(&file);
    Ok(PyModule {
        file,
        name,
        functions: functions.into_iter().map(|(_, f)| f).collect(),
    })
}
