// src/sanitizer.rs

use crate::symbol_extractor::{
    java_language, java_package, java_types, node_text, parse, type_members,
};
use std::collections::HashSet;
use std::ops::Range;
use tree_sitter::Node;

/// Simple names of every method invoked anywhere inside `node`.
fn invoked_methods(node: Node<'_>, source: &str) -> HashSet<String> {
    let mut names = HashSet::new();
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        if current.kind() == "method_invocation" {
            if let Some(name) = current.child_by_field_name("name") {
                names.insert(node_text(name, source).to_string());
            }
        }
        let mut cursor = current.walk();
        stack.extend(current.named_children(&mut cursor));
    }
    names
}

/// The byte range to cut for a removed member: its javadoc, and whole lines when it owns them.
fn removal_range(node: Node<'_>, source: &str) -> Range<usize> {
    let mut start = node.start_byte();
    if let Some(prev) = node.prev_sibling() {
        let between = &source[prev.end_byte()..start];
        if prev.kind() == "block_comment"
            && node_text(prev, source).starts_with("/**")
            && between.trim().is_empty()
        {
            start = prev.start_byte();
        }
    }

    let line_start = source[..start].rfind('\n').map_or(0, |i| i + 1);
    if source[line_start..start].trim().is_empty() {
        start = line_start;
    }

    let mut end = node.end_byte();
    let rest = &source[end..];
    let line_end = rest.find('\n').map_or(rest.len(), |i| i + 1);
    if rest[..line_end].trim().is_empty() {
        end += line_end;
    }

    start..end
}

/// Reduces a Java compilation unit to what a model needs to test one method.
///
/// Keeps the focal method, every constructor and the methods the focal method
/// calls by name; all other methods are removed along with their javadoc.
/// The focal method is looked up only in the type named `focal_type` (its
/// qualified name, package included), so a signature shared with another type
/// in the file cannot be mistaken for it.
/// Returns an error when that type declares no method with the `focal_declaration` signature.
pub fn sanitize_focal_class(
    source_code: &str,
    focal_type: &str,
    focal_declaration: &str,
) -> Result<String, String> {
    let tree = parse(source_code, &java_language())?;
    let root = tree.root_node();
    let package = java_package(root, source_code);

    let types = java_types(root, source_code, package.as_deref());
    let (_, focal_type_node) = types
        .iter()
        .find(|(name, _)| name == focal_type)
        .ok_or_else(|| format!("Type '{}' not found", focal_type))?;

    let focal = type_members(*focal_type_node, source_code)
        .into_iter()
        .find(|m| !m.is_constructor && m.declaration == focal_declaration)
        .ok_or_else(|| {
            format!(
                "Focal method '{}' not found in '{}'",
                focal_declaration, focal_type
            )
        })?;

    let members: Vec<_> = types
        .iter()
        .flat_map(|(_, type_node)| type_members(*type_node, source_code))
        .collect();

    let called = invoked_methods(focal.node, source_code);

    let mut cuts: Vec<Range<usize>> = members
        .iter()
        .filter(|m| !m.is_constructor && m.node.id() != focal.node.id() && !called.contains(&m.name))
        .map(|m| removal_range(m.node, source_code))
        .collect();
    cuts.sort_by_key(|r| r.start);

    let mut sanitized = String::with_capacity(source_code.len());
    let mut cursor = 0;
    for cut in cuts {
        // Ranges never overlap; skip anything already cut.
        if cut.start < cursor {
            continue;
        }
        sanitized.push_str(&source_code[cursor..cut.start]);
        cursor = cut.end;
    }
    sanitized.push_str(&source_code[cursor..]);
    Ok(sanitized)
}
