// src/extract.rs

use crate::types::CodeBlock;
use regex::Regex;
use std::sync::LazyLock;

/// Opening fence with an optional language tag, the body, and the closing fence.
///
/// The body starts on the next line, or right after the tag when the opening
/// line carries code as well.
static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[ \t]*([\w+#.-]*)[ \t]*\n?(.*?)```").expect("fenced block pattern is valid")
});

/// Extracts every triple-backtick fenced block from model output.
///
/// Blocks come back in document order. Text without fences yields an empty list.
pub fn extract_code_blocks(text: &str) -> Vec<CodeBlock> {
    FENCED_BLOCK
        .captures_iter(text)
        .map(|caps| {
            let language = caps
                .get(1)
                .map(|m| m.as_str())
                .filter(|tag| !tag.is_empty())
                .map(str::to_string);
            CodeBlock {
                code: caps[2].to_string(),
                language,
            }
        })
        .collect()
}
