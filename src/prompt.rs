// src/prompt.rs

/// Builds the instruction sent to the model for one focal method.
///
/// The result is a question line, a blank line and the code in a fenced block
/// tagged with `language`. The closing fence always starts on its own line.
pub fn format_instruction(
    code: &str,
    focal_method: &str,
    focal_class: Option<&str>,
    task: &str,
    language: &str,
) -> String {
    let task = task.to_lowercase();
    let mut inst = match focal_class {
        Some(class) => format!(
            "Question: Can you {} for the method `{}` in the class `{}` below?\n",
            task, focal_method, class
        ),
        None => format!(
            "Question: Can you {} for the method `{}` below?\n",
            task, focal_method
        ),
    };

    inst.push('\n');
    inst.push_str(&format!("```{}\n", language));
    inst.push_str(code);
    if code.ends_with('\n') {
        inst.push_str("```");
    } else {
        inst.push_str("\n```");
    }
    inst.push('\n');
    inst
}
