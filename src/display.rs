use console::{Style, Term, measure_text_width, truncate_str};
use std::io::{self, Write};
use syntect::easy::HighlightLines;
use syntect::highlighting::{Theme, ThemeSet};
use syntect::parsing::SyntaxSet;
use syntect::util::as_24_bit_terminal_escaped;

const THEME: &str = "base16-ocean.dark";
const FALLBACK_WIDTH: usize = 100;
const RESET: &str = "\x1b[0m";

/// Shows an instruction and the model's answer.
pub trait Present {
    fn present(&self, instruction: &str, answer: &str, title: &str, syntax: &str) -> io::Result<()>;
}

#[derive(Debug, Clone, Copy, Default)]
struct PanelOptions {
    line_numbers: bool,
    word_wrap: bool,
}

/// syntect state, loaded once per run.
struct Highlighter {
    syntaxes: SyntaxSet,
    theme: Theme,
}

impl Highlighter {
    fn load() -> Option<Self> {
        let mut themes = ThemeSet::load_defaults();
        let theme = themes.themes.remove(THEME)?;
        Some(Self {
            syntaxes: SyntaxSet::load_defaults_nonewlines(),
            theme,
        })
    }

    /// Highlights pre-split segments in order so multi-line constructs keep their state.
    fn highlight(&self, segments: &[String], token: &str) -> Vec<String> {
        let syntax = self
            .syntaxes
            .find_syntax_by_token(token)
            .unwrap_or_else(|| self.syntaxes.find_syntax_plain_text());
        let mut lines = HighlightLines::new(syntax, &self.theme);

        segments
            .iter()
            .map(|segment| match lines.highlight_line(segment, &self.syntaxes) {
                Ok(ranges) => format!("{}{}", as_24_bit_terminal_escaped(&ranges, false), RESET),
                Err(e) => {
                    tracing::debug!("highlighting failed: {e}");
                    segment.clone()
                }
            })
            .collect()
    }
}

/// Renders bordered panels on stdout.
pub struct ConsolePresenter {
    term: Term,
    width: Option<usize>,
    styled: bool,
    highlighter: Option<Highlighter>,
    instruction_border: Style,
    answer_border: Style,
    gutter_style: Style,
}

impl ConsolePresenter {
    pub fn new() -> Self {
        let term = Term::stdout();
        let styled = term.features().colors_supported() && console::colors_enabled();
        Self {
            term,
            width: None,
            styled,
            highlighter: if styled { Highlighter::load() } else { None },
            instruction_border: Style::new().white(),
            answer_border: Style::new().blue(),
            gutter_style: Style::new().dim(),
        }
    }

    /// No colour, fixed width; used when output is captured.
    pub fn plain(width: usize) -> Self {
        Self {
            term: Term::stdout(),
            width: Some(width),
            styled: false,
            highlighter: None,
            instruction_border: Style::new(),
            answer_border: Style::new(),
            gutter_style: Style::new(),
        }
    }

    fn width(&self) -> usize {
        self.width
            .or_else(|| self.term.size_checked().map(|(_, cols)| cols as usize))
            .unwrap_or(FALLBACK_WIDTH)
            .max(20)
    }

    /// Renders one panel as terminal lines, borders included.
    fn render_panel(
        &self,
        body: &str,
        title: &str,
        syntax: &str,
        border: &Style,
        options: PanelOptions,
    ) -> Vec<String> {
        let width = self.width();
        // Two border columns plus one space of padding on each side.
        let inner = width - 4;

        let source_lines: Vec<&str> = if body.is_empty() {
            vec![""]
        } else {
            body.lines().collect()
        };
        let number_width = source_lines.len().to_string().len();
        let gutter_width = if options.line_numbers { number_width + 3 } else { 0 };
        let text_width = inner.saturating_sub(gutter_width).max(1);

        // (line number on the first segment only, segment text)
        let mut segments: Vec<(Option<usize>, String)> = Vec::new();
        for (idx, line) in source_lines.iter().enumerate() {
            let line = line.replace('\t', "    ");
            let pieces = if options.word_wrap {
                wrap_line(&line, text_width)
            } else {
                vec![truncate_str(&line, text_width, "…").into_owned()]
            };
            for (n, piece) in pieces.into_iter().enumerate() {
                segments.push(((n == 0).then_some(idx + 1), piece));
            }
        }

        let texts: Vec<String> = segments.iter().map(|(_, s)| s.clone()).collect();
        let rendered = match &self.highlighter {
            Some(h) if self.styled => h.highlight(&texts, syntax),
            _ => texts,
        };

        let mut out = Vec::with_capacity(rendered.len() + 2);
        out.push(self.top_border(title, width, border));
        for ((number, _), text) in segments.iter().zip(rendered) {
            let gutter = if options.line_numbers {
                let label = match number {
                    Some(n) => format!("{:>w$} │ ", n, w = number_width),
                    None => format!("{:>w$} │ ", "", w = number_width),
                };
                self.gutter_style.apply_to(label).to_string()
            } else {
                String::new()
            };
            let used = gutter_width + measure_text_width(&text);
            let pad = " ".repeat(inner.saturating_sub(used));
            out.push(format!(
                "{} {}{}{} {}",
                border.apply_to("│"),
                gutter,
                text,
                pad,
                border.apply_to("│")
            ));
        }
        out.push(
            border
                .apply_to(format!("╰{}╯", "─".repeat(width - 2)))
                .to_string(),
        );
        out
    }

    fn top_border(&self, title: &str, width: usize, border: &Style) -> String {
        let span = width - 2;
        let title = truncate_str(title, span.saturating_sub(2), "…");
        let label = format!(" {} ", title);
        let label_width = measure_text_width(&label);
        if title.is_empty() || label_width > span {
            return border.apply_to(format!("╭{}╮", "─".repeat(span))).to_string();
        }
        let left = (span - label_width) / 2;
        let right = span - label_width - left;
        format!(
            "{}{}{}",
            border.apply_to(format!("╭{}", "─".repeat(left))),
            label,
            border.apply_to(format!("{}╮", "─".repeat(right)))
        )
    }

    fn render(&self, instruction: &str, answer: &str, title: &str, syntax: &str) -> Vec<String> {
        let mut lines = vec![String::new()];
        lines.extend(self.render_panel(
            instruction,
            "Instruction",
            "markdown",
            &self.instruction_border,
            PanelOptions::default(),
        ));
        lines.push(String::new());
        lines.extend(self.render_panel(
            answer,
            title,
            syntax,
            &self.answer_border,
            PanelOptions {
                line_numbers: true,
                word_wrap: true,
            },
        ));
        lines
    }
}

impl Default for ConsolePresenter {
    fn default() -> Self {
        Self::new()
    }
}

impl Present for ConsolePresenter {
    fn present(&self, instruction: &str, answer: &str, title: &str, syntax: &str) -> io::Result<()> {
        let mut stdout = self.term.clone();
        for line in self.render(instruction, answer, title, syntax) {
            writeln!(stdout, "{}", line)?;
        }
        stdout.flush()
    }
}

/// Splits `line` into pieces no wider than `width`, breaking at spaces when possible.
fn wrap_line(line: &str, width: usize) -> Vec<String> {
    if measure_text_width(line) <= width {
        return vec![line.to_string()];
    }

    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut current_width = 0;

    for word in line.split_inclusive(' ') {
        let word_width = measure_text_width(word);
        if current_width + word_width > width && !current.is_empty() {
            pieces.push(std::mem::take(&mut current));
            current_width = 0;
        }
        if word_width > width {
            // Hard-break words longer than a whole line.
            for ch in word.chars() {
                let ch_width = measure_text_width(ch.encode_utf8(&mut [0; 4]));
                if current_width + ch_width > width && !current.is_empty() {
                    pieces.push(std::mem::take(&mut current));
                    current_width = 0;
                }
                current.push(ch);
                current_width += ch_width;
            }
        } else {
            current.push_str(word);
            current_width += word_width;
        }
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}
