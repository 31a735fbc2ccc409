use std::sync::LazyLock;
use regex::Regex;
use serde::Serialize;

/// `[1,4-8]` style line highlight annotations, optionally prefixed by a start line
static LINE_NUMBERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d*)\[([\s\d,|-]*)\]").unwrap());

/// A fenced code block found in a deck
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snippet {
    /// Zero-based position among the extracted snippets
    pub index: usize,
    /// Fence language as written in the markdown
    pub language: String,
    /// 1-based line of the opening fence
    pub line: usize,
    pub code: String,
}

/// Extract fenced blocks whose language is one of `languages`.
///
/// An unterminated fence runs to the end of the document.
pub fn extract(markdown: &str, languages: &[String]) -> Vec<Snippet> {
    let mut snippets = Vec::new();
    let mut open: Option<(String, usize, String)> = None;

    for (idx, raw) in markdown.split('\n').enumerate() {
        let line = raw.strip_suffix('\r').unwrap_or(raw);
        let trimmed = line.trim_start();

        match open.take() {
            None => {
                if let Some(info) = trimmed.strip_prefix("```") {
                    open = Some((fence_language(info), idx + 1, String::new()));
                }
            }
            Some((language, start, mut code)) => {
                if trimmed.starts_with("```") && trimmed.trim_end().trim_start_matches('`').is_empty() {
                    push_snippet(&mut snippets, languages, language, start, code);
                } else {
                    code.push_str(line);
                    code.push('\n');
                    open = Some((language, start, code));
                }
            }
        }
    }

    if let Some((language, start, code)) = open {
        push_snippet(&mut snippets, languages, language, start, code);
    }

    snippets
}

fn push_snippet(
    snippets: &mut Vec<Snippet>,
    languages: &[String],
    language: String,
    line: usize,
    code: String,
) {
    if languages.iter().any(|l| l.eq_ignore_ascii_case(&language)) {
        snippets.push(Snippet {
            index: snippets.len(),
            language,
            line,
            code,
        });
    }
}

/// Language named by a fence info string, ignoring line-number annotations
pub fn fence_language(info: &str) -> String {
    let cleaned = LINE_NUMBERS.replace(info, "");
    cleaned
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Map a fence language to a Compiler Explorer language id
pub fn language_id(fence_language: &str) -> &str {
    match fence_language.to_ascii_lowercase().as_str() {
        "cpp" | "c++" | "cxx" | "cc" => "c++",
        "c" => "c",
        "rust" | "rs" => "rust",
        "go" | "golang" => "go",
        "python" | "py" => "python",
        _ => fence_language,
    }
}
