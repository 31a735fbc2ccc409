//! Directive comments embedded in presentation snippets.
//!
//! A snippet is plain source code where some lines are `///` comments that
//! configure how the snippet is compiled rather than being part of it:
//!
//! ```text
//! /// compiler=clang1600
//! /// options=-std=c++20 -O3
//! /// libs=fmt:trunk
//! /// execute
//! #include <fmt/core.h>
//! int main() { fmt::print("hi\n"); }
//! ```
//!
//! Directive lines are removed from the source. `hide`/`unhide` regions and
//! `// setup` blocks stay in the compiled source but are left out of the
//! source shown on the slide.

use std::sync::LazyLock;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::Config;

static KEY_VALUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*///\s*([A-Za-z][\w-]*)\s*=(.*)$").unwrap());
static FLAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*//(/)?\s*(execute|hide|unhide)\s*$").unwrap());
static LEGACY_COMPILER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*///\s*([^:=\s]+):(.*)$").unwrap());

const SETUP_MARKER: &str = "// setup";

/// A library reference from a `/// libs=` directive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Library {
    pub name: String,
    pub version: String,
}

/// Everything needed to compile or link a single snippet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompileInfo {
    /// Source sent to the compiler
    pub source: String,
    /// Source shown on the slide
    pub display_source: String,
    pub language: String,
    pub compiler: String,
    pub options: String,
    pub libs: Vec<Library>,
    pub execute: bool,
    /// Set when the snippet is expected not to compile
    pub fail_reason: Option<String>,
    /// Lines the program's stdout must contain
    pub expected_output: Vec<String>,
    pub base_url: String,
}

impl CompileInfo {
    pub fn should_fail(&self) -> bool {
        self.fail_reason.is_some()
    }
}

/// Non-fatal findings about a snippet
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// 1-based line within the snippet
    pub line: usize,
    pub kind: DiagnosticKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DiagnosticKind {
    LineTooLong { length: usize, max: usize },
    HideWithoutTripleSlash,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            DiagnosticKind::LineTooLong { length, max } => {
                write!(f, "line {}: {} characters (max {})", self.line, length, max)
            }
            DiagnosticKind::HideWithoutTripleSlash => {
                write!(f, "line {}: (un)hide should be preceded by 3 forward slashes", self.line)
            }
        }
    }
}

/// Result of parsing one snippet
#[derive(Debug, Clone, Serialize)]
pub struct ParsedSnippet {
    pub info: CompileInfo,
    pub diagnostics: Vec<Diagnostic>,
}

/// Parses directive comments using configured defaults
#[derive(Debug, Clone)]
pub struct DirectiveParser {
    compiler: String,
    options: String,
    extra_options: String,
    language: String,
    base_url: String,
    max_line_length: usize,
}

enum Directive {
    Compiler(String),
    Options(String),
    Libs(Vec<Library>),
    Fails(String),
    Output(String),
    Legacy { compiler: String, options: String },
    Execute,
    Hide { triple: bool, hide: bool },
}

impl Default for DirectiveParser {
    fn default() -> Self {
        Self::new(&Config::default())
    }
}

impl DirectiveParser {
    pub fn new(config: &Config) -> Self {
        Self {
            compiler: config.defaults.compiler.clone(),
            options: config.defaults.options.clone(),
            extra_options: config.defaults.extra_options.clone(),
            language: config.defaults.language.clone(),
            base_url: config.explorer.base_url.clone(),
            max_line_length: config.defaults.max_line_length,
        }
    }

    /// Use a different Compiler Explorer language for parsed snippets
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn parse(&self, text: &str) -> ParsedSnippet {
        let mut compiler = self.compiler.clone();
        let mut options = self.options.clone();
        let mut libs = Vec::new();
        let mut execute = false;
        let mut fail_reason = None;
        let mut expected_output = Vec::new();
        let mut diagnostics = Vec::new();

        let mut source = String::new();
        let mut display_source = String::new();
        let mut in_setup = false;
        let mut hidden = false;

        for (idx, raw) in text.split('\n').enumerate() {
            let line = raw.strip_suffix('\r').unwrap_or(raw);
            let line_no = idx + 1;

            if let Some(directive) = match_directive(line) {
                match directive {
                    Directive::Compiler(id) => compiler = id,
                    Directive::Options(args) => options = args,
                    Directive::Libs(mut found) => libs.append(&mut found),
                    Directive::Fails(reason) => fail_reason = Some(reason),
                    Directive::Output(expected) => {
                        execute = true;
                        expected_output.push(expected);
                    }
                    Directive::Legacy { compiler: id, options: args } => {
                        compiler = id;
                        options = args;
                    }
                    Directive::Execute => execute = true,
                    Directive::Hide { triple, hide } => {
                        if !triple {
                            warn!("(un)hide should be preceded by 3 forward slashes");
                            diagnostics.push(Diagnostic {
                                line: line_no,
                                kind: DiagnosticKind::HideWithoutTripleSlash,
                            });
                        }
                        hidden = hide;
                    }
                }
                continue;
            }

            if line.trim_end() == SETUP_MARKER {
                in_setup = true;
            } else if !line.starts_with(' ') {
                in_setup = false;
            }

            source.push_str(line);
            source.push('\n');
            if !in_setup && !hidden {
                display_source.push_str(line);
                display_source.push('\n');
            }

            let length = line.chars().count();
            if length > self.max_line_length {
                debug!("Line too long: {:?}", line);
                diagnostics.push(Diagnostic {
                    line: line_no,
                    kind: DiagnosticKind::LineTooLong {
                        length,
                        max: self.max_line_length,
                    },
                });
            }
        }

        let options = join_options(&options, &self.extra_options);

        ParsedSnippet {
            info: CompileInfo {
                source: trim(&source),
                display_source: trim(&display_source),
                language: self.language.clone(),
                compiler,
                options,
                libs,
                execute,
                fail_reason,
                expected_output,
                base_url: self.base_url.clone(),
            },
            diagnostics,
        }
    }
}

fn match_directive(line: &str) -> Option<Directive> {
    if let Some(caps) = KEY_VALUE.captures(line) {
        let value = caps[2].trim().to_string();
        return match &caps[1] {
            "compiler" => Some(Directive::Compiler(value)),
            "options" => Some(Directive::Options(value)),
            "libs" => Some(Directive::Libs(parse_libs(&value))),
            "fails" => Some(Directive::Fails(value)),
            "output" => Some(Directive::Output(value)),
            _ => None,
        };
    }

    if let Some(caps) = FLAG.captures(line) {
        let triple = caps.get(1).is_some();
        return Some(match &caps[2] {
            "execute" => Directive::Execute,
            "hide" => Directive::Hide { triple, hide: true },
            _ => Directive::Hide { triple, hide: false },
        });
    }

    LEGACY_COMPILER.captures(line).map(|caps| Directive::Legacy {
        compiler: caps[1].to_string(),
        options: caps[2].trim().to_string(),
    })
}

/// Parse `name:version` pairs separated by commas; malformed entries are skipped
pub fn parse_libs(value: &str) -> Vec<Library> {
    value
        .split(',')
        .filter_map(|entry| {
            let (name, version) = entry.trim().split_once(':')?;
            let (name, version) = (name.trim(), version.trim());
            if name.is_empty() || version.is_empty() {
                return None;
            }
            Some(Library {
                name: name.to_string(),
                version: version.to_string(),
            })
        })
        .collect()
}

fn join_options(options: &str, extra: &str) -> String {
    match (options.trim(), extra.trim()) {
        (o, "") => o.to_string(),
        ("", e) => e.to_string(),
        (o, e) => format!("{} {}", o, e),
    }
}

/// Drop leading newlines and collapse trailing blank lines to a single `\n`
fn trim(source: &str) -> String {
    let mut trimmed = source.trim_start_matches('\n');
    while trimmed.ends_with("\n\n") {
        trimmed = &trimmed[..trimmed.len() - 1];
    }
    trimmed.to_string()
}
