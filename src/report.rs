use std::sync::LazyLock;
use colored::Colorize;
use regex::Regex;

use crate::checker::{DeckReport, SnippetStatus};
use crate::directives::CompileInfo;
use crate::errors::SlideboltError;

static ANSI_ESCAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)|\x1b[@-Z\\-_]").unwrap()
});

/// Remove ANSI escape sequences, as emitted by colorized compiler diagnostics
pub fn strip_ansi(text: &str) -> String {
    ANSI_ESCAPE.replace_all(text, "").into_owned()
}

/// Describe a failed snippet with its source and the compiler's output
pub fn render_failure(err: &SlideboltError, info: &CompileInfo) -> String {
    let output = match err {
        SlideboltError::CompileFailed { stderr, stdout, .. } => {
            if stderr.is_empty() { stdout.clone() } else { stderr.clone() }
        }
        SlideboltError::OutputMismatch { actual, .. } => actual.clone(),
        other => other.to_string(),
    };

    format!("{}\ncode:\n{}\noutput:\n{}", err, info.source, output)
}

/// One line per snippet followed by a summary
pub fn render_report(report: &DeckReport) -> String {
    let mut out = String::new();

    for result in &report.results {
        let marker = match result.status {
            SnippetStatus::Passed => "✓".green(),
            SnippetStatus::Failed => "✗".red(),
        };
        out.push_str(&format!(
            "{} snippet {} (line {}, {})\n",
            marker, result.index, result.line, result.compiler
        ));

        for diagnostic in &result.diagnostics {
            out.push_str(&format!("    {} {}\n", "warning:".yellow(), diagnostic));
        }

        if let Some(message) = &result.message {
            for line in message.lines() {
                out.push_str(&format!("    {}\n", line));
            }
        }
        if let Some(link) = &result.link {
            out.push_str(&format!("    {} {}\n", "open:".dimmed(), link));
        }
    }

    let summary = format!(
        "{} passed, {} failed, {} total",
        report.passed(),
        report.failed(),
        report.results.len()
    );
    if report.failed() == 0 {
        out.push_str(&summary.green().bold().to_string());
    } else {
        out.push_str(&summary.red().bold().to_string());
    }
    out.push('\n');
    out
}
