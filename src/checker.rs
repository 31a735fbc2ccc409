use std::path::{Path, PathBuf};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::client::ExplorerClient;
use crate::config::Config;
use crate::directives::{DirectiveParser, ParsedSnippet};
use crate::errors::Result;
use crate::link::build_link;
use crate::preprocess::Preprocessor;
use crate::report::render_failure;
use crate::snippets::{self, Snippet};

/// Compiles every snippet of a deck and records the outcome
pub struct SnippetChecker {
    config: Config,
    client: ExplorerClient,
    parser: DirectiveParser,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SnippetStatus {
    Passed,
    Failed,
}

/// Outcome for a single snippet
#[derive(Debug, Clone, Serialize)]
pub struct SnippetResult {
    pub index: usize,
    /// Line of the opening fence in the expanded deck
    pub line: usize,
    pub compiler: String,
    pub status: SnippetStatus,
    pub message: Option<String>,
    /// Compiler Explorer link, present for failures
    pub link: Option<String>,
    pub diagnostics: Vec<String>,
}

/// Outcome for a whole deck
#[derive(Debug, Clone, Serialize)]
pub struct DeckReport {
    pub deck: PathBuf,
    pub generated_at: DateTime<Utc>,
    pub results: Vec<SnippetResult>,
}

impl DeckReport {
    pub fn passed(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.status == SnippetStatus::Passed)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.passed()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }
}

impl SnippetChecker {
    pub fn new(config: Config) -> Result<Self> {
        let client = ExplorerClient::new(&config.explorer, config.retry.policy())?;
        Ok(Self::with_client(config, client))
    }

    pub fn with_client(config: Config, client: ExplorerClient) -> Self {
        let parser = DirectiveParser::new(&config);
        Self { config, client, parser }
    }

    /// Extract and parse the compilable snippets of an expanded deck
    pub fn prepare(&self, markdown: &str) -> Vec<(Snippet, ParsedSnippet)> {
        snippets::extract(markdown, &self.config.check.languages)
            .into_iter()
            .map(|snippet| {
                let parsed = self
                    .parser
                    .clone()
                    .with_language(snippets::language_id(&snippet.language))
                    .parse(&snippet.code);
                (snippet, parsed)
            })
            .collect()
    }

    /// Preprocess the deck at `path` and check all of its snippets
    pub async fn check_deck(&self, path: &Path) -> Result<DeckReport> {
        let include_dir = self
            .config
            .check
            .include_dir
            .clone()
            .or_else(|| path.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."));

        info!("Checking deck {} (includes from {})", path.display(), include_dir.display());
        let markdown = Preprocessor::new(include_dir).process_file(path)?;

        Ok(self.check_markdown(path, &markdown).await)
    }

    /// Check every snippet of an already expanded deck
    pub async fn check_markdown(&self, deck: &Path, markdown: &str) -> DeckReport {
        let prepared = self.prepare(markdown);
        info!("Found {} snippets", prepared.len());

        let progress = self.progress_bar(prepared.len() as u64);
        let theme = self.config.explorer.theme.as_str();

        let mut results: Vec<SnippetResult> = stream::iter(prepared)
            .map(|(snippet, parsed)| {
                let progress = progress.clone();
                async move {
                    let result = check_one(&self.client, &snippet, parsed, theme).await;
                    progress.inc(1);
                    result
                }
            })
            .buffer_unordered(self.config.check.jobs.max(1))
            .collect()
            .await;

        results.sort_by_key(|r| r.index);
        progress.finish_and_clear();

        DeckReport {
            deck: deck.to_path_buf(),
            generated_at: Utc::now(),
            results,
        }
    }

    fn progress_bar(&self, len: u64) -> ProgressBar {
        if !self.config.check.progress {
            return ProgressBar::hidden();
        }
        let style = ProgressStyle::with_template("{spinner} [{bar:30}] {pos}/{len} snippets")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        ProgressBar::new(len).with_style(style)
    }
}

async fn check_one(
    client: &ExplorerClient,
    snippet: &Snippet,
    parsed: ParsedSnippet,
    theme: &str,
) -> SnippetResult {
    let ParsedSnippet { info, diagnostics } = parsed;
    for diagnostic in &diagnostics {
        warn!("snippet {}: {}", snippet.index, diagnostic);
    }

    let (status, message, link) = match client.check(&info).await {
        Ok(_) => {
            debug!("snippet {} passed", snippet.index);
            (SnippetStatus::Passed, None, None)
        }
        Err(e) => {
            warn!("snippet {} failed: {}", snippet.index, e);
            (
                SnippetStatus::Failed,
                Some(render_failure(&e, &info)),
                build_link(&info, theme).ok(),
            )
        }
    };

    SnippetResult {
        index: snippet.index,
        line: snippet.line,
        compiler: info.compiler,
        status,
        message,
        link,
        diagnostics: diagnostics.iter().map(ToString::to_string).collect(),
    }
}
