use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;

/// Name of the project-local configuration file
pub const CONFIG_FILE_NAME: &str = "slidebolt.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Compiler Explorer instance configuration
    #[serde(default)]
    pub explorer: ExplorerConfig,

    /// Defaults applied to every snippet before directives run
    #[serde(default)]
    pub defaults: SnippetDefaults,

    /// Backoff policy for compile requests
    #[serde(default)]
    pub retry: RetryConfig,

    /// Deck checking configuration
    #[serde(default)]
    pub check: CheckConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplorerConfig {
    /// Base URL of the Compiler Explorer instance
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// User agent for requests
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Theme stored in generated links
    #[serde(default = "default_theme")]
    pub theme: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnippetDefaults {
    /// Compiler id used when a snippet names none
    #[serde(default = "default_compiler")]
    pub compiler: String,

    /// Compiler options used when a snippet names none
    #[serde(default = "default_options")]
    pub options: String,

    /// Options appended to every snippet
    #[serde(default = "default_extra_options")]
    pub extra_options: String,

    /// Compiler Explorer language id
    #[serde(default = "default_language")]
    pub language: String,

    /// Longest code line that fits on a slide
    #[serde(default = "default_max_line_length")]
    pub max_line_length: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Exponential growth factor between attempts
    #[serde(default = "default_factor")]
    pub factor: f64,

    /// Delay before the first retry, in milliseconds
    #[serde(default = "default_min_timeout_ms")]
    pub min_timeout_ms: u64,

    /// Upper bound on any single delay, in milliseconds
    #[serde(default = "default_max_timeout_ms")]
    pub max_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckConfig {
    /// Concurrent compile requests
    #[serde(default = "default_jobs")]
    pub jobs: usize,

    /// Fence languages treated as compilable snippets
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,

    /// Directory `FILE:` includes are resolved against
    pub include_dir: Option<PathBuf>,

    /// Show a progress bar while checking
    #[serde(default = "default_progress")]
    pub progress: bool,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout: default_timeout(),
            user_agent: default_user_agent(),
            theme: default_theme(),
        }
    }
}

impl Default for SnippetDefaults {
    fn default() -> Self {
        Self {
            compiler: default_compiler(),
            options: default_options(),
            extra_options: default_extra_options(),
            language: default_language(),
            max_line_length: default_max_line_length(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retries: default_retries(),
            factor: default_factor(),
            min_timeout_ms: default_min_timeout_ms(),
            max_timeout_ms: default_max_timeout_ms(),
        }
    }
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            jobs: default_jobs(),
            languages: default_languages(),
            include_dir: None,
            progress: default_progress(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            retries: self.retries,
            factor: self.factor,
            min_timeout: Duration::from_millis(self.min_timeout_ms),
            max_timeout: Duration::from_millis(self.max_timeout_ms),
        }
    }
}

impl Config {
    /// Load configuration from file or use defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::find_config_file()?,
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

            config.validate()?;
            Ok(config)
        } else if path.is_some() {
            anyhow::bail!("Config file not found: {}", config_path.display())
        } else {
            Ok(Config::default())
        }
    }

    /// Initialize configuration file
    pub fn init(output_dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(output_dir)
            .with_context(|| format!("Failed to create directory: {}", output_dir.display()))?;

        let config_path = output_dir.join(CONFIG_FILE_NAME);
        let content = toml::to_string_pretty(&Config::default())
            .context("Failed to serialize default configuration")?;

        std::fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(config_path)
    }

    fn validate(&self) -> Result<()> {
        url::Url::parse(&self.explorer.base_url)
            .with_context(|| format!("Invalid explorer.base_url: {}", self.explorer.base_url))?;

        if self.check.jobs == 0 {
            anyhow::bail!("check.jobs must be at least 1");
        }
        if self.retry.factor < 1.0 {
            anyhow::bail!("retry.factor must be at least 1.0");
        }
        Ok(())
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> Result<PathBuf> {
        let current_dir = std::env::current_dir()
            .context("Failed to get current directory")?;

        let mut dir = current_dir.as_path();
        loop {
            let config_path = dir.join(CONFIG_FILE_NAME);
            if config_path.exists() {
                return Ok(config_path);
            }

            match dir.parent() {
                Some(parent) => dir = parent,
                None => break,
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let config_path = config_dir.join("slidebolt").join("config.toml");
            if config_path.exists() {
                return Ok(config_path);
            }
        }

        // Return default path (may not exist)
        Ok(current_dir.join(CONFIG_FILE_NAME))
    }
}

// Default value functions
fn default_base_url() -> String {
    "https://godbolt.org/".to_string()
}

fn default_timeout() -> u64 {
    60
}

fn default_user_agent() -> String {
    format!("slidebolt/{}", env!("CARGO_PKG_VERSION"))
}

fn default_theme() -> String {
    "dark".to_string()
}

fn default_compiler() -> String {
    "g82".to_string()
}

fn default_options() -> String {
    "-O2 -march=haswell".to_string()
}

fn default_extra_options() -> String {
    "-Wall -Wextra -pedantic".to_string()
}

fn default_language() -> String {
    "c++".to_string()
}

fn default_max_line_length() -> usize {
    63
}

fn default_retries() -> u32 {
    10
}

fn default_factor() -> f64 {
    2.0
}

fn default_min_timeout_ms() -> u64 {
    1000
}

fn default_max_timeout_ms() -> u64 {
    30_000
}

fn default_jobs() -> usize {
    4
}

fn default_languages() -> Vec<String> {
    vec!["cpp".to_string()]
}

fn default_progress() -> bool {
    true
}
