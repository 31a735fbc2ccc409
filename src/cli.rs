use std::io::Read;
use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};

/// Check and link presentation code snippets against Compiler Explorer
#[derive(Parser)]
#[command(
    name = "slidebolt",
    version,
    about = "Check and link presentation code snippets against Compiler Explorer",
    long_about = "Slidebolt reads code snippets annotated with `///` directive comments (compiler, options, libraries, execute, hide), builds Compiler Explorer links for them and compiles them through the Compiler Explorer API so that every snippet in a deck is known to build."
)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Compiler Explorer instance to use
    #[arg(long, global = true, env = "SLIDEBOLT_BASE_URL", value_name = "URL")]
    pub base_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the parsed directives of a snippet as JSON
    Parse {
        /// Snippet file, or `-` for stdin
        #[arg(value_name = "FILE", default_value = "-")]
        input: PathBuf,
    },

    /// Print the snippet as it appears on the slide
    Display {
        /// Snippet file, or `-` for stdin
        #[arg(value_name = "FILE", default_value = "-")]
        input: PathBuf,
    },

    /// Print a Compiler Explorer link for a snippet
    Link {
        /// Snippet file, or `-` for stdin
        #[arg(value_name = "FILE", default_value = "-")]
        input: PathBuf,
    },

    /// Compile a snippet and check it against its directives
    Compile {
        /// Snippet file, or `-` for stdin
        #[arg(value_name = "FILE", default_value = "-")]
        input: PathBuf,

        /// Print the full JSON response
        #[arg(long)]
        json: bool,
    },

    /// Compile every snippet of a markdown deck
    Check {
        /// Deck entry point, usually index.md
        #[arg(value_name = "DECK")]
        deck: PathBuf,

        /// Directory `FILE:` includes are resolved against
        #[arg(short, long, value_name = "DIR")]
        include_dir: Option<PathBuf>,

        /// Concurrent compile requests
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Fence languages to compile (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        languages: Vec<String>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print a deck with all `FILE:` includes expanded
    Preprocess {
        /// Deck entry point
        #[arg(value_name = "DECK")]
        deck: PathBuf,

        /// Directory `FILE:` includes are resolved against
        #[arg(short, long, value_name = "DIR")]
        include_dir: Option<PathBuf>,
    },

    /// List the files a deck includes
    Files {
        /// Deck entry point
        #[arg(value_name = "DECK")]
        deck: PathBuf,
    },

    /// Initialize Slidebolt configuration
    Init {
        /// Output directory for configuration
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Read a snippet from `path`, where `-` means stdin
pub fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read snippet from stdin")?;
        return Ok(text);
    }

    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read snippet: {}", path.display()))
}

pub fn generate_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();
    generate(shell, &mut cmd, bin_name, &mut std::io::stdout());
}
