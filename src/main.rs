use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use slidebolt::checker::SnippetChecker;
use slidebolt::cli::{self, Cli, Commands};
use slidebolt::client::{verify, ExplorerClient};
use slidebolt::config::Config;
use slidebolt::directives::{DirectiveParser, ParsedSnippet};
use slidebolt::link::build_link;
use slidebolt::preprocess::{file_list, Preprocessor};
use slidebolt::report::{render_failure, render_report};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.log_json, cli.no_color)?;

    if cli.no_color {
        colored::control::set_override(false);
    }

    // Load configuration
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(base_url) = cli.base_url {
        config.explorer.base_url = base_url;
    }

    info!("Starting Slidebolt v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Parse { input } => {
            let parsed = parse_snippet(&config, &cli::read_input(&input)?);
            println!("{}", serde_json::to_string_pretty(&parsed)?);
        }

        Commands::Display { input } => {
            let parsed = parse_snippet(&config, &cli::read_input(&input)?);
            print!("{}", parsed.info.display_source);
        }

        Commands::Link { input } => {
            let parsed = parse_snippet(&config, &cli::read_input(&input)?);
            let link = build_link(&parsed.info, &config.explorer.theme)?;
            println!("{}", link);
        }

        Commands::Compile { input, json } => {
            let parsed = parse_snippet(&config, &cli::read_input(&input)?);
            let client = ExplorerClient::new(&config.explorer, config.retry.policy())?;

            let response = match client.compile(&parsed.info).await {
                Ok(response) => response,
                Err(e) => {
                    eprintln!("❌ Compilation request failed: {}", e);
                    std::process::exit(1);
                }
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                let stdout = response.stdout_text();
                let stderr = response.stderr_text();
                if !stdout.is_empty() {
                    println!("{}", stdout);
                }
                if !stderr.is_empty() {
                    eprintln!("{}", stderr);
                }
            }

            if let Err(e) = verify(&parsed.info, &response) {
                eprintln!("❌ {}", render_failure(&e, &parsed.info));
                if let Ok(link) = build_link(&parsed.info, &config.explorer.theme) {
                    eprintln!("open: {}", link);
                }
                std::process::exit(1);
            }
        }

        Commands::Check { deck, include_dir, jobs, languages, json } => {
            if include_dir.is_some() {
                config.check.include_dir = include_dir;
            }
            if let Some(jobs) = jobs {
                config.check.jobs = jobs.max(1);
            }
            if !languages.is_empty() {
                config.check.languages = languages;
            }
            if json {
                config.check.progress = false;
            }

            let checker = SnippetChecker::new(config)?;
            let report = match checker.check_deck(&deck).await {
                Ok(report) => report,
                Err(e) => {
                    eprintln!("❌ Check failed: {}", e);
                    std::process::exit(1);
                }
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", render_report(&report));
            }

            if !report.is_success() {
                std::process::exit(1);
            }
        }

        Commands::Preprocess { deck, include_dir } => {
            let include_dir = include_dir
                .or(config.check.include_dir)
                .or_else(|| deck.parent().map(|p| p.to_path_buf()))
                .unwrap_or_else(|| ".".into());
            let expanded = Preprocessor::new(include_dir).process_file(&deck)?;
            print!("{}", expanded);
        }

        Commands::Files { deck } => {
            let markdown = std::fs::read_to_string(&deck)
                .with_context(|| format!("Failed to read deck: {}", deck.display()))?;
            for file in file_list(&markdown) {
                println!("{}", file);
            }
        }

        Commands::Init { output_dir } => {
            let path = Config::init(&output_dir)?;
            info!("Initialized Slidebolt configuration in {}", path.display());
        }

        Commands::Completions { shell } => {
            cli::generate_completions(shell);
        }
    }

    Ok(())
}

fn parse_snippet(config: &Config, text: &str) -> ParsedSnippet {
    let parsed = DirectiveParser::new(config).parse(text);
    for diagnostic in &parsed.diagnostics {
        warn!("{}", diagnostic);
    }
    parsed
}

fn init_tracing(verbose: bool, json: bool, no_color: bool) -> Result<()> {
    let default_level = if verbose { "slidebolt=debug" } else { "slidebolt=info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_ansi(!no_color);

    if json {
        tracing_subscriber::registry()
            .with(fmt_layer.json())
            .with(filter)
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(fmt_layer)
            .with(filter)
            .try_init()?;
    }

    Ok(())
}
