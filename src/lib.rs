//! Slidebolt - check and link presentation code snippets against Compiler Explorer
//!
//! Presentation snippets carry their build settings as `///` directive
//! comments. This crate parses those directives, builds Compiler Explorer
//! deep links, and compiles snippets through the Compiler Explorer API with
//! retries, so a whole deck can be verified before it is presented.
//!
//! # Features
//!
//! - Directive parsing (`compiler`, `options`, `libs`, `execute`, `fails`, `output`, `hide`)
//! - Compiler Explorer deep links
//! - Compile requests with exponential backoff on server errors
//! - Deck preprocessing (`FILE:` includes) and snippet extraction
//!
//! # Example
//!
//! ```rust,no_run
//! use slidebolt::{Config, DirectiveParser, ExplorerClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let parsed = DirectiveParser::new(&config).parse("/// execute\nint main() {}\n");
//!
//!     println!("{}", slidebolt::build_link(&parsed.info, &config.explorer.theme)?);
//!
//!     let client = ExplorerClient::new(&config.explorer, config.retry.policy())?;
//!     let response = client.check(&parsed.info).await?;
//!     println!("exit code {}", response.code);
//!
//!     Ok(())
//! }
//! ```

pub mod checker;
pub mod cli;
pub mod client;
pub mod config;
pub mod directives;
pub mod errors;
pub mod link;
pub mod preprocess;
pub mod report;
pub mod retry;
pub mod snippets;

// Re-export main types for convenience
pub use checker::{DeckReport, SnippetChecker, SnippetResult, SnippetStatus};
pub use client::{CompileResponse, ExplorerClient};
pub use config::Config;
pub use directives::{CompileInfo, DirectiveParser, Library, ParsedSnippet};
pub use errors::{SlideboltError, Result};
pub use link::{build_link, decode_link};
pub use retry::RetryPolicy;

/// Current version of Slidebolt
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Directive keys understood by the parser
pub fn supported_directives() -> Vec<&'static str> {
    vec![
        "compiler",
        "options",
        "libs",
        "execute",
        "fails",
        "output",
        "hide",
        "unhide",
    ]
}
