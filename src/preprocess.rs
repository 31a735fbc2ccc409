use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use regex::Regex;
use tracing::debug;

use crate::errors::{Result, SlideboltError};

static FILE_REF: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^FILE: (.+)$").unwrap());
static FILE_REF_MULTILINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^FILE: (.+?)\r?$").unwrap());
static SVG_START: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<svg.*>").unwrap());
static SVG_END: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"</svg>").unwrap());
static SVG_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"id="([^"]+)""#).unwrap());
static SVG_URL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"url\(#([^)]+)\)").unwrap());
static QUOTED_IMAGE_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""(\w+\.(jpg|png|gif|svg))""#).unwrap());
static PARENS_IMAGE_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\((\w+\.(jpg|png|gif|svg))\)").unwrap());

/// Includes nested deeper than this are assumed to be cyclic
const MAX_INCLUDE_DEPTH: usize = 32;

/// Expands a markdown deck into a single document
pub struct Preprocessor {
    include_dir: PathBuf,
    inside_svg: bool,
    svg_counter: usize,
}

impl Preprocessor {
    pub fn new(include_dir: impl Into<PathBuf>) -> Self {
        Self {
            include_dir: include_dir.into(),
            inside_svg: false,
            svg_counter: 0,
        }
    }

    /// Expand `markdown`, reading includes relative to the include directory
    pub fn process(&mut self, markdown: &str) -> Result<String> {
        self.inside_svg = false;
        self.svg_counter = 0;
        self.expand(markdown, None, 0)
    }

    /// Read and expand the deck at `path`
    pub fn process_file(&mut self, path: &Path) -> Result<String> {
        let markdown = std::fs::read_to_string(path).map_err(|e| {
            SlideboltError::file_system_error("Failed to read deck", path, e)
        })?;
        self.process(&markdown)
    }

    fn expand(&mut self, markdown: &str, included: Option<&Path>, depth: usize) -> Result<String> {
        let lines = markdown
            .split('\n')
            .map(|line| self.process_line(line, included, depth))
            .collect::<Result<Vec<_>>>()?;
        Ok(lines.join("\n"))
    }

    fn process_line(&mut self, line: &str, included: Option<&Path>, depth: usize) -> Result<String> {
        if self.inside_svg {
            if SVG_END.is_match(line) {
                self.inside_svg = false;
                self.svg_counter += 1;
                return Ok(line.to_string());
            }

            let suffix = self.svg_counter;
            let line = SVG_ID.replace(line, |caps: &regex::Captures| format!("id=\"{}{}\"", &caps[1], suffix));
            let line = SVG_URL.replace(&line, |caps: &regex::Captures| format!("url(#{}{})", &caps[1], suffix));
            return Ok(line.into_owned());
        }

        if SVG_START.is_match(line) {
            // A one-line <svg>...</svg> has nothing to rename
            if !SVG_END.is_match(line) {
                self.inside_svg = true;
            }
            return Ok(line.to_string());
        }

        let trimmed = line.strip_suffix('\r').unwrap_or(line);
        if let Some(caps) = FILE_REF.captures(trimmed) {
            return self.load_file(caps[1].trim(), depth);
        }

        if let Some(file) = included {
            let dir_name = file
                .parent()
                .and_then(Path::file_name)
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();

            if dir_name.is_empty() {
                return Ok(line.to_string());
            }
            if QUOTED_IMAGE_REF.is_match(line) {
                let replaced = QUOTED_IMAGE_REF.replace(line, |caps: &regex::Captures| {
                    format!("\"{}/{}\"", dir_name, &caps[1])
                });
                return Ok(replaced.into_owned());
            }
            let replaced = PARENS_IMAGE_REF.replace(line, |caps: &regex::Captures| {
                format!("({}/{})", dir_name, &caps[1])
            });
            return Ok(replaced.into_owned());
        }

        Ok(line.to_string())
    }

    fn load_file(&mut self, file: &str, depth: usize) -> Result<String> {
        if depth >= MAX_INCLUDE_DEPTH {
            return Err(SlideboltError::file_system_error(
                format!("Includes nested deeper than {} levels", MAX_INCLUDE_DEPTH),
                file,
                std::io::Error::new(std::io::ErrorKind::InvalidData, "include cycle"),
            ));
        }

        let path = self.include_dir.join(file);
        debug!("Including {}", path.display());

        let contents = std::fs::read_to_string(&path).map_err(|e| {
            SlideboltError::file_system_error(format!("Failed to include {}", file), &path, e)
        })?;

        if Path::new(file).extension().is_some_and(|ext| ext == "md") {
            self.expand(&contents, Some(Path::new(file)), depth + 1)
        } else {
            Ok(contents)
        }
    }
}

/// Every `FILE:` include target in `markdown`, in order
pub fn file_list(markdown: &str) -> Vec<String> {
    FILE_REF_MULTILINE
        .captures_iter(markdown)
        .map(|caps| caps[1].trim().to_string())
        .collect()
}
