use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Slidebolt
#[derive(Error, Debug)]
pub enum SlideboltError {
    #[error("Compilation with {compiler} failed with exit code {code}")]
    CompileFailed {
        compiler: String,
        code: i32,
        stderr: String,
        stdout: String,
    },

    #[error("Snippet was expected to fail ({reason}) but compiled successfully")]
    UnexpectedSuccess { reason: String },

    #[error("Expected output line not found: {expected:?}")]
    OutputMismatch {
        expected: String,
        actual: String,
    },

    #[error("Compiler Explorer returned HTTP {status} for {url}")]
    HttpStatus {
        status: u16,
        url: String,
        body: String,
    },

    #[error("Network error while contacting {url}")]
    NetworkError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Invalid response from Compiler Explorer: {message}")]
    InvalidResponse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Invalid Compiler Explorer link: {message}")]
    InvalidLink { message: String },

    #[error("File system error: {message}")]
    FileSystemError {
        message: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {message}")]
    ConfigError {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Serialization error: {message}")]
    SerializationError {
        message: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, SlideboltError>;

impl SlideboltError {
    pub fn compile_failed(
        compiler: impl Into<String>,
        code: i32,
        stderr: impl Into<String>,
        stdout: impl Into<String>,
    ) -> Self {
        Self::CompileFailed {
            compiler: compiler.into(),
            code,
            stderr: stderr.into(),
            stdout: stdout.into(),
        }
    }

    pub fn invalid_link(message: impl Into<String>) -> Self {
        Self::InvalidLink {
            message: message.into(),
        }
    }

    pub fn file_system_error(
        message: impl Into<String>,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::FileSystemError {
            message: message.into(),
            path: path.into(),
            source,
        }
    }

    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
            source: None,
        }
    }

    /// Whether another attempt at the same request could succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::NetworkError { .. } => true,
            Self::HttpStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Get error category for reporting
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::CompileFailed { .. }
            | Self::UnexpectedSuccess { .. }
            | Self::OutputMismatch { .. } => ErrorCategory::Expectation,

            Self::HttpStatus { .. } | Self::NetworkError { .. } => ErrorCategory::Network,

            Self::InvalidResponse { .. }
            | Self::InvalidLink { .. }
            | Self::SerializationError { .. } => ErrorCategory::Protocol,

            Self::FileSystemError { .. } => ErrorCategory::FileSystem,

            Self::ConfigError { .. } => ErrorCategory::Configuration,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Expectation,
    Network,
    Protocol,
    FileSystem,
    Configuration,
}

impl From<std::io::Error> for SlideboltError {
    fn from(err: std::io::Error) -> Self {
        Self::FileSystemError {
            message: err.to_string(),
            path: PathBuf::new(),
            source: err,
        }
    }
}

impl From<serde_json::Error> for SlideboltError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError {
            message: err.to_string(),
            source: err,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = SlideboltError::compile_failed("g82", 1, "error: boom", "");
        assert!(matches!(err, SlideboltError::CompileFailed { code: 1, .. }));
        assert_eq!(
            err.to_string(),
            "Compilation with g82 failed with exit code 1"
        );
    }

    #[test]
    fn test_error_categories() {
        let err = SlideboltError::compile_failed("g82", 1, "", "");
        assert_eq!(err.category(), ErrorCategory::Expectation);

        let err = SlideboltError::invalid_link("no fragment");
        assert_eq!(err.category(), ErrorCategory::Protocol);

        let err = SlideboltError::config_error("bad value");
        assert_eq!(err.category(), ErrorCategory::Configuration);
    }

    #[test]
    fn test_recoverable_statuses() {
        let server_error = SlideboltError::HttpStatus {
            status: 503,
            url: "https://godbolt.org/api".to_string(),
            body: String::new(),
        };
        assert!(server_error.is_recoverable());

        let client_error = SlideboltError::HttpStatus {
            status: 404,
            url: "https://godbolt.org/api".to_string(),
            body: String::new(),
        };
        assert!(!client_error.is_recoverable());

        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        assert!(!SlideboltError::from(io).is_recoverable());
    }
}
