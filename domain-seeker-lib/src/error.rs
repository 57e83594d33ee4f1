//! Error handling for domain scanning operations.
//!
//! This module defines the error type shared by the generator, the resolver
//! setup and the configuration layer. Network failures that happen during a
//! probe never surface here: the resolver turns them into a classified
//! `ProbeResult` instead.

use std::fmt;

/// Main error type for domain scanning operations.
#[derive(Debug, Clone)]
pub enum DomainSeekerError {
    /// A candidate base name failed validation
    InvalidCandidate {
        value: String,
        reason: String,
    },

    /// A TLD does not have the `.label` form
    InvalidTld {
        tld: String,
        reason: String,
    },

    /// The candidate source file does not exist
    NotFound {
        path: String,
    },

    /// The candidate source file contains bytes that are not valid UTF-8
    InvalidEncoding {
        path: String,
        line: usize,
    },

    /// A candidate source could not be started (missing program, spawn failure)
    GeneratorLoad {
        origin: String,
        message: String,
    },

    /// A candidate source failed while producing values
    GeneratorExecution {
        origin: String,
        message: String,
    },

    /// HTTP client setup errors
    NetworkError {
        message: String,
        source: Option<String>,
    },

    /// JSON / TOML parsing errors
    ParseError {
        message: String,
        content: Option<String>,
    },

    /// Configuration errors (invalid settings, etc.)
    ConfigError {
        message: String,
    },

    /// File I/O errors when reading or writing scan artifacts
    FileError {
        path: String,
        message: String,
    },

    /// Generic internal errors that don't fit other categories
    Internal {
        message: String,
    },
}

impl DomainSeekerError {
    /// Create a new invalid candidate error.
    pub fn invalid_candidate<V: Into<String>, R: Into<String>>(value: V, reason: R) -> Self {
        Self::InvalidCandidate {
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create a new invalid TLD error.
    pub fn invalid_tld<T: Into<String>, R: Into<String>>(tld: T, reason: R) -> Self {
        Self::InvalidTld {
            tld: tld.into(),
            reason: reason.into(),
        }
    }

    /// Create a new not-found error for a missing source file.
    pub fn not_found<P: Into<String>>(path: P) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Create a new generator load error.
    pub fn generator_load<O: Into<String>, M: Into<String>>(origin: O, message: M) -> Self {
        Self::GeneratorLoad {
            origin: origin.into(),
            message: message.into(),
        }
    }

    /// Create a new generator execution error.
    pub fn generator_execution<O: Into<String>, M: Into<String>>(origin: O, message: M) -> Self {
        Self::GeneratorExecution {
            origin: origin.into(),
            message: message.into(),
        }
    }

    /// Create a new network error with source information.
    pub fn network_with_source<M: Into<String>, S: Into<String>>(message: M, source: S) -> Self {
        Self::NetworkError {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create a new configuration error.
    pub fn config<M: Into<String>>(message: M) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Create a new file error.
    pub fn file_error<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self::FileError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new internal error.
    pub fn internal<M: Into<String>>(message: M) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether this error ends a scan session.
    ///
    /// Source failures abort the scan loop; the session still finalizes and
    /// reports whatever was checked before the failure.
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::InvalidEncoding { .. }
                | Self::GeneratorLoad { .. }
                | Self::GeneratorExecution { .. }
        )
    }
}

impl fmt::Display for DomainSeekerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidCandidate { value, reason } => {
                write!(f, "Invalid candidate '{}': {}", value, reason)
            }
            Self::InvalidTld { tld, reason } => {
                write!(f, "Invalid TLD '{}': {}", tld, reason)
            }
            Self::NotFound { path } => {
                write!(f, "Domain source not found: {}", path)
            }
            Self::InvalidEncoding { path, line } => {
                write!(f, "File '{}' is not valid UTF-8 (line {})", path, line)
            }
            Self::GeneratorLoad { origin, message } => {
                write!(f, "Failed to load generator '{}': {}", origin, message)
            }
            Self::GeneratorExecution { origin, message } => {
                write!(f, "Generator '{}' failed: {}", origin, message)
            }
            Self::NetworkError { message, source } => {
                if let Some(source) = source {
                    write!(f, "Network error: {} (source: {})", message, source)
                } else {
                    write!(f, "Network error: {}", message)
                }
            }
            Self::ParseError { message, content: _ } => {
                write!(f, "Parse error: {}", message)
            }
            Self::ConfigError { message } => {
                write!(f, "Configuration error: {}", message)
            }
            Self::FileError { path, message } => {
                write!(f, "File error at '{}': {}", path, message)
            }
            Self::Internal { message } => {
                write!(f, "Internal error: {}", message)
            }
        }
    }
}

impl std::error::Error for DomainSeekerError {}

impl From<serde_json::Error> for DomainSeekerError {
    fn from(err: serde_json::Error) -> Self {
        Self::ParseError {
            message: format!("JSON parsing failed: {}", err),
            content: None,
        }
    }
}

impl From<toml::de::Error> for DomainSeekerError {
    fn from(err: toml::de::Error) -> Self {
        Self::ConfigError {
            message: format!("Failed to parse TOML configuration: {}", err),
        }
    }
}

impl From<std::io::Error> for DomainSeekerError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal {
            message: format!("I/O error: {}", err),
        }
    }
}
