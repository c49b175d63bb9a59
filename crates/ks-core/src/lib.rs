//! Shared error primitives used across kmlstyle crates.

use core::fmt;
use std::path::PathBuf;

/// Result alias used by the editing crates.
pub type KmlResult<T> = Result<T, KmlError>;

/// Result alias used by the network stack.
pub type NetResult<T> = Result<T, NetError>;

/// Errors surfaced by loading, editing, and persisting KML documents.
#[derive(Debug, thiserror::Error)]
pub enum KmlError {
    #[error("invalid color `{input}`: {reason}")]
    InvalidColorFormat { input: String, reason: &'static str },

    #[error("transparency must be a percentage between 0 and 100, got `{value}`")]
    InvalidTransparency { value: f64 },

    #[error("required `{tag}` element is missing")]
    MissingRequiredNode { tag: String },

    #[error("malformed KML: {message}")]
    MalformedXml { message: String },

    #[error("failed to fetch KML from `{url}`")]
    Fetch {
        url: String,
        #[source]
        source: NetError,
    },

    #[error("I/O failure on `{}`", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {message}")]
    Config { message: String },
}

impl KmlError {
    pub fn missing_node(tag: impl Into<String>) -> Self {
        Self::MissingRequiredNode { tag: tag.into() }
    }

    pub fn invalid_color(input: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidColorFormat {
            input: input.into(),
            reason,
        }
    }

    /// Stable machine-readable identifier for the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidColorFormat { .. } => "color.invalid_format",
            Self::InvalidTransparency { .. } => "color.invalid_transparency",
            Self::MissingRequiredNode { .. } => "dom.missing_node",
            Self::MalformedXml { .. } => "xml.malformed",
            Self::Fetch { .. } => "net.fetch_failed",
            Self::Io { .. } => "storage.io_failed",
            Self::Config { .. } => "config.invalid",
        }
    }
}

/// Transport-level failure reported by the HTTP client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetError {
    pub code: &'static str,
    pub message: String,
}

impl NetError {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for NetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for NetError {}
