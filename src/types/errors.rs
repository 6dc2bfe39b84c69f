//! Application error types.
//!
//! All errors use `thiserror` for automatic Error trait derivation and provide
//! clear error messages with context. Per-item failures (a compiler run that
//! exits non-zero, a generated file that cannot be rewritten) are *not*
//! errors at this level; they are recorded in the run report instead.

use std::path::PathBuf;
use thiserror::Error;

/// Application result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error enum for protofix.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration could not be assembled (missing command, bad file).
    #[error("configuration error: {0}")]
    Config(String),

    /// A configuration value failed validation.
    #[error("validation error: {0}")]
    Validation(String),

    /// No built-in rule set with the requested key.
    #[error("unknown rule set '{0}'")]
    UnknownRuleSet(String),

    /// A rewrite rule pattern did not compile.
    #[error("invalid pattern in rule '{rule}': {source}")]
    InvalidRule {
        rule: String,
        #[source]
        source: regex::Error,
    },

    /// Reading or writing a specific file failed.
    #[error("{}: {source}", .path.display())]
    FileIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Walking the output directory failed.
    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// TOML deserialization errors (config and rule-set files).
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// I/O errors.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

// Convenience constructors
impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn unknown_rule_set(key: impl Into<String>) -> Self {
        Self::UnknownRuleSet(key.into())
    }

    pub fn file_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileIo {
            path: path.into(),
            source,
        }
    }
}
