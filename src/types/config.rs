//! Configuration structures.
//!
//! Configuration is loaded from an optional TOML file; command-line flags and
//! environment variables override individual values in the binary.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::{Error, Result};
use crate::validation::{validate_flag, validate_non_empty};

/// Global protofix configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Schema compiler invocation.
    #[serde(default)]
    pub compiler: CompilerConfig,

    /// Generated-file post-processing.
    #[serde(default)]
    pub postprocess: PostProcessConfig,

    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| Error::file_io(path, e))?;
        let config: Config = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if given, otherwise return defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Check values that serde cannot constrain.
    pub fn validate(&self) -> Result<()> {
        validate_flag(&self.compiler.out_flag, "compiler.out_flag")?;
        if let Some(command) = &self.compiler.command {
            validate_non_empty(command, "compiler.command")?;
        }
        validate_non_empty(&self.postprocess.suffix, "postprocess.suffix")?;
        validate_non_empty(&self.postprocess.rule_set, "postprocess.rule_set")?;
        validate_non_empty(&self.postprocess.base_type, "postprocess.base_type")?;
        Ok(())
    }
}

/// Schema compiler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Compiler command line, split on whitespace into program and arguments.
    pub command: Option<String>,

    /// Flag used to pass the output directory (`<flag>=<dir>`).
    pub out_flag: String,

    /// Per-invocation timeout. `None` waits indefinitely.
    #[serde(with = "humantime_serde")]
    pub timeout: Option<Duration>,

    /// How many times to retry spawning a compiler that could not be started.
    pub spawn_retries: u32,

    /// Delay between spawn attempts.
    #[serde(with = "humantime_serde")]
    pub retry_backoff: Duration,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            command: None,
            out_flag: "--out".to_string(),
            timeout: None,
            spawn_retries: 0,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

/// Post-processing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PostProcessConfig {
    /// Filename suffix identifying generated files.
    pub suffix: String,

    /// Built-in rule set key (`<name>-<version>`), used when `rules_file` is unset.
    pub rule_set: String,

    /// TOML rule-set file overriding the built-in set.
    pub rules_file: Option<PathBuf>,

    /// Base type generated classes inherit from.
    pub base_type: String,

    /// Treat required rules that matched nothing as failures.
    pub strict: bool,

    /// Compute rewrites without writing them.
    pub dry_run: bool,
}

impl Default for PostProcessConfig {
    fn default() -> Self {
        Self {
            suffix: ".pb.swift".to_string(),
            rule_set: crate::rewrite::DEFAULT_RULE_SET.to_string(),
            rules_file: None,
            base_type: "NSObject".to_string(),
            strict: false,
            dry_run: false,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Tracing log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable JSON log formatting.
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}
