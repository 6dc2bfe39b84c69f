//! Configuration validation utilities.

use crate::types::{Error, Result};

/// Validate that a string is not empty (after trimming whitespace).
pub fn validate_non_empty(s: &str, field: &str) -> Result<()> {
    if s.trim().is_empty() {
        return Err(Error::validation(format!("{} cannot be empty", field)));
    }
    Ok(())
}

/// Validate that a command-line flag looks like a long option.
pub fn validate_flag(flag: &str, field: &str) -> Result<()> {
    validate_non_empty(flag, field)?;
    if !flag.starts_with("--") || flag.contains('=') || flag.contains(char::is_whitespace) {
        return Err(Error::validation(format!(
            "{} must be a long option without '=' or whitespace, got '{}'",
            field, flag
        )));
    }
    Ok(())
}
