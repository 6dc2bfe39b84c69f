//! TOML rule-set files, for generator versions without a built-in set.
//!
//! ```toml
//! name = "swift-protobuf"
//! version = "1.1"
//!
//! [[rule]]
//! name = "struct-declaration"
//! pattern = '\bstruct\s+(\w+)\s*\{'
//! replacement = 'class ${1} : {{base_type}} {'
//! expect = "required"
//! ```

use serde::Deserialize;
use std::fs;
use std::path::Path;

use super::builtin::expand_base_type;
use super::{MatchExpectation, RewriteRule, RuleSet};
use crate::types::{Error, Result};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleSetFile {
    name: String,
    version: String,
    #[serde(default, rename = "rule")]
    rules: Vec<RuleEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleEntry {
    name: String,
    pattern: String,
    #[serde(default)]
    replacement: String,
    #[serde(default)]
    expect: MatchExpectation,
}

impl RuleSet {
    /// Parse a rule set from TOML text.
    pub fn from_toml_str(raw: &str, base_type: &str) -> Result<Self> {
        let file: RuleSetFile = toml::from_str(raw)?;
        let rules = file
            .rules
            .into_iter()
            .map(|entry| {
                RewriteRule::new(
                    entry.name,
                    &entry.pattern,
                    expand_base_type(&entry.replacement, base_type),
                )
                .map(|rule| rule.with_expectation(entry.expect))
            })
            .collect::<Result<Vec<_>>>()?;
        RuleSet::new(file.name, file.version, rules)
    }

    /// Load a rule set from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>, base_type: &str) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| Error::file_io(path, e))?;
        Self::from_toml_str(&raw, base_type).map_err(|e| match e {
            Error::Toml(err) => Error::config(format!("{}: {}", path.display(), err)),
            other => other,
        })
    }
}
