//! Rewrite engine — named, ordered regex substitutions over generated text.
//!
//! A [`RuleSet`] is an ordered list of [`RewriteRule`]s. Order matters: a
//! structural rule (`struct Foo {` → `class Foo : NSObject {`) has to run
//! before the blunt keyword rule that would otherwise claim the same token.
//! Every application reports how many matches each rule produced, so callers
//! can detect a compiler output format that no longer matches.

mod builtin;
mod file;

pub use builtin::{builtin, BASE_TYPE_PLACEHOLDER, BUILTIN_RULE_SETS, DEFAULT_RULE_SET};

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

use crate::types::{Error, PostProcessConfig, Result};

// =============================================================================
// Rules
// =============================================================================

/// How a rule's total match count across a run is judged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchExpectation {
    /// Zero matches is unusual but not a failure.
    #[default]
    Optional,
    /// Zero matches means the generator output changed shape.
    Required,
}

/// A single search/replace rule.
///
/// The replacement uses `regex` expansion syntax: `${1}` or `${name}` insert
/// captured groups, `$$` is a literal dollar sign.
#[derive(Debug, Clone)]
pub struct RewriteRule {
    name: String,
    pattern: Regex,
    replacement: String,
    expectation: MatchExpectation,
}

impl RewriteRule {
    /// Compile a rule. Fails with [`Error::InvalidRule`] if the pattern is invalid.
    pub fn new(
        name: impl Into<String>,
        pattern: &str,
        replacement: impl Into<String>,
    ) -> Result<Self> {
        let name = name.into();
        let pattern = Regex::new(pattern).map_err(|source| Error::InvalidRule {
            rule: name.clone(),
            source,
        })?;
        Ok(Self {
            name,
            pattern,
            replacement: replacement.into(),
            expectation: MatchExpectation::Optional,
        })
    }

    /// Set the match expectation.
    pub fn with_expectation(mut self, expectation: MatchExpectation) -> Self {
        self.expectation = expectation;
        self
    }

    /// Mark the rule as required.
    pub fn required(self) -> Self {
        self.with_expectation(MatchExpectation::Required)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn replacement(&self) -> &str {
        &self.replacement
    }

    pub fn expectation(&self) -> MatchExpectation {
        self.expectation
    }

    /// Replace every non-overlapping match in `text`.
    ///
    /// Returns the rewritten text (borrowed when nothing matched) and the
    /// number of matches replaced.
    pub fn apply<'t>(&self, text: &'t str) -> (Cow<'t, str>, usize) {
        let mut count = 0usize;
        let rewritten = self.pattern.replace_all(text, |caps: &Captures<'_>| {
            count += 1;
            let mut expanded = String::new();
            caps.expand(&self.replacement, &mut expanded);
            expanded
        });
        (rewritten, count)
    }
}

// =============================================================================
// Rule sets
// =============================================================================

/// Result of applying a rule set to one text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite {
    /// Text after every rule ran.
    pub text: String,
    /// Matches per rule, in rule order.
    pub matches: Vec<usize>,
}

impl Rewrite {
    pub fn total_matches(&self) -> usize {
        self.matches.iter().sum()
    }
}

/// A named, versioned, ordered list of rewrite rules.
#[derive(Debug, Clone)]
pub struct RuleSet {
    name: String,
    version: String,
    rules: Vec<RewriteRule>,
}

impl RuleSet {
    /// Build a rule set. Rule names must be unique.
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        rules: Vec<RewriteRule>,
    ) -> Result<Self> {
        let name = name.into();
        if rules.is_empty() {
            return Err(Error::validation(format!("rule set '{}' has no rules", name)));
        }
        for (i, rule) in rules.iter().enumerate() {
            if rules[..i].iter().any(|r| r.name == rule.name) {
                return Err(Error::validation(format!(
                    "rule set '{}' defines rule '{}' more than once",
                    name, rule.name
                )));
            }
        }
        Ok(Self {
            name,
            version: version.into(),
            rules,
        })
    }

    /// Resolve the rule set a post-processing run should use: the rules file
    /// when configured, otherwise the named built-in set.
    pub fn resolve(config: &PostProcessConfig) -> Result<Self> {
        match &config.rules_file {
            Some(path) => Self::from_toml_file(path, &config.base_type),
            None => builtin(&config.rule_set, &config.base_type),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Registry key, `<name>-<version>`.
    pub fn key(&self) -> String {
        format!("{}-{}", self.name, self.version)
    }

    pub fn rules(&self) -> &[RewriteRule] {
        &self.rules
    }

    /// Apply every rule in order. Each rule sees the output of the previous one.
    pub fn apply(&self, text: &str) -> Rewrite {
        let mut current = text.to_string();
        let mut matches = Vec::with_capacity(self.rules.len());

        for rule in &self.rules {
            let (rewritten, count) = rule.apply(&current);
            let replaced = match rewritten {
                Cow::Borrowed(_) => None,
                Cow::Owned(s) => Some(s),
            };
            if let Some(s) = replaced {
                current = s;
            }
            matches.push(count);
        }

        Rewrite {
            text: current,
            matches,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_rule_expands_captures() {
        let rule = RewriteRule::new("rename", r"fn (\w+)\(", "func ${1}(").unwrap();
        let (out, count) = rule.apply("fn a() fn b()");
        assert_eq!(out, "func a() func b()");
        assert_eq!(count, 2);
    }

    #[test]
    fn test_rule_without_match_borrows() {
        let rule = RewriteRule::new("noop", r"xyz", "abc").unwrap();
        let (out, count) = rule.apply("hello");
        assert!(matches!(out, Cow::Borrowed("hello")));
        assert_eq!(count, 0);
    }

    #[test]
    fn test_rule_dollar_escape() {
        let rule = RewriteRule::new("price", r"cost", "$$5").unwrap();
        let (out, _) = rule.apply("cost");
        assert_eq!(out, "$5");
    }

    #[test]
    fn test_invalid_pattern_names_rule() {
        let err = RewriteRule::new("broken", r"(unclosed", "").unwrap_err();
        match err {
            Error::InvalidRule { rule, .. } => assert_eq!(rule, "broken"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_rules_apply_in_order() {
        // The second rule only matches what the first one produced.
        let set = RuleSet::new(
            "ordered",
            "1",
            vec![
                RewriteRule::new("first", "a", "b").unwrap(),
                RewriteRule::new("second", "b", "c").unwrap(),
            ],
        )
        .unwrap();

        let rewrite = set.apply("aaa");
        assert_eq!(rewrite.text, "ccc");
        assert_eq!(rewrite.matches, vec![3, 3]);
        assert_eq!(rewrite.total_matches(), 6);
    }

    #[test]
    fn test_rule_set_rejects_duplicates_and_empty() {
        let dup = RuleSet::new(
            "dup",
            "1",
            vec![
                RewriteRule::new("same", "a", "b").unwrap(),
                RewriteRule::new("same", "c", "d").unwrap(),
            ],
        );
        assert!(matches!(dup, Err(Error::Validation(_))));
        assert!(matches!(RuleSet::new("empty", "1", vec![]), Err(Error::Validation(_))));
    }

    #[test]
    fn test_resolve_unknown_builtin() {
        let config = PostProcessConfig {
            rule_set: "swift-protobuf-0.1".to_string(),
            ..PostProcessConfig::default()
        };
        assert!(matches!(
            RuleSet::resolve(&config),
            Err(Error::UnknownRuleSet(key)) if key == "swift-protobuf-0.1"
        ));
    }

    #[test]
    fn test_resolve_default_is_builtin() {
        let set = RuleSet::resolve(&PostProcessConfig::default()).unwrap();
        assert_eq!(set.key(), DEFAULT_RULE_SET);
    }
}
