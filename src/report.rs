//! Run report and operator transcript.
//!
//! Every compiler invocation and every generated file gets an outcome; the
//! report folds them into a summary and an exit status instead of letting
//! individual failures scroll past.

use std::io::{self, Write};

use crate::driver::{InvocationOutcome, InvocationStatus};
use crate::postprocess::FileOutcome;
use crate::rewrite::{MatchExpectation, RuleSet};
use crate::types::Error;

/// Marker printed at the end of every run, whatever happened.
pub const COMPLETION_MARKER: &str = "Complete.";

/// Exit status when every item succeeded.
pub const EXIT_SUCCESS: i32 = 0;
/// Exit status when at least one invocation, file, or strict rule failed.
pub const EXIT_FAILURE: i32 = 1;
/// Exit status when the run could not start or had to stop (bad configuration,
/// unusable output directory).
pub const EXIT_ERROR: i32 = 2;

/// Matches a rule produced across all processed files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleTotal {
    pub name: String,
    pub expectation: MatchExpectation,
    pub matches: usize,
}

/// Accumulated results of one run.
#[derive(Debug, Default)]
pub struct RunReport {
    pub invocations: Vec<InvocationOutcome>,
    pub files: Vec<FileOutcome>,
    pub rules: Vec<RuleTotal>,
    /// Count required rules with zero matches as failures.
    pub strict: bool,
}

impl RunReport {
    /// Build a report, summing per-rule matches over successfully processed files.
    pub fn new(
        invocations: Vec<InvocationOutcome>,
        files: Vec<FileOutcome>,
        rule_set: &RuleSet,
        strict: bool,
    ) -> Self {
        let mut rules: Vec<RuleTotal> = rule_set
            .rules()
            .iter()
            .map(|rule| RuleTotal {
                name: rule.name().to_string(),
                expectation: rule.expectation(),
                matches: 0,
            })
            .collect();

        for rewrite in files.iter().filter_map(|f| f.result.as_ref().ok()) {
            for (total, count) in rules.iter_mut().zip(&rewrite.matches) {
                total.matches += count;
            }
        }

        Self {
            invocations,
            files,
            rules,
            strict,
        }
    }

    pub fn failed_invocations(&self) -> usize {
        self.invocations.iter().filter(|o| !o.succeeded()).count()
    }

    pub fn failed_files(&self) -> usize {
        self.files.iter().filter(|f| !f.succeeded()).count()
    }

    pub fn rewritten_files(&self) -> usize {
        self.files
            .iter()
            .filter(|f| f.result.as_ref().map_or(false, |r| r.changed))
            .count()
    }

    /// Rules that matched nothing in any file.
    pub fn unmatched_rules(&self) -> impl Iterator<Item = &RuleTotal> {
        self.rules.iter().filter(|r| r.matches == 0)
    }

    /// Required rules that matched nothing; failures only in strict mode.
    pub fn failed_rules(&self) -> usize {
        if !self.strict {
            return 0;
        }
        self.unmatched_rules()
            .filter(|r| r.expectation == MatchExpectation::Required)
            .count()
    }

    pub fn failures(&self) -> usize {
        self.failed_invocations() + self.failed_files() + self.failed_rules()
    }

    pub fn is_success(&self) -> bool {
        self.failures() == 0
    }

    pub fn exit_code(&self) -> i32 {
        if self.is_success() {
            EXIT_SUCCESS
        } else {
            EXIT_FAILURE
        }
    }

    /// Completion marker followed by the summary and unmatched-rule warnings.
    pub fn write_summary<W: Write + ?Sized>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "{}", COMPLETION_MARKER)?;
        writeln!(
            out,
            "schemas: {} compiled, {} failed",
            self.invocations.len() - self.failed_invocations(),
            self.failed_invocations()
        )?;
        writeln!(
            out,
            "generated files: {} rewritten, {} unchanged, {} failed",
            self.rewritten_files(),
            self.files.len() - self.rewritten_files() - self.failed_files(),
            self.failed_files()
        )?;
        for rule in self.unmatched_rules() {
            let level = if self.strict && rule.expectation == MatchExpectation::Required {
                "error"
            } else {
                "warning"
            };
            writeln!(out, "{}: rule '{}' matched nothing", level, rule.name)?;
        }
        Ok(())
    }
}

/// Completion marker for a run that stopped early, followed by the reason.
pub fn write_aborted<W: Write + ?Sized>(out: &mut W, err: &Error) -> io::Result<()> {
    writeln!(out, "{}", COMPLETION_MARKER)?;
    writeln!(out, "error: run aborted: {}", err)
}

/// Transcript entry for one invocation: the command, then whatever it printed.
pub fn write_invocation<W: Write + ?Sized>(
    out: &mut W,
    outcome: &InvocationOutcome,
) -> io::Result<()> {
    writeln!(out, "compiling: {}", outcome.input.display())?;
    writeln!(out, "\t{}", outcome.command_line)?;
    match &outcome.status {
        InvocationStatus::Completed(output) => {
            let combined = output.combined();
            if !combined.is_empty() {
                write!(out, "{}", combined)?;
                if !combined.ends_with('\n') {
                    writeln!(out)?;
                }
            }
            if !output.success() {
                match output.exit_code {
                    Some(code) => writeln!(out, "compiler exited with status {}", code)?,
                    None => writeln!(out, "compiler terminated by signal")?,
                }
            }
        }
        InvocationStatus::SpawnFailed { attempts, error } => {
            writeln!(
                out,
                "could not start compiler after {} attempt(s): {}",
                attempts, error
            )?;
        }
        InvocationStatus::TimedOut(limit) => {
            writeln!(out, "compiler timed out after {:?}", limit)?;
        }
    }
    writeln!(out)
}

/// Transcript entry for one generated file.
pub fn write_file<W: Write + ?Sized>(out: &mut W, outcome: &FileOutcome) -> io::Result<()> {
    match &outcome.result {
        Ok(rewrite) if rewrite.changed && rewrite.written => {
            writeln!(out, "rewrote: {}", outcome.path.display())
        }
        Ok(rewrite) if rewrite.changed => {
            writeln!(out, "would rewrite: {}", outcome.path.display())
        }
        Ok(_) => writeln!(out, "unchanged: {}", outcome.path.display()),
        Err(err) => writeln!(out, "failed: {}", err),
    }
}
