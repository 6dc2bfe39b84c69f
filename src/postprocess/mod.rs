//! Output post-processor — rewrites generated files in place.
//!
//! Walks the output directory, selects files whose name ends with the
//! generated-file suffix, and runs the rule set over each. Anything else in
//! the tree is never opened.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::rewrite::RuleSet;
use crate::types::{Error, PostProcessConfig, Result};

/// What happened to one generated file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRewrite {
    /// Matches per rule, in rule order.
    pub matches: Vec<usize>,
    /// The rewritten text differs from the original.
    pub changed: bool,
    /// The new text was written to disk (false on dry runs).
    pub written: bool,
}

/// Result of post-processing one generated file.
#[derive(Debug)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub result: Result<FileRewrite>,
}

impl FileOutcome {
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }
}

/// Applies a rule set to every generated file under a directory.
#[derive(Debug)]
pub struct PostProcessor {
    rules: RuleSet,
    suffix: String,
    dry_run: bool,
}

impl PostProcessor {
    pub fn new(rules: RuleSet, suffix: impl Into<String>) -> Self {
        Self {
            rules,
            suffix: suffix.into(),
            dry_run: false,
        }
    }

    /// Resolve the rule set and options from configuration.
    pub fn from_config(config: &PostProcessConfig) -> Result<Self> {
        let rules = RuleSet::resolve(config)?;
        Ok(Self::new(rules, config.suffix.clone()).dry_run(config.dry_run))
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Whether `path` names a generated file.
    pub fn is_generated(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .map_or(false, |name| name.ends_with(&self.suffix))
    }

    /// Every generated file under `root`, sorted by path.
    pub fn find_generated_files(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry?;
            if entry.file_type().is_file() && self.is_generated(entry.path()) {
                files.push(entry.into_path());
            }
        }
        Ok(files)
    }

    /// Read, rewrite, and write back a single file.
    pub fn process_file(&self, path: &Path) -> Result<FileRewrite> {
        let original = fs::read_to_string(path).map_err(|e| Error::file_io(path, e))?;
        let rewrite = self.rules.apply(&original);
        let changed = rewrite.text != original;

        let written = changed && !self.dry_run;
        if written {
            write_atomically(path, &rewrite.text).map_err(|e| Error::file_io(path, e))?;
        }

        debug!(
            path = %path.display(),
            matches = ?rewrite.matches,
            changed,
            written,
            "post-processed generated file"
        );

        Ok(FileRewrite {
            matches: rewrite.matches,
            changed,
            written,
        })
    }

    /// Process every generated file under `root`.
    ///
    /// A file that cannot be read or written is recorded as failed and the
    /// rest are still processed. Failing to walk `root` aborts the run.
    pub fn run<F>(&self, root: &Path, mut on_outcome: F) -> Result<Vec<FileOutcome>>
    where
        F: FnMut(&FileOutcome),
    {
        let files = self.find_generated_files(root)?;
        info!(
            root = %root.display(),
            files = files.len(),
            rule_set = %self.rules.key(),
            dry_run = self.dry_run,
            "post-processing generated files"
        );

        let mut outcomes = Vec::with_capacity(files.len());
        for path in files {
            let result = self.process_file(&path);
            if let Err(err) = &result {
                warn!(path = %path.display(), error = %err, "failed to post-process file");
            }
            let outcome = FileOutcome { path, result };
            on_outcome(&outcome);
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }
}

/// Replace `path` with `contents` via a sibling temp file and rename, keeping
/// the original permissions.
fn write_atomically(path: &Path, contents: &str) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let permissions = fs::metadata(path)?.permissions();

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(contents.as_bytes())?;
    tmp.as_file().sync_all()?;
    fs::set_permissions(tmp.path(), permissions)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
