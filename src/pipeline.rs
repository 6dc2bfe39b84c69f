//! Compile-then-rewrite pipeline.
//!
//! ```text
//!   inputs ──► Driver ──(one compiler run per input)──► out_dir
//!                                                          │
//!   RunReport ◄── PostProcessor ◄──(walk *.pb.swift)───────┘
//! ```
//!
//! The operator transcript (commands, compiler output, rewritten files, the
//! completion marker) is written to the caller's writer as work happens.

use std::fs;
use std::io::{self, Write};
use tracing::{info, warn};

use crate::driver::{Driver, DriverOptions, InvocationConfig, ProcessRunner};
use crate::postprocess::PostProcessor;
use crate::report::{self, RunReport};
use crate::rewrite::MatchExpectation;
use crate::types::{Config, Error, Result};

/// Driver and post-processor wired together from one [`Config`].
#[derive(Debug)]
pub struct Pipeline<R> {
    driver: Driver<R>,
    postprocessor: PostProcessor,
    strict: bool,
    skip_compile: bool,
}

impl<R: ProcessRunner> Pipeline<R> {
    pub fn new(runner: R, config: &Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            driver: Driver::new(runner, DriverOptions::from(&config.compiler)),
            postprocessor: PostProcessor::from_config(&config.postprocess)?,
            strict: config.postprocess.strict,
            skip_compile: false,
        })
    }

    /// Only post-process what is already in the output directory.
    pub fn skip_compile(mut self, skip: bool) -> Self {
        self.skip_compile = skip;
        self
    }

    pub fn driver(&self) -> &Driver<R> {
        &self.driver
    }

    pub fn postprocessor(&self) -> &PostProcessor {
        &self.postprocessor
    }

    /// Run the whole pipeline.
    ///
    /// Per-item failures end up in the report; only failures that make the
    /// rest of the run meaningless (output directory cannot be created or
    /// walked, transcript cannot be written) are returned as errors. The
    /// completion marker is written either way.
    pub async fn run<W: Write + ?Sized>(
        &self,
        invocation: &InvocationConfig,
        transcript: &mut W,
    ) -> Result<RunReport> {
        match self.run_stages(invocation, transcript).await {
            Ok(report) => Ok(report),
            Err(err) => {
                if let Err(write_err) = report::write_aborted(transcript, &err) {
                    warn!(error = %write_err, "could not write completion marker");
                }
                Err(err)
            }
        }
    }

    async fn run_stages<W: Write + ?Sized>(
        &self,
        invocation: &InvocationConfig,
        transcript: &mut W,
    ) -> Result<RunReport> {
        fs::create_dir_all(&invocation.out_dir)
            .map_err(|e| Error::file_io(&invocation.out_dir, e))?;

        let invocations = if self.skip_compile {
            info!("skipping schema compilation");
            Vec::new()
        } else {
            let mut written: io::Result<()> = Ok(());
            let outcomes = self
                .driver
                .compile_all(invocation, |outcome| {
                    if written.is_ok() {
                        written = report::write_invocation(&mut *transcript, outcome);
                    }
                })
                .await;
            written?;
            outcomes
        };

        let mut written: io::Result<()> = Ok(());
        let files = self.postprocessor.run(&invocation.out_dir, |outcome| {
            if written.is_ok() {
                written = report::write_file(&mut *transcript, outcome);
            }
        })?;
        written?;

        let report = RunReport::new(invocations, files, self.postprocessor.rules(), self.strict);
        for rule in report.unmatched_rules() {
            warn!(
                rule = %rule.name,
                required = rule.expectation == MatchExpectation::Required,
                "rewrite rule matched nothing; generator output may have changed"
            );
        }
        info!(
            invocations = report.invocations.len(),
            files = report.files.len(),
            failures = report.failures(),
            "run finished"
        );

        report.write_summary(transcript)?;
        Ok(report)
    }
}
