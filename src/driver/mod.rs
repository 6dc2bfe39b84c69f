//! Invocation driver — runs the schema compiler once per input file.
//!
//! Inputs are compiled strictly in order, each invocation awaited before the
//! next starts. A failing invocation never stops the loop; its outcome is
//! recorded and the driver moves on.

mod process;

pub use process::{Invocation, ProcessOutput, ProcessRunner, TokioProcessRunner};

#[cfg(test)]
pub use process::MockProcessRunner;

use path_absolutize::Absolutize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::types::{CompilerConfig, Error, Result};

// =============================================================================
// Configuration
// =============================================================================

/// Compiler program and the arguments that precede the per-input ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerCommand {
    program: String,
    args: Vec<String>,
}

impl CompilerCommand {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Split a command template on whitespace. The first word is the program.
    pub fn parse(template: &str) -> Result<Self> {
        let mut words = template.split_whitespace().map(str::to_string);
        let program = words
            .next()
            .ok_or_else(|| Error::config("compiler command is empty"))?;
        Ok(Self::new(program, words.collect()))
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

/// What to compile and where: built once per run.
#[derive(Debug, Clone)]
pub struct InvocationConfig {
    pub command: CompilerCommand,
    /// Absolute output directory.
    pub out_dir: PathBuf,
    pub inputs: Vec<PathBuf>,
}

impl InvocationConfig {
    /// Build the configuration, resolving `out_dir` against the current
    /// directory. The directory does not need to exist yet.
    pub fn new(
        command: CompilerCommand,
        out_dir: impl AsRef<Path>,
        inputs: Vec<PathBuf>,
    ) -> Result<Self> {
        let out_dir = out_dir.as_ref().absolutize()?.into_owned();
        Ok(Self {
            command,
            out_dir,
            inputs,
        })
    }
}

/// Execution policy for compiler invocations.
#[derive(Debug, Clone)]
pub struct DriverOptions {
    pub out_flag: String,
    pub timeout: Option<Duration>,
    pub spawn_retries: u32,
    pub retry_backoff: Duration,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self::from(&CompilerConfig::default())
    }
}

impl From<&CompilerConfig> for DriverOptions {
    fn from(config: &CompilerConfig) -> Self {
        Self {
            out_flag: config.out_flag.clone(),
            timeout: config.timeout,
            spawn_retries: config.spawn_retries,
            retry_backoff: config.retry_backoff,
        }
    }
}

// =============================================================================
// Outcomes
// =============================================================================

/// How a single invocation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationStatus {
    /// The process ran to completion (successfully or not).
    Completed(ProcessOutput),
    /// The process could not be started.
    SpawnFailed { attempts: u32, error: String },
    /// The process was killed after exceeding the timeout.
    TimedOut(Duration),
}

/// Result of compiling one input.
#[derive(Debug, Clone)]
pub struct InvocationOutcome {
    pub input: PathBuf,
    pub command_line: String,
    pub status: InvocationStatus,
}

impl InvocationOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(&self.status, InvocationStatus::Completed(output) if output.success())
    }
}

// =============================================================================
// Driver
// =============================================================================

/// Runs the compiler for each input through a [`ProcessRunner`].
#[derive(Debug)]
pub struct Driver<R> {
    runner: R,
    options: DriverOptions,
}

impl<R: ProcessRunner> Driver<R> {
    pub fn new(runner: R, options: DriverOptions) -> Self {
        Self { runner, options }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn options(&self) -> &DriverOptions {
        &self.options
    }

    /// `<program> <args...> <out_flag>=<out_dir> <input>`
    pub fn invocation(&self, config: &InvocationConfig, input: &Path) -> Invocation {
        let mut args: Vec<OsString> = config.command.args().iter().map(OsString::from).collect();
        let mut out = OsString::from(&self.options.out_flag);
        out.push("=");
        out.push(&config.out_dir);
        args.push(out);
        args.push(input.as_os_str().to_owned());
        Invocation {
            program: OsString::from(config.command.program()),
            args,
        }
    }

    /// Compile a single input.
    pub async fn compile(&self, config: &InvocationConfig, input: &Path) -> InvocationOutcome {
        let invocation = self.invocation(config, input);
        let command_line = invocation.command_line();
        info!(input = %input.display(), command = %command_line, "invoking schema compiler");

        let mut attempts = 0u32;
        let status = loop {
            attempts += 1;
            let run = self.runner.run(&invocation);
            let result = match self.options.timeout {
                Some(limit) => match tokio::time::timeout(limit, run).await {
                    Ok(result) => result,
                    Err(_) => break InvocationStatus::TimedOut(limit),
                },
                None => run.await,
            };

            match result {
                Ok(output) => break InvocationStatus::Completed(output),
                Err(err) if attempts <= self.options.spawn_retries => {
                    warn!(
                        input = %input.display(),
                        attempt = attempts,
                        error = %err,
                        "compiler spawn failed, retrying"
                    );
                    tokio::time::sleep(self.options.retry_backoff).await;
                }
                Err(err) => {
                    break InvocationStatus::SpawnFailed {
                        attempts,
                        error: err.to_string(),
                    }
                }
            }
        };

        match &status {
            InvocationStatus::Completed(output) if output.success() => {
                info!(input = %input.display(), "schema compiled");
            }
            InvocationStatus::Completed(output) => {
                warn!(input = %input.display(), exit_code = ?output.exit_code, "schema compiler failed");
            }
            InvocationStatus::SpawnFailed { attempts, error } => {
                warn!(input = %input.display(), attempts, error = %error, "schema compiler could not be started");
            }
            InvocationStatus::TimedOut(limit) => {
                warn!(input = %input.display(), timeout = ?limit, "schema compiler timed out");
            }
        }

        InvocationOutcome {
            input: input.to_path_buf(),
            command_line,
            status,
        }
    }

    /// Compile every input in order, reporting each outcome as it lands.
    pub async fn compile_all<F>(
        &self,
        config: &InvocationConfig,
        mut on_outcome: F,
    ) -> Vec<InvocationOutcome>
    where
        F: FnMut(&InvocationOutcome),
    {
        let mut outcomes = Vec::with_capacity(config.inputs.len());
        for input in &config.inputs {
            let outcome = self.compile(config, input).await;
            on_outcome(&outcome);
            outcomes.push(outcome);
        }
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::Sequence;
    use std::ffi::OsStr;

    fn config(inputs: &[&str]) -> InvocationConfig {
        InvocationConfig::new(
            CompilerCommand::parse("protoc --plugin=protoc-gen-swift").unwrap(),
            "generated",
            inputs.iter().map(PathBuf::from).collect(),
        )
        .unwrap()
    }

    fn ok_output() -> ProcessOutput {
        ProcessOutput {
            exit_code: Some(0),
            ..ProcessOutput::default()
        }
    }

    fn fast_options() -> DriverOptions {
        DriverOptions {
            retry_backoff: Duration::from_millis(1),
            ..DriverOptions::default()
        }
    }

    #[test]
    fn test_parse_command() {
        let cmd = CompilerCommand::parse("  protoc   --plugin=x  -I. ").unwrap();
        assert_eq!(cmd.program(), "protoc");
        assert_eq!(cmd.args(), &["--plugin=x".to_string(), "-I.".to_string()]);
        assert!(matches!(CompilerCommand::parse("   "), Err(Error::Config(_))));
    }

    #[test]
    fn test_out_dir_is_absolute() {
        let cfg = config(&["a.proto"]);
        assert!(cfg.out_dir.is_absolute());
        assert!(cfg.out_dir.ends_with("generated"));

        let dotted = InvocationConfig::new(
            CompilerCommand::parse("protoc").unwrap(),
            "./generated/../out/",
            vec![],
        )
        .unwrap();
        assert!(dotted.out_dir.is_absolute());
        assert!(dotted.out_dir.ends_with("out"));
    }

    #[test]
    fn test_invocation_shape() {
        let driver = Driver::new(TokioProcessRunner, DriverOptions::default());
        let cfg = config(&["Signal.proto"]);
        let inv = driver.invocation(&cfg, Path::new("Signal.proto"));

        assert_eq!(inv.program, "protoc");
        assert_eq!(inv.args[0], "--plugin=protoc-gen-swift");
        assert_eq!(
            inv.args[1],
            OsString::from(format!("--out={}", cfg.out_dir.display()))
        );
        assert_eq!(inv.args[2], "Signal.proto");
        assert_eq!(inv.args.len(), 3);
    }

    #[test]
    fn test_custom_out_flag() {
        let options = DriverOptions {
            out_flag: "--swift_out".to_string(),
            ..DriverOptions::default()
        };
        let driver = Driver::new(TokioProcessRunner, options);
        let cfg = config(&["a.proto"]);
        let inv = driver.invocation(&cfg, Path::new("a.proto"));
        assert!(inv.args[1].to_string_lossy().starts_with("--swift_out=/"));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_paths_pass_through_unchanged() {
        use std::os::unix::ffi::OsStrExt;

        let input = Path::new(OsStr::from_bytes(b"sig\xffnal.proto"));
        let out_dir = PathBuf::from(OsStr::from_bytes(b"/tmp/gen\xfe"));
        let cfg = InvocationConfig::new(
            CompilerCommand::parse("protoc").unwrap(),
            &out_dir,
            vec![input.to_path_buf()],
        )
        .unwrap();
        let driver = Driver::new(TokioProcessRunner, DriverOptions::default());
        let inv = driver.invocation(&cfg, input);

        assert_eq!(inv.args.last().unwrap().as_bytes(), b"sig\xffnal.proto");
        assert_eq!(inv.args[0].as_bytes(), b"--out=/tmp/gen\xfe");
    }

    #[tokio::test]
    async fn test_compile_all_runs_once_per_input_in_order() {
        let mut runner = MockProcessRunner::new();
        let mut seq = Sequence::new();
        for name in ["a.proto", "b.proto", "c.proto"] {
            runner
                .expect_run()
                .withf(move |inv: &Invocation| {
                    inv.args.last().map(OsString::as_os_str) == Some(OsStr::new(name))
                })
                .times(1)
                .in_sequence(&mut seq)
                .returning(|_| Ok(ok_output()));
        }

        let driver = Driver::new(runner, fast_options());
        let cfg = config(&["a.proto", "b.proto", "c.proto"]);
        let mut seen = Vec::new();
        let outcomes = driver
            .compile_all(&cfg, |o| seen.push(o.input.clone()))
            .await;

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes.iter().all(InvocationOutcome::succeeded));
        assert_eq!(
            seen,
            vec![
                PathBuf::from("a.proto"),
                PathBuf::from("b.proto"),
                PathBuf::from("c.proto")
            ]
        );
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_loop() {
        let mut runner = MockProcessRunner::new();
        let mut seq = Sequence::new();
        runner
            .expect_run()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Ok(ProcessOutput {
                    exit_code: Some(1),
                    stdout: String::new(),
                    stderr: "bad.proto:1:1: Expected top-level statement".to_string(),
                })
            });
        runner
            .expect_run()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(ok_output()));

        let driver = Driver::new(runner, fast_options());
        let outcomes = driver
            .compile_all(&config(&["bad.proto", "good.proto"]), |_| {})
            .await;

        assert!(!outcomes[0].succeeded());
        assert!(outcomes[1].succeeded());
    }

    #[tokio::test]
    async fn test_empty_inputs_never_invoke() {
        let mut runner = MockProcessRunner::new();
        runner.expect_run().times(0);

        let driver = Driver::new(runner, fast_options());
        let outcomes = driver.compile_all(&config(&[]), |_| {}).await;
        assert!(outcomes.is_empty());
    }

    #[tokio::test]
    async fn test_spawn_retry_then_success() {
        let mut runner = MockProcessRunner::new();
        let mut seq = Sequence::new();
        runner
            .expect_run()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|_| Err(std::io::Error::from(std::io::ErrorKind::NotFound)));
        runner
            .expect_run()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(ok_output()));

        let options = DriverOptions {
            spawn_retries: 2,
            ..fast_options()
        };
        let driver = Driver::new(runner, options);
        let outcome = driver.compile(&config(&[]), Path::new("a.proto")).await;
        assert!(outcome.succeeded());
    }

    #[tokio::test]
    async fn test_spawn_retries_exhausted() {
        let mut runner = MockProcessRunner::new();
        runner
            .expect_run()
            .times(2)
            .returning(|_| Err(std::io::Error::from(std::io::ErrorKind::NotFound)));

        let options = DriverOptions {
            spawn_retries: 1,
            ..fast_options()
        };
        let driver = Driver::new(runner, options);
        let outcome = driver.compile(&config(&[]), Path::new("a.proto")).await;
        assert!(matches!(
            outcome.status,
            InvocationStatus::SpawnFailed { attempts: 2, .. }
        ));
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_not_retried() {
        let mut runner = MockProcessRunner::new();
        runner.expect_run().times(1).returning(|_| {
            Ok(ProcessOutput {
                exit_code: Some(2),
                ..ProcessOutput::default()
            })
        });

        let options = DriverOptions {
            spawn_retries: 3,
            ..fast_options()
        };
        let driver = Driver::new(runner, options);
        let outcome = driver.compile(&config(&[]), Path::new("a.proto")).await;
        assert!(!outcome.succeeded());
    }

    #[derive(Debug)]
    struct HangingRunner;

    #[async_trait::async_trait]
    impl ProcessRunner for HangingRunner {
        async fn run(&self, _invocation: &Invocation) -> std::io::Result<ProcessOutput> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(ok_output())
        }
    }

    #[tokio::test]
    async fn test_timeout_ends_invocation() {
        let options = DriverOptions {
            timeout: Some(Duration::from_millis(20)),
            ..fast_options()
        };
        let driver = Driver::new(HangingRunner, options);
        let outcome = driver.compile(&config(&[]), Path::new("a.proto")).await;
        assert_eq!(
            outcome.status,
            InvocationStatus::TimedOut(Duration::from_millis(20))
        );
        assert!(!outcome.succeeded());
    }
}
