//! Subprocess execution seam.
//!
//! The driver never builds shell strings: an [`Invocation`] is a program plus
//! an argument vector, and a [`ProcessRunner`] turns it into a
//! [`ProcessOutput`]. Tests substitute their own runner.
//!
//! Program and arguments are OS strings so that paths which are not valid
//! UTF-8 reach the compiler byte for byte.

use async_trait::async_trait;
use std::ffi::OsString;
use std::process::Stdio;
use tokio::process::Command;

/// A fully resolved compiler invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: OsString,
    pub args: Vec<OsString>,
}

impl Invocation {
    /// Render as a single line for the transcript. Arguments that would be
    /// split or reinterpreted by a POSIX shell are single-quoted. Display
    /// only: invalid UTF-8 is shown lossily.
    pub fn command_line(&self) -> String {
        std::iter::once(&self.program)
            .chain(&self.args)
            .map(|arg| quote_arg(&arg.to_string_lossy()))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn quote_arg(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:+,@%".contains(c));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

/// Captured result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code; `None` if the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Stdout followed by stderr, the way an operator would see them.
    pub fn combined(&self) -> String {
        let mut combined = self.stdout.clone();
        if !self.stdout.is_empty() && !self.stderr.is_empty() && !self.stdout.ends_with('\n') {
            combined.push('\n');
        }
        combined.push_str(&self.stderr);
        combined
    }
}

/// Runs an invocation to completion.
///
/// `Err` means the process could not be started at all. A process that
/// started and failed is `Ok` with a non-zero exit code.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, invocation: &Invocation) -> std::io::Result<ProcessOutput>;
}

/// Runs invocations as real child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioProcessRunner;

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, invocation: &Invocation) -> std::io::Result<ProcessOutput> {
        let output = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        Ok(ProcessOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invocation(program: &str, args: &[&str]) -> Invocation {
        Invocation {
            program: program.into(),
            args: args.iter().map(OsString::from).collect(),
        }
    }

    #[test]
    fn test_command_line_quotes_when_needed() {
        let inv = invocation(
            "protoc",
            &["--out=/tmp/gen out", "Signal.proto", "it's", ""],
        );
        assert_eq!(
            inv.command_line(),
            r"protoc '--out=/tmp/gen out' Signal.proto 'it'\''s' ''"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_command_line_shows_non_utf8_lossily() {
        use std::os::unix::ffi::OsStrExt;

        let inv = Invocation {
            program: "protoc".into(),
            args: vec![std::ffi::OsStr::from_bytes(b"sig\xffnal.proto").to_owned()],
        };
        assert_eq!(inv.command_line(), "protoc 'sig\u{fffd}nal.proto'");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_tokio_runner_passes_non_utf8_args() {
        use std::os::unix::ffi::OsStrExt;

        let mut inv = invocation("sh", &["-c", "printf '%s' \"$1\" | od -An -tx1", "sh"]);
        inv.args
            .push(std::ffi::OsStr::from_bytes(b"sig\xffnal.proto").to_owned());
        let output = TokioProcessRunner.run(&inv).await.unwrap();
        assert!(output.success());
        let hex: String = output.stdout.split_whitespace().collect();
        assert_eq!(hex, "736967ff6e616c2e70726f746f");
    }

    #[test]
    fn test_combined_output() {
        let output = ProcessOutput {
            exit_code: Some(1),
            stdout: "warning".to_string(),
            stderr: "error\n".to_string(),
        };
        assert!(!output.success());
        assert_eq!(output.combined(), "warning\nerror\n");
        assert_eq!(ProcessOutput::default().combined(), "");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_tokio_runner_captures_streams() {
        let inv = invocation("sh", &["-c", "echo generated; echo broken >&2; exit 3"]);
        let output = TokioProcessRunner.run(&inv).await.unwrap();
        assert_eq!(output.exit_code, Some(3));
        assert_eq!(output.stdout, "generated\n");
        assert_eq!(output.stderr, "broken\n");
    }

    #[tokio::test]
    async fn test_tokio_runner_missing_program() {
        let inv = invocation("protofix-no-such-compiler", &[]);
        let err = TokioProcessRunner.run(&inv).await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }
}
