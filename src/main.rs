//! protofix - compile `.proto` schemas and adapt the generated Swift.
//!
//! ```text
//! protofix --compiler-cmd "protoc --plugin=protoc-gen-swift" \
//!          --out-dir Sources/Generated  Signal.proto Provisioning.proto
//! ```
//!
//! Exit status: 0 when everything succeeded, 1 when any invocation or file
//! failed, 2 on configuration errors.

use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use protofix::driver::{CompilerCommand, InvocationConfig, TokioProcessRunner};
use protofix::report::EXIT_ERROR;
use protofix::rewrite::BUILTIN_RULE_SETS;
use protofix::{Config, Error, Pipeline, Result};

#[derive(Debug, Parser)]
#[command(
    name = "protofix",
    version,
    about = "Run a protobuf schema compiler and adapt the generated Swift sources",
    long_about = None
)]
struct Cli {
    /// Schema compiler command, e.g. "protoc --plugin=protoc-gen-swift"
    #[arg(long, env = "PROTOFIX_COMPILER_CMD")]
    compiler_cmd: Option<String>,

    /// Destination directory for generated files
    #[arg(
        long,
        env = "PROTOFIX_OUT_DIR",
        required_unless_present = "list_rule_sets"
    )]
    out_dir: Option<PathBuf>,

    /// .proto schema files to compile
    #[arg(
        value_name = "INPUT",
        required_unless_present_any = ["list_rule_sets", "skip_compile"]
    )]
    inputs: Vec<PathBuf>,

    /// TOML configuration file
    #[arg(long, env = "PROTOFIX_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Flag used to pass the output directory to the compiler (default: --out)
    #[arg(long)]
    out_flag: Option<String>,

    /// Filename suffix of generated files (default: .pb.swift)
    #[arg(long)]
    suffix: Option<String>,

    /// Built-in rule set to apply
    #[arg(long)]
    rule_set: Option<String>,

    /// TOML rule-set file (overrides --rule-set)
    #[arg(long, value_name = "FILE")]
    rules_file: Option<PathBuf>,

    /// Base type generated classes inherit from (default: NSObject)
    #[arg(long)]
    base_type: Option<String>,

    /// Per-invocation timeout, e.g. "30s"
    #[arg(long, value_parser = parse_duration)]
    timeout: Option<Duration>,

    /// Retries when the compiler cannot be started
    #[arg(long)]
    spawn_retries: Option<u32>,

    /// Fail when a required rewrite rule matches nothing
    #[arg(long)]
    strict: bool,

    /// Report rewrites without writing files
    #[arg(long)]
    dry_run: bool,

    /// Only post-process the existing contents of the output directory
    #[arg(long)]
    skip_compile: bool,

    /// Print the built-in rule sets and exit
    #[arg(long)]
    list_rule_sets: bool,
}

fn parse_duration(raw: &str) -> std::result::Result<Duration, String> {
    humantime_serde::re::humantime::parse_duration(raw).map_err(|e| e.to_string())
}

impl Cli {
    /// Load the config file (if any) and layer command-line values over it.
    fn config(&self) -> Result<Config> {
        let mut config = Config::load(self.config.as_deref())?;

        if let Some(command) = &self.compiler_cmd {
            config.compiler.command = Some(command.clone());
        }
        if let Some(flag) = &self.out_flag {
            config.compiler.out_flag = flag.clone();
        }
        if let Some(timeout) = self.timeout {
            config.compiler.timeout = Some(timeout);
        }
        if let Some(retries) = self.spawn_retries {
            config.compiler.spawn_retries = retries;
        }
        if let Some(suffix) = &self.suffix {
            config.postprocess.suffix = suffix.clone();
        }
        if let Some(rule_set) = &self.rule_set {
            config.postprocess.rule_set = rule_set.clone();
        }
        if let Some(path) = &self.rules_file {
            config.postprocess.rules_file = Some(path.clone());
        }
        if let Some(base_type) = &self.base_type {
            config.postprocess.base_type = base_type.clone();
        }
        config.postprocess.strict |= self.strict;
        config.postprocess.dry_run |= self.dry_run;

        config.validate()?;
        Ok(config)
    }
}

async fn run(cli: Cli) -> Result<i32> {
    let config = cli.config()?;
    protofix::observability::init_tracing(&config.observability);

    let out_dir = cli
        .out_dir
        .as_deref()
        .ok_or_else(|| Error::config("--out-dir is required"))?;
    let command = match (&config.compiler.command, cli.skip_compile) {
        (Some(command), _) => CompilerCommand::parse(command)?,
        // Placeholder; nothing is invoked with --skip-compile.
        (None, true) => CompilerCommand::new("true", Vec::new()),
        (None, false) => {
            return Err(Error::config(
                "no compiler command: pass --compiler-cmd or set compiler.command",
            ))
        }
    };
    let invocation = InvocationConfig::new(command, out_dir, cli.inputs.clone())?;

    tracing::info!(
        compiler = ?config.compiler.command,
        out_dir = %invocation.out_dir.display(),
        inputs = ?invocation.inputs,
        "starting"
    );

    let pipeline = Pipeline::new(TokioProcessRunner, &config)?.skip_compile(cli.skip_compile);
    let stdout = std::io::stdout();
    let mut transcript = stdout.lock();
    let result = pipeline.run(&invocation, &mut transcript).await;
    transcript.flush()?;
    let report = result?;

    Ok(report.exit_code())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.list_rule_sets {
        for key in BUILTIN_RULE_SETS {
            println!("{key}");
        }
        return ExitCode::SUCCESS;
    }

    match run(cli).await {
        Ok(code) => ExitCode::from(code as u8),
        Err(err) => {
            tracing::error!(error = %err, "protofix failed");
            eprintln!("protofix: {err}");
            ExitCode::from(EXIT_ERROR as u8)
        }
    }
}
