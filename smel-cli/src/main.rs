//! `smel` - run SMEL migration scripts against native schema artifacts.
//!
//! Usage:
//!   smel check   <schema> <script> [--config smel.toml]
//!   smel run     <schema> <script> [--out file] [--config smel.toml]
//!   smel inspect <schema> <script> [--config smel.toml]

use smel_cli::{check_artifact, inspect_artifact, load_config, migrate_artifact, render_check};
use smel_core::{SmelError, SmelResult};
use std::fs;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const USAGE: &str = "Usage:
  smel check   <schema> <script> [--config smel.toml]
  smel run     <schema> <script> [--out file] [--config smel.toml]
  smel inspect <schema> <script> [--config smel.toml]";

/// Logs go to stderr so `run` without `--out` can pipe the artifact.
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("smel=info"));
    let json = std::env::var("SMEL_LOG_JSON").map(|v| v == "1").unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr))
            .try_init()
    };
    if let Err(e) = result {
        eprintln!("Failed to init subscriber: {}", e);
    }
}

#[derive(Debug, Clone, Copy)]
enum Command {
    Check,
    Run,
    Inspect,
}

struct Args {
    command: Command,
    schema: String,
    script: String,
    out: Option<String>,
    config: Option<String>,
}

fn parse_args(raw: &[String]) -> Option<Args> {
    let mut positional = Vec::new();
    let mut out = None;
    let mut config = None;
    let mut iter = raw.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--out" => out = Some(iter.next()?.clone()),
            "--config" => config = Some(iter.next()?.clone()),
            _ => positional.push(arg.clone()),
        }
    }
    let [command, schema, script]: [String; 3] = positional.try_into().ok()?;
    let command = match command.as_str() {
        "check" => Command::Check,
        "run" => Command::Run,
        "inspect" => Command::Inspect,
        _ => return None,
    };
    Some(Args {
        command,
        schema,
        script,
        out,
        config,
    })
}

fn read(path: &str) -> SmelResult<String> {
    fs::read_to_string(path).map_err(|e| SmelError::Io {
        path: path.to_string(),
        reason: e.to_string(),
    })
}

fn execute(args: &Args) -> SmelResult<bool> {
    let config = match &args.config {
        Some(path) => load_config(Some(&read(path)?))?,
        None => load_config(None)?,
    };
    let source = read(&args.schema)?;
    let script = read(&args.script)?;

    match args.command {
        Command::Check => {
            let report = check_artifact(&source, &script, &config)?;
            print!("{}", render_check(&report));
            Ok(report.is_ok())
        }
        Command::Run => {
            let report = migrate_artifact(&source, &script, &config)?;
            tracing::info!(
                source = %report.source.fingerprint(),
                target = %report.target.fingerprint(),
                applied = report.applied,
                "Migration complete"
            );
            match &args.out {
                Some(path) => fs::write(path, &report.artifact).map_err(|e| SmelError::Io {
                    path: path.clone(),
                    reason: e.to_string(),
                })?,
                None => print!("{}", report.artifact),
            }
            eprintln!("{}", report.summary());
            Ok(true)
        }
        Command::Inspect => {
            print!("{}", inspect_artifact(&source, &script, &config)?);
            Ok(true)
        }
    }
}

fn main() -> ExitCode {
    let raw: Vec<String> = std::env::args().collect();
    let args = match parse_args(&raw) {
        Some(args) => args,
        None => {
            eprintln!("{}", USAGE);
            return ExitCode::from(64);
        }
    };

    init_tracing();

    match execute(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            tracing::error!(error = %e, command = ?args.command, "smel failed");
            eprintln!("error: {}", e);
            ExitCode::from(2)
        }
    }
}
