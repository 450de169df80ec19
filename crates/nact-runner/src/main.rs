use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use base64::Engine as _;
use clap::Parser;
use nact::{
    assemble_env, load_runner_manifest, ActionRunner, InitRequest, RunRequest,
    ENV_REPORT_SCHEMA_VERSION, INIT_REPORT_SCHEMA_VERSION,
};

#[derive(Parser)]
#[command(name = "nact-runner")]
#[command(about = "Native action build and invocation-environment runner.", long_about = None)]
struct Cli {
    /// Runner manifest; paths inside resolve against its directory.
    #[arg(long, default_value = "runner.json")]
    config: PathBuf,

    /// Init payload file: materialize and build the action.
    #[arg(long)]
    init: Option<PathBuf>,

    /// Run payload file: print the invocation environment.
    #[arg(long)]
    run: Option<PathBuf>,

    /// Base environment entries every action sees.
    #[arg(long = "base-env", value_name = "KEY=VALUE")]
    base_env: Vec<String>,
}

fn main() -> std::process::ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match try_main() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            std::process::ExitCode::from(2)
        }
    }
}

fn try_main() -> Result<std::process::ExitCode> {
    let cli = Cli::parse();

    let base_env = parse_base_env(&cli.base_env)?;

    match (&cli.init, &cli.run) {
        (Some(_), Some(_)) | (None, None) => {
            anyhow::bail!("set exactly one of --init or --run")
        }
        (Some(init_path), None) => run_init(&cli.config, init_path),
        (None, Some(run_path)) => run_env(run_path, &base_env),
    }
}

fn run_init(config: &Path, init_path: &Path) -> Result<std::process::ExitCode> {
    let manifest = load_runner_manifest(config)?;
    let base = config.parent().unwrap_or_else(|| Path::new("."));
    let layout = manifest.resolve(base);

    let bytes = std::fs::read(init_path)
        .with_context(|| format!("read init payload: {}", init_path.display()))?;
    let request: InitRequest = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse init payload JSON: {}", init_path.display()))?;

    let mut runner = ActionRunner::new(layout);
    let report = runner.init(&request)?;

    let b64 = base64::engine::general_purpose::STANDARD;
    let exit_code: u8 = if report.ok { 0 } else { 1 };
    let json = serde_json::json!({
        "schema_version": INIT_REPORT_SCHEMA_VERSION,
        "mode": "init",
        "ok": report.ok,
        "exit_code": exit_code,
        "state": runner.state().as_str(),
        "entry_point": report.entry_point,
        "source_bytes": report.source_bytes,
        "source_sha256": report.source_sha256,
        "artifact": report.artifact.as_ref().map(|p| p.display().to_string()),
        "artifact_size": report.artifact_size,
        "exit_status": report.exit_status,
        "stdout_b64": b64.encode(&report.stdout),
        "stderr_b64": b64.encode(&report.stderr),
    });
    println!("{}", serde_json::to_string_pretty(&json)?);

    Ok(std::process::ExitCode::from(exit_code))
}

fn run_env(
    run_path: &Path,
    base_env: &BTreeMap<String, String>,
) -> Result<std::process::ExitCode> {
    let bytes = std::fs::read(run_path)
        .with_context(|| format!("read run payload: {}", run_path.display()))?;
    let request: RunRequest = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse run payload JSON: {}", run_path.display()))?;

    let env = assemble_env(base_env, Some(&request))?;
    let json = serde_json::json!({
        "schema_version": ENV_REPORT_SCHEMA_VERSION,
        "mode": "env",
        "env": env,
    });
    println!("{}", serde_json::to_string_pretty(&json)?);

    Ok(std::process::ExitCode::SUCCESS)
}

fn parse_base_env(pairs: &[String]) -> Result<BTreeMap<String, String>> {
    let mut out = BTreeMap::new();
    for pair in pairs {
        let Some((key, value)) = pair.split_once('=') else {
            anyhow::bail!("invalid --base-env entry {pair:?} (expected KEY=VALUE)");
        };
        let key = key.trim();
        if key.is_empty() {
            anyhow::bail!("invalid --base-env entry {pair:?} (empty key)");
        }
        out.insert(key.to_string(), value.to_string());
    }
    Ok(out)
}
