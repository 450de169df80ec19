//! Build invoker: drives the external build pipeline over the materialized
//! source tree and captures its diagnostics.

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};
use tracing::debug;

/// Outcome of one external build run. A pipeline that executes and exits
/// non-zero is not an `Err`; only failing to run it at all is.
#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub ok: bool,
    pub exit_status: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// Capability seam over the external build pipeline so tests can substitute
/// a fake without invoking a real compiler.
pub trait BuildPipeline {
    fn build(&self, build_dir: &Path) -> Result<BuildOutput>;
}

/// Production pipeline: runs the configured command with no arguments from
/// the build directory and waits for it to finish. Streams are captured in
/// full; never truncated, never retried.
#[derive(Debug, Clone)]
pub struct CommandPipeline {
    program: PathBuf,
}

impl CommandPipeline {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl BuildPipeline for CommandPipeline {
    fn build(&self, build_dir: &Path) -> Result<BuildOutput> {
        debug!(
            "running build pipeline {} in {}",
            self.program.display(),
            build_dir.display()
        );
        let out = Command::new(&self.program)
            .current_dir(build_dir)
            .output()
            .with_context(|| format!("invoke build pipeline: {}", self.program.display()))?;

        #[cfg(unix)]
        let exit_signal = {
            use std::os::unix::process::ExitStatusExt as _;
            out.status.signal()
        };
        #[cfg(not(unix))]
        let exit_signal: Option<i32> = None;

        let exit_status = match out.status.code() {
            Some(code) => code,
            None => exit_signal.map(|s| 128 + s).unwrap_or(1),
        };

        Ok(BuildOutput {
            ok: out.status.success(),
            exit_status,
            stdout: out.stdout,
            stderr: out.stderr,
        })
    }
}
