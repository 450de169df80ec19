//! Runner manifest: the per-instance configuration of the action pipeline.
//!
//! One manifest describes one runner variant: where the harness template
//! lives, where the materialized source and compiled artifact go, and how
//! the external build pipeline is invoked. Paths resolve against the
//! manifest's own directory, so multiple runner instances can coexist in
//! one test process.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::RUNNER_MANIFEST_SCHEMA_VERSION;

/// Placeholder the dispatch template substitutes the entry-point name into.
pub const ENTRY_PLACEHOLDER: &str = "{entry}";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunnerManifest {
    pub schema_version: String,
    /// Harness template appended to every action's code.
    pub harness: String,
    /// Destination of the materialized source file.
    pub source_out: String,
    /// Working directory the build command runs from.
    pub build_dir: String,
    /// External build command, invoked with no arguments.
    pub build_command: String,
    /// Binary the build pipeline leaves behind on success.
    pub artifact: String,
    /// Invocation statement binding the harness dispatch to the resolved
    /// entry point; must contain `{entry}` exactly once.
    pub dispatch: String,
}

/// A manifest with its paths resolved against the manifest directory.
#[derive(Debug, Clone)]
pub struct ActionLayout {
    pub harness: PathBuf,
    pub source_out: PathBuf,
    pub build_dir: PathBuf,
    pub build_command: PathBuf,
    pub artifact: PathBuf,
    pub dispatch: String,
}

fn normalize_string_in_place(s: &mut String) {
    if s.trim() != s {
        *s = s.trim().to_string();
    }
}

fn validate_path_field(field: &str, raw: &str) -> Result<()> {
    if raw.is_empty() {
        anyhow::bail!("runner.{field} must be non-empty");
    }
    Ok(())
}

pub fn validate_dispatch_template(template: &str) -> Result<()> {
    match template.matches(ENTRY_PLACEHOLDER).count() {
        1 => Ok(()),
        0 => anyhow::bail!(
            "runner.dispatch must contain the {ENTRY_PLACEHOLDER} placeholder, got {template:?}"
        ),
        n => anyhow::bail!(
            "runner.dispatch must contain {ENTRY_PLACEHOLDER} exactly once, found {n}: {template:?}"
        ),
    }
}

pub fn load_runner_manifest(path: &Path) -> Result<RunnerManifest> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("read runner manifest: {}", path.display()))?;
    parse_runner_manifest_bytes(&bytes, path)
}

pub fn parse_runner_manifest_bytes(bytes: &[u8], path: &Path) -> Result<RunnerManifest> {
    let mut m: RunnerManifest = serde_json::from_slice(bytes)
        .with_context(|| format!("parse runner manifest JSON: {}", path.display()))?;

    normalize_string_in_place(&mut m.schema_version);
    normalize_string_in_place(&mut m.harness);
    normalize_string_in_place(&mut m.source_out);
    normalize_string_in_place(&mut m.build_dir);
    normalize_string_in_place(&mut m.build_command);
    normalize_string_in_place(&mut m.artifact);
    normalize_string_in_place(&mut m.dispatch);

    if m.schema_version != RUNNER_MANIFEST_SCHEMA_VERSION {
        anyhow::bail!(
            "runner manifest schema_version mismatch: expected {} got {:?}",
            RUNNER_MANIFEST_SCHEMA_VERSION,
            m.schema_version
        );
    }
    validate_path_field("harness", &m.harness)?;
    validate_path_field("source_out", &m.source_out)?;
    validate_path_field("build_dir", &m.build_dir)?;
    validate_path_field("build_command", &m.build_command)?;
    validate_path_field("artifact", &m.artifact)?;
    validate_dispatch_template(&m.dispatch)?;

    Ok(m)
}

impl RunnerManifest {
    /// Resolve the manifest's paths against `base` (the manifest's own
    /// directory). Absolute entries are kept as-is.
    pub fn resolve(&self, base: &Path) -> ActionLayout {
        ActionLayout {
            harness: base.join(&self.harness),
            source_out: base.join(&self.source_out),
            build_dir: base.join(&self.build_dir),
            build_command: base.join(&self.build_command),
            artifact: base.join(&self.artifact),
            dispatch: self.dispatch.clone(),
        }
    }
}
