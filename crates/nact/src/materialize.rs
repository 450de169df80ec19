//! Code materializer: user code + harness template + one generated
//! invocation statement, written to the configured source path.

use std::path::PathBuf;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::manifest::{validate_dispatch_template, ActionLayout, ENTRY_PLACEHOLDER};

/// Entry-point name used when the init payload does not name one.
pub const DEFAULT_ENTRY_POINT: &str = "main";

#[derive(Debug, Clone)]
pub struct MaterializedSource {
    pub path: PathBuf,
    pub entry_point: String,
    pub source_bytes: usize,
    pub source_sha256: String,
}

pub fn resolve_entry_point(main: Option<&str>) -> &str {
    match main.map(str::trim) {
        Some(name) if !name.is_empty() => name,
        _ => DEFAULT_ENTRY_POINT,
    }
}

pub fn render_dispatch(template: &str, entry: &str) -> Result<String> {
    validate_dispatch_template(template)?;
    Ok(template.replace(ENTRY_PLACEHOLDER, entry))
}

/// Section order is part of the contract: code first so the harness and
/// the trailing dispatch statement can refer to its symbols.
fn compose_source(code: &str, harness: &str, dispatch_line: &str) -> String {
    let mut out = String::with_capacity(code.len() + harness.len() + dispatch_line.len() + 3);
    out.push_str(code);
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(harness);
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(dispatch_line);
    out.push('\n');
    out
}

/// Write the complete action source to `layout.source_out`, overwriting any
/// previous content. Whether `entry` names a symbol that exists in `code`
/// is left to the compiler; a bad name surfaces as a build failure.
pub fn materialize(
    layout: &ActionLayout,
    code: &str,
    entry: Option<&str>,
) -> Result<MaterializedSource> {
    if code.trim().is_empty() {
        anyhow::bail!("init payload code must be non-empty");
    }
    let entry = resolve_entry_point(entry);

    let harness = std::fs::read_to_string(&layout.harness)
        .with_context(|| format!("read harness template: {}", layout.harness.display()))?;
    if harness.trim().is_empty() {
        anyhow::bail!("harness template is empty: {}", layout.harness.display());
    }

    let dispatch_line = render_dispatch(&layout.dispatch, entry)?;
    let source = compose_source(code, &harness, &dispatch_line);

    if let Some(parent) = layout.source_out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create source directory: {}", parent.display()))?;
    }
    std::fs::write(&layout.source_out, source.as_bytes())
        .with_context(|| format!("write action source: {}", layout.source_out.display()))?;

    let source_sha256 = hex_lower(&Sha256::digest(source.as_bytes()));
    debug!(
        "materialized action source for entry point {} ({} bytes) at {}",
        entry,
        source.len(),
        layout.source_out.display()
    );

    Ok(MaterializedSource {
        path: layout.source_out.clone(),
        entry_point: entry.to_string(),
        source_bytes: source.len(),
        source_sha256,
    })
}

pub(crate) fn hex_lower(bytes: &[u8]) -> String {
    const LUT: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        out.push(LUT[(b >> 4) as usize] as char);
        out.push(LUT[(b & 0x0F) as usize] as char);
    }
    out
}
