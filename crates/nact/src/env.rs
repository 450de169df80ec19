//! Environment assembler: the per-invocation process environment handed to
//! the compiled action.

use std::collections::BTreeMap;

use anyhow::Result;
use serde::Deserialize;
use serde_json::Value;

/// Environment variable the compiled action reads its serialized arguments
/// from. Fixed so the harness can decode arguments without knowing the
/// host's transport.
pub const INPUT_ENV_VAR: &str = "NACT_INPUT";

/// One invocation's payload. Extra sibling fields belong to the host and
/// are ignored here.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunRequest {
    #[serde(default)]
    pub value: Value,
}

/// Extend `base` with the serialized request arguments. Pure: a fresh map
/// per call, `base` is never mutated, and the input variable is always
/// present (a missing or null `value` serializes as `{}`).
pub fn assemble_env(
    base: &BTreeMap<String, String>,
    request: Option<&RunRequest>,
) -> Result<BTreeMap<String, String>> {
    let args = match request {
        Some(req) if !req.value.is_null() => serde_json::to_string(&req.value)?,
        _ => "{}".to_string(),
    };

    let mut env = base.clone();
    env.insert(INPUT_ENV_VAR.to_string(), args);
    Ok(env)
}
