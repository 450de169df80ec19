//! Lifecycle adapter: the integration surface the action host drives.
//!
//! One runner instance carries one action through
//! `Unbuilt -> Building -> Ready | Failed`. Ready and Failed are terminal
//! within a process instance; rebuilding requires a new process.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;

use crate::build::{BuildPipeline, CommandPipeline};
use crate::env::{assemble_env, RunRequest};
use crate::manifest::ActionLayout;
use crate::materialize::materialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Unbuilt,
    Building,
    Ready,
    Failed,
}

impl LifecycleState {
    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleState::Unbuilt => "unbuilt",
            LifecycleState::Building => "building",
            LifecycleState::Ready => "ready",
            LifecycleState::Failed => "failed",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Init payload, received exactly once per process lifetime. Extra fields
/// belong to the host and are ignored here.
#[derive(Debug, Clone, Deserialize)]
pub struct InitRequest {
    pub value: InitValue,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InitValue {
    pub code: String,
    #[serde(default)]
    pub main: Option<String>,
}

#[derive(Debug, Clone)]
pub struct InitReport {
    pub ok: bool,
    pub exit_status: i32,
    pub entry_point: String,
    pub source_bytes: usize,
    pub source_sha256: String,
    pub artifact: Option<PathBuf>,
    pub artifact_size: Option<u64>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

pub struct ActionRunner<P = CommandPipeline> {
    layout: ActionLayout,
    pipeline: P,
    state: LifecycleState,
}

impl ActionRunner<CommandPipeline> {
    pub fn new(layout: ActionLayout) -> Self {
        let pipeline = CommandPipeline::new(layout.build_command.clone());
        Self::with_pipeline(layout, pipeline)
    }
}

impl<P: BuildPipeline> ActionRunner<P> {
    pub fn with_pipeline(layout: ActionLayout, pipeline: P) -> Self {
        Self {
            layout,
            pipeline,
            state: LifecycleState::Unbuilt,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn layout(&self) -> &ActionLayout {
        &self.layout
    }

    /// Artifact path, valid once the build reached Ready.
    pub fn artifact(&self) -> Option<&Path> {
        (self.state == LifecycleState::Ready).then(|| self.layout.artifact.as_path())
    }

    /// Materialize and build the action. One build per process instance:
    /// any call outside Unbuilt is rejected. A build pipeline that runs and
    /// fails is reported through the returned `InitReport` with its full
    /// diagnostics, not as an `Err`.
    pub fn init(&mut self, request: &InitRequest) -> Result<InitReport> {
        if self.state != LifecycleState::Unbuilt {
            anyhow::bail!(
                "action already initialized (state {}); rebuilding requires a new process instance",
                self.state
            );
        }
        self.state = LifecycleState::Building;

        let source = match materialize(
            &self.layout,
            &request.value.code,
            request.value.main.as_deref(),
        ) {
            Ok(source) => source,
            Err(err) => {
                self.state = LifecycleState::Failed;
                return Err(err);
            }
        };

        let out = match self.pipeline.build(&self.layout.build_dir) {
            Ok(out) => out,
            Err(err) => {
                self.state = LifecycleState::Failed;
                return Err(err);
            }
        };

        if !out.ok {
            self.state = LifecycleState::Failed;
            info!("action build failed with exit status {}", out.exit_status);
            return Ok(InitReport {
                ok: false,
                exit_status: out.exit_status,
                entry_point: source.entry_point,
                source_bytes: source.source_bytes,
                source_sha256: source.source_sha256,
                artifact: None,
                artifact_size: None,
                stdout: out.stdout,
                stderr: out.stderr,
            });
        }

        // Success contract with the external pipeline: the binary exists at
        // the agreed path.
        let artifact_size = match std::fs::metadata(&self.layout.artifact) {
            Ok(meta) => meta.len(),
            Err(err) => {
                self.state = LifecycleState::Failed;
                return Err(err).with_context(|| {
                    format!(
                        "build pipeline succeeded but artifact is missing: {}",
                        self.layout.artifact.display()
                    )
                });
            }
        };

        self.state = LifecycleState::Ready;
        info!("action ready: {}", self.layout.artifact.display());
        Ok(InitReport {
            ok: true,
            exit_status: out.exit_status,
            entry_point: source.entry_point,
            source_bytes: source.source_bytes,
            source_sha256: source.source_sha256,
            artifact: Some(self.layout.artifact.clone()),
            artifact_size: Some(artifact_size),
            stdout: out.stdout,
            stderr: out.stderr,
        })
    }

    /// Execution environment for one invocation. Usable in every state; a
    /// run request arriving before Ready is the host's error to report.
    pub fn env(
        &self,
        base: &BTreeMap<String, String>,
        request: Option<&RunRequest>,
    ) -> Result<BTreeMap<String, String>> {
        assemble_env(base, request)
    }
}
