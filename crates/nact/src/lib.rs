//! Native action build pipeline for a one-action-per-process host.
//!
//! An action host hands this crate an init payload (user function body plus
//! an optional entry-point name) exactly once per process instance. The
//! pipeline materializes the code into a single compilable source file,
//! drives the external build command, and records the resulting binary.
//! Per invocation, it assembles the process environment the binary reads
//! its serialized arguments from. Receiving requests, invoking the binary,
//! and sandboxing all belong to the host.

pub mod build;
pub mod env;
pub mod lifecycle;
pub mod manifest;
pub mod materialize;

pub use build::{BuildOutput, BuildPipeline, CommandPipeline};
pub use env::{assemble_env, RunRequest, INPUT_ENV_VAR};
pub use lifecycle::{ActionRunner, InitReport, InitRequest, InitValue, LifecycleState};
pub use manifest::{load_runner_manifest, ActionLayout, RunnerManifest};
pub use materialize::{materialize, MaterializedSource, DEFAULT_ENTRY_POINT};

/// Version-pinned identifiers for machine-readable I/O. These constants are
/// the single source of truth for the schema strings that appear in runner
/// manifests and reports.
pub const RUNNER_MANIFEST_SCHEMA_VERSION: &str = "nact.runner@0.1.0";
pub const INIT_REPORT_SCHEMA_VERSION: &str = "nact.init.report@0.1.0";
pub const ENV_REPORT_SCHEMA_VERSION: &str = "nact.env.report@0.1.0";
