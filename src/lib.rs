//! Automation for firmware extraction and emulation pipelines.
//!
//! This crate sequences the external tools of a Firmadyne-style analysis
//! toolkit — extractor, architecture detector, filesystem-metadata writer,
//! disk-image builder, network prober, emulator, project deleter — by
//! driving each one interactively on a pseudo-terminal and branching on
//! the text it prints:
//!
//! - **Interactive driver** - pty sessions with expect-style pattern waits
//! - **Stage functions** - one module per delegated tool
//! - **Pipeline controller** - sequencing, short-circuits, run report
//! - **Reaper** - interrupt handling and process-tree teardown
//! - **Preflight checks** - toolkit validation before the first spawn
//!
//! The stages never run concurrently: one subprocess is owned at a time
//! and driven to an expected boundary before the next stage starts. The
//! binary in `src/bin/firmware-runner.rs` adds the CLI surface.

pub mod config;
pub mod console;
pub mod db;
pub mod driver;
pub mod error;
pub mod fields;
pub mod pipeline;
pub mod preflight;
pub mod reaper;
pub mod stages;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::{DatabaseConfig, RunnerConfig};
pub use driver::{Expect, Match, Session};
pub use error::Error;
pub use pipeline::{FirmwareJob, PipelineReport, PipelineState, RunOptions};
pub use reaper::CancelToken;
