use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use firmware_runner::config::RunnerConfig;
use firmware_runner::error::Error;
use firmware_runner::pipeline::{self, RunOptions};
use firmware_runner::stages::purge;
use firmware_runner::{console, reaper};

/// Automates firmware extraction and emulation on top of an external
/// analysis toolkit.
#[derive(Debug, Parser)]
#[command(name = "firmware-runner", version, about)]
struct Cli {
    /// Path to the firmware image
    #[arg(required_unless_present = "purge")]
    firmware: Option<PathBuf>,

    /// Delete the whole project related to the provided id
    #[arg(long, value_name = "FIRMWARE_ID")]
    purge: Option<i64>,

    /// Brand of the firmware image
    #[arg(short, long)]
    brand: Option<String>,

    /// Architecture of the firmware image
    #[arg(short, long)]
    arch: Option<String>,

    /// Skip the extraction process for the specified firmware id
    #[arg(long, value_name = "FIRMWARE_ID", conflicts_with = "extract_only")]
    skip: Option<i64>,

    /// Perform the extraction only
    #[arg(long)]
    extract_only: bool,

    /// Configuration file (firmware-runner.toml in the working directory
    /// is picked up automatically)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Runs the reaper on every exit path, interrupted or not.
struct ReapGuard;

impl Drop for ReapGuard {
    fn drop(&mut self) {
        reaper::reap_descendants();
    }
}

fn main() -> Result<()> {
    console::banner(env!("CARGO_PKG_VERSION"));
    let cli = Cli::parse();
    let cfg = RunnerConfig::load(cli.config.as_deref())?;
    let cancel = reaper::interrupt_token();
    let _guard = ReapGuard;

    let outcome = match (cli.purge, cli.firmware) {
        (Some(id), _) => purge::run(&cfg, cancel, id),
        (None, Some(firmware)) => pipeline::run(
            &cfg,
            RunOptions {
                firmware,
                brand: cli.brand,
                arch: cli.arch,
                skip_id: cli.skip,
                extract_only: cli.extract_only,
            },
            cancel,
        )
        .map(|_| ()),
        (None, None) => unreachable!("clap enforces the firmware argument"),
    };

    match outcome {
        Ok(()) => Ok(()),
        Err(Error::Cancelled) => {
            console::step("The program is stopping...");
            Ok(())
        }
        Err(err) if err.aborts_pipeline() => {
            console::fail(&format!("{err}"));
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}
