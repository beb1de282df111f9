//! Pipeline controller.
//!
//! Sequences the stages in their fixed order, threading the firmware id
//! and the resolved architecture through, and records how far the run got.
//! Stage failures are reported on the console and absorbed into the report
//! rather than propagated; only cancellation and environment faults unwind
//! to the binary.

use std::path::PathBuf;

use crate::config::RunnerConfig;
use crate::console;
use crate::error::Error;
use crate::preflight;
use crate::reaper::CancelToken;
use crate::stages::metadata::Persisted;
use crate::stages::{arch, emulate, extract, image, metadata, network};

/// One pipeline run, built from the command line and filled in as the
/// stages complete. The firmware id is assigned at most once, by the
/// extraction stage or by `--skip`.
#[derive(Debug, Clone)]
pub struct FirmwareJob {
    pub image: PathBuf,
    pub brand: Option<String>,
    pub firmware_id: Option<i64>,
    pub architecture: Option<String>,
    pub rootfs_extracted: bool,
}

/// Caller-facing knobs for a run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub firmware: PathBuf,
    pub brand: Option<String>,
    pub arch: Option<String>,
    pub skip_id: Option<i64>,
    pub extract_only: bool,
}

/// How far a run progressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Start,
    Extracted,
    ArchResolved,
    MetadataPersisted,
    ImageBuilt,
    NetworkInferred,
    Emulating,
    Done,
    Aborted,
}

/// Where a run ended and what it learned along the way.
#[derive(Debug)]
pub struct PipelineReport {
    pub state: PipelineState,
    pub job: FirmwareJob,
    pub warnings: usize,
    pub failure: Option<Error>,
}

impl PipelineReport {
    fn abort(mut self, failure: Error) -> Self {
        console::fail(&format!("The pipeline did not complete: {failure}"));
        self.state = PipelineState::Aborted;
        self.failure = Some(failure);
        self
    }

    fn abort_quietly(mut self) -> Self {
        self.state = PipelineState::Aborted;
        self
    }
}

/// Run the pipeline described by `opts` against the toolkit in `cfg`.
pub fn run(
    cfg: &RunnerConfig,
    opts: RunOptions,
    cancel: CancelToken,
) -> Result<PipelineReport, Error> {
    let job = FirmwareJob {
        image: opts.firmware.clone(),
        brand: opts.brand.clone(),
        firmware_id: opts.skip_id,
        architecture: opts.arch.clone(),
        rootfs_extracted: opts.skip_id.is_some(),
    };
    let mut report = PipelineReport {
        state: PipelineState::Start,
        job,
        warnings: 0,
        failure: None,
    };

    if let Err(err) = preflight::check_toolkit(cfg) {
        return Ok(report.abort(err));
    }

    let firmware_id = match report.job.firmware_id {
        Some(id) => id,
        None => {
            let record = match extract::run(cfg, cancel, &opts.firmware, opts.brand.as_deref()) {
                Ok(record) => record,
                Err(err) if err.aborts_pipeline() => return Ok(report.abort(err)),
                Err(err) => return Err(err),
            };
            report.job.firmware_id = Some(record.id);
            report.job.rootfs_extracted = record.rootfs_extracted;
            if !record.rootfs_extracted {
                console::fail("The firmware extraction failed...");
                console::hint(&format!(
                    "Please extract the filesystem manually and compress it into a \
                     .tar.gz archive placed in the {} directory.",
                    cfg.output_dir().display()
                ));
                console::hint(&format!(
                    "You can then skip the extraction process with the --skip \
                     parameter and your firmware id '{}'.",
                    record.id
                ));
                return Ok(report.abort_quietly());
            }
            console::done("Firmware successfully extracted!");
            record.id
        }
    };
    report.state = PipelineState::Extracted;

    if opts.extract_only {
        return Ok(report);
    }

    let architecture = match report.job.architecture.clone() {
        Some(arch) => arch,
        None => match arch::detect(cfg, cancel, firmware_id) {
            Ok(Some(arch)) => arch,
            Ok(None) => return Ok(report.abort_quietly()),
            Err(err) if err.aborts_pipeline() => return Ok(report.abort(err)),
            Err(err) => return Err(err),
        },
    };
    report.job.architecture = Some(architecture.clone());
    report.state = PipelineState::ArchResolved;

    match metadata::persist(cfg, cancel, firmware_id) {
        Ok(Persisted::Fresh) => {}
        Ok(Persisted::AlreadyDone) => report.warnings += 1,
        Err(err) if err.aborts_pipeline() => return Ok(report.abort(err)),
        Err(err) => return Err(err),
    }
    report.state = PipelineState::MetadataPersisted;

    match image::build(cfg, cancel, firmware_id, &architecture) {
        Ok(()) => {}
        Err(err) if err.aborts_pipeline() => return Ok(report.abort(err)),
        Err(err) => return Err(err),
    }
    report.state = PipelineState::ImageBuilt;

    match network::infer(cfg, cancel, firmware_id, &architecture) {
        Ok(Some(_)) => {}
        Ok(None) => {
            report.warnings += 1;
            console::warn(
                "The firmware will still be emulated but you will have to manually \
                 configure the network in the emulator monitor console to access \
                 your emulated firmware from your host...",
            );
        }
        Err(err) if err.aborts_pipeline() => return Ok(report.abort(err)),
        Err(err) => return Err(err),
    }
    report.state = PipelineState::NetworkInferred;

    report.state = PipelineState::Emulating;
    match emulate::run(cfg, cancel, firmware_id) {
        Ok(()) => {}
        Err(err) if err.aborts_pipeline() => return Ok(report.abort(err)),
        Err(err) => return Err(err),
    }

    report.state = PipelineState::Done;
    Ok(report)
}
