//! Network inference.

use std::time::Duration;

use regex::Regex;

use crate::config::RunnerConfig;
use crate::console;
use crate::driver::{Expect, Session};
use crate::error::Error;
use crate::reaper::CancelToken;

/// Margin on top of the probe runtime before the stage gives up; a
/// firmware that never announces interfaces must not hang the pipeline.
const PROBE_GRACE: Duration = Duration::from_secs(5);

/// Run the firmware briefly and observe which interfaces it brings up.
///
/// Returns the detected interface list, or `None` when nothing announced
/// itself (empty list, timeout, or a prober that quit early); the caller
/// proceeds to emulation either way.
pub fn infer(
    cfg: &RunnerConfig,
    cancel: CancelToken,
    firmware_id: i64,
    arch: &str,
) -> Result<Option<String>, Error> {
    let runtime = cfg.probe_runtime_secs;
    console::step("Determining the network configuration of the firmware...");
    console::step(&format!(
        "The firmware will now be running for {runtime} seconds..."
    ));
    let argv = cfg.infernetwork_argv(firmware_id, arch);
    console::command(&argv.join(" "));

    let announce = Regex::new(r"Interfaces: \[(.*)\]")?;
    let mut session = Session::spawn(&argv, cancel)?;
    let timeout = Duration::from_secs(runtime) + PROBE_GRACE;
    let matched = match session.expect(&[Expect::Pattern(announce.clone())], Some(timeout)) {
        Ok(matched) => matched,
        Err(Error::Timeout(_)) | Err(Error::UnexpectedEof) => {
            session.terminate();
            console::warn("No network interface could be determined...");
            return Ok(None);
        }
        Err(err) => return Err(err),
    };
    session.wait()?;

    let interfaces = announce
        .captures(&matched.text)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();
    if interfaces.is_empty() {
        console::warn("No network interface could be determined...");
        Ok(None)
    } else {
        console::done(&format!(
            "Your firmware will be accessible at {interfaces}!"
        ));
        Ok(Some(interfaces))
    }
}
