//! Disk-image construction.

use regex::Regex;

use crate::config::RunnerConfig;
use crate::console;
use crate::driver::{Expect, Session};
use crate::error::Error;
use crate::reaper::CancelToken;

/// Build the emulator disk image for the firmware.
///
/// The builder asks before overwriting a device that already carries a
/// filesystem; anything found there is leftover from an earlier run, so
/// the question is answered with yes after telling the operator where that
/// filesystem was last mounted.
pub fn build(
    cfg: &RunnerConfig,
    cancel: CancelToken,
    firmware_id: i64,
    arch: &str,
) -> Result<(), Error> {
    console::step("Creating the emulator disk image for the firmware...");
    let argv = cfg.makeimage_argv(firmware_id, arch);
    console::command(&argv.join(" "));

    let mut session = Session::spawn(&argv, cancel)?;
    let outcomes = [Expect::text("Proceed anyway?"), Expect::Eof];
    let matched = session.expect(&outcomes, None)?;
    if matched.index == 0 {
        let mounted = Regex::new("last mounted on (.*)")?
            .captures(&matched.before)
            .and_then(|captures| captures.get(1))
            .map(|m| m.as_str().trim().to_string());
        match mounted {
            Some(info) => console::warn(&format!(
                "The target device already contains a filesystem which was mounted on {info}"
            )),
            None => console::warn("The target device already contains a filesystem..."),
        }
        session.send_line("y")?;
    }
    session.wait()?;
    console::done("Emulator disk image successfully created!");
    Ok(())
}
