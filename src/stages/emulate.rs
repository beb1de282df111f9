//! Interactive emulation.

use std::time::Duration;

use crate::config::RunnerConfig;
use crate::console;
use crate::driver::Session;
use crate::error::Error;
use crate::reaper::CancelToken;

/// Boot the firmware and hand the terminal to the operator.
///
/// The session pauses for the configured settle delay before the handoff
/// so the emulator's startup banners stay readable, then blocks until the
/// operator shuts the emulator down from inside.
pub fn run(cfg: &RunnerConfig, cancel: CancelToken, firmware_id: i64) -> Result<(), Error> {
    console::step("Emulating the firmware with the inferred network configuration...");
    console::step("Use CTRL-A then X to leave the emulator...");
    let argv = cfg.emulate_argv(firmware_id);
    console::command(&argv.join(" "));

    let mut session = Session::spawn(&argv, cancel)?;
    if !cancel.sleep(Duration::from_secs(cfg.settle_secs)) {
        return Err(Error::Cancelled);
    }
    session.interact()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::fake_toolkit;
    use tempfile::tempdir;

    #[test]
    fn handoff_runs_the_emulator_to_exit() {
        let dir = tempdir().unwrap();
        let cfg = fake_toolkit(dir.path());
        run(&cfg, CancelToken::new(), 7).unwrap();
    }
}
