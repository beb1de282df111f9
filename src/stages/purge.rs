//! Project deletion.

use crate::config::RunnerConfig;
use crate::console;
use crate::driver::{Expect, Session};
use crate::error::Error;
use crate::reaper::CancelToken;

/// Delete every artifact and record belonging to a project.
///
/// The delete tool authenticates against the metadata store itself; the
/// stage answers its password prompt with the stored credential and waits
/// for the completion marker. There is no recoverable failure here.
pub fn run(cfg: &RunnerConfig, cancel: CancelToken, firmware_id: i64) -> Result<(), Error> {
    console::step("Deleting the project...");
    let argv = cfg.delete_argv(firmware_id);
    console::command(&argv.join(" "));

    let mut session = Session::spawn(&argv, cancel)?;
    let prompt = format!("Password for user {}:", cfg.database.user);
    session.expect(&[Expect::text(prompt)], None)?;
    session.send_line(&cfg.database.password)?;
    session.expect(&[Expect::text("Done")], None)?;
    session.wait()?;
    console::done("Project successfully deleted!");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{fake_toolkit, write_script};
    use tempfile::tempdir;

    #[test]
    fn answers_the_prompt_and_waits_for_done() {
        let dir = tempdir().unwrap();
        let cfg = fake_toolkit(dir.path());
        run(&cfg, CancelToken::new(), 7).unwrap();
    }

    #[test]
    fn anything_else_is_fatal() {
        let dir = tempdir().unwrap();
        let cfg = fake_toolkit(dir.path());
        write_script(&cfg.script("delete.sh"), "echo 'unexpected crash'; exit 1");
        let err = run(&cfg, CancelToken::new(), 7).unwrap_err();
        assert!(matches!(err, Error::UnexpectedEof));
    }
}
