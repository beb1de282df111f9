//! Architecture detection.

use crate::config::RunnerConfig;
use crate::console;
use crate::driver::{Expect, Session};
use crate::error::Error;
use crate::fields;
use crate::reaper::CancelToken;

/// Recover the instruction-set token for an extracted image.
///
/// The detector may need the store credential along the way; any password
/// prompt is answered and the token is parsed from the first line of the
/// transcript once the script finishes. Unparsable output degrades to
/// `None` so the caller can fall back to an explicit override.
pub fn detect(
    cfg: &RunnerConfig,
    cancel: CancelToken,
    firmware_id: i64,
) -> Result<Option<String>, Error> {
    console::step("Getting the firmware architecture...");
    let argv = cfg.getarch_argv(firmware_id);
    console::command(&argv.join(" "));

    let mut session = Session::spawn(&argv, cancel)?;
    let prompt = format!("Password for user {}:", cfg.database.user);
    loop {
        let outcomes = [Expect::text(prompt.as_str()), Expect::Eof];
        let matched = session.expect(&outcomes, None)?;
        if matched.index == 0 {
            session.send_line(&cfg.database.password)?;
        } else {
            break;
        }
    }
    session.wait()?;

    match fields::field(session.output(), ':', 1) {
        Ok(arch) if !arch.is_empty() => {
            console::done(&format!(
                "The architecture of your firmware image is: {arch}"
            ));
            Ok(Some(arch))
        }
        _ => {
            console::fail("The firmware architecture couldn't be determined...");
            console::hint(
                "Please try manually with the file command and provide the correct \
                 architecture type with the --arch parameter...",
            );
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{fake_toolkit, write_script};
    use tempfile::tempdir;

    #[test]
    fn parses_the_token_after_the_colon() {
        let dir = tempdir().unwrap();
        let cfg = fake_toolkit(dir.path());
        let arch = detect(&cfg, CancelToken::new(), 7).unwrap();
        assert_eq!(arch.as_deref(), Some("mipseb"));
    }

    #[test]
    fn unparsable_output_degrades_to_none() {
        let dir = tempdir().unwrap();
        let cfg = fake_toolkit(dir.path());
        write_script(&cfg.script("getArch.sh"), "echo 'nothing useful here'");
        let arch = detect(&cfg, CancelToken::new(), 7).unwrap();
        assert_eq!(arch, None);
    }
}
