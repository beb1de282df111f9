//! Filesystem-metadata persistence.

use crate::config::RunnerConfig;
use crate::console;
use crate::driver::{Expect, Session};
use crate::error::Error;
use crate::fields;
use crate::reaper::CancelToken;

/// Result of the metadata write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persisted {
    Fresh,
    AlreadyDone,
}

/// Write the extracted filesystem listing into the metadata store.
///
/// A duplicate-key complaint means an earlier run already did this and is
/// harmless; a missing archive is fatal and the offending path is surfaced
/// to the operator.
pub fn persist(
    cfg: &RunnerConfig,
    cancel: CancelToken,
    firmware_id: i64,
) -> Result<Persisted, Error> {
    console::step("Writing filesystem information into the metadata store...");
    let argv = cfg.tar2db_argv(firmware_id);
    console::command(&argv.join(" "));

    let mut session = Session::spawn(&argv, cancel)?;
    let outcomes = [
        Expect::pattern(r"Key.*already exists")?,
        Expect::pattern(r"No such file or directory: .*\n")?,
        Expect::Eof,
    ];
    let matched = session.expect(&outcomes, None)?;
    let index = matched.index;
    let text = matched.text;
    session.wait()?;

    match index {
        0 => {
            console::warn("This step was already performed earlier...");
            Ok(Persisted::AlreadyDone)
        }
        1 => {
            let path =
                fields::field(&text, ':', 1).unwrap_or_else(|_| "<unknown>".to_string());
            console::fail(&format!("The file {path} does not exist..."));
            Err(Error::MissingInput(path))
        }
        _ => {
            console::done("Filesystem information successfully written!");
            Ok(Persisted::Fresh)
        }
    }
}
