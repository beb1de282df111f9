//! Firmware extraction.

use std::path::Path;

use crate::config::RunnerConfig;
use crate::console;
use crate::db::{self, ImageRecord};
use crate::driver::{Expect, Session};
use crate::error::Error;
use crate::fields;
use crate::reaper::CancelToken;

/// Run the extractor and resolve the record it created in the metadata
/// store.
///
/// The extractor announces the id it was assigned early on; the rest of its
/// output is passed through to the operator until it finishes. Whether the
/// root filesystem actually came out is only known to the store, so the
/// authoritative `(id, rootfs_extracted)` pair is read back from there.
pub fn run(
    cfg: &RunnerConfig,
    cancel: CancelToken,
    firmware: &Path,
    brand: Option<&str>,
) -> Result<ImageRecord, Error> {
    console::step("Extracting the firmware... please be patient, it might take a while...");
    let argv = cfg.extractor_argv(firmware, brand);
    console::command(&argv.join(" "));

    let mut session = Session::spawn(&argv, cancel)?;
    let outcomes = [
        Expect::text("Connection refused"),
        Expect::pattern(r"Database Image ID: .*\n")?,
    ];
    let matched = session.expect(&outcomes, None)?;
    if matched.index == 0 {
        console::fail("Please ensure the metadata store service is running...");
        return Err(Error::Connectivity);
    }
    match fields::field(&matched.text, ':', 1) {
        Ok(id) => console::done(&format!(
            "Your firmware image has been attributed the ID: {id}"
        )),
        Err(_) => console::warn("The assigned ID could not be read from the extractor output..."),
    }

    console::step("Still extracting the firmware...");
    session.forward_to_eof()?;

    let filename = firmware
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or(Error::Parse("firmware file name"))?;
    db::lookup_image(&cfg.database, filename)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{fake_toolkit, write_script};
    use tempfile::tempdir;

    #[test]
    fn resolves_the_record_after_extraction() {
        let dir = tempdir().unwrap();
        let cfg = fake_toolkit(dir.path());
        let record = run(
            &cfg,
            CancelToken::new(),
            Path::new("/tmp/fw.bin"),
            Some("acme"),
        )
        .unwrap();
        assert_eq!(
            record,
            ImageRecord {
                id: 7,
                rootfs_extracted: true
            }
        );
    }

    #[test]
    fn refused_connection_is_fatal() {
        let dir = tempdir().unwrap();
        let cfg = fake_toolkit(dir.path());
        write_script(
            &cfg.extractor_script(),
            "echo 'could not connect to server: Connection refused'",
        );
        let err = run(&cfg, CancelToken::new(), Path::new("/tmp/fw.bin"), None).unwrap_err();
        assert!(matches!(err, Error::Connectivity));
    }
}
