//! Preflight checks for the analysis toolkit.
//!
//! Validates that every delegated script and host tool exists before the
//! pipeline spawns anything. This prevents cryptic mid-run failures after
//! an extraction that may have taken an hour.

use crate::config::RunnerConfig;
use crate::error::Error;

/// Stage scripts expected under `<toolkit_root>/scripts`.
pub const STAGE_SCRIPTS: &[&str] = &[
    "getArch.sh",
    "tar2db.py",
    "makeImage.sh",
    "inferNetwork.sh",
    "delete.sh",
];

/// Check the toolkit pieces and host tools a full pipeline run needs.
///
/// Every missing piece is collected so the operator sees the complete
/// list at once.
pub fn check_toolkit(cfg: &RunnerConfig) -> Result<(), Error> {
    let mut missing = Vec::new();

    let extractor = cfg.extractor_script();
    if !extractor.is_file() {
        missing.push(format!("  {} (extractor)", extractor.display()));
    }
    for name in STAGE_SCRIPTS {
        let script = cfg.script(name);
        if !script.is_file() {
            missing.push(format!("  {}", script.display()));
        }
    }
    if which::which(&cfg.database.psql).is_err() {
        missing.push(format!(
            "  {} (metadata store client)",
            cfg.database.psql.display()
        ));
    }
    if cfg.sudo && which::which("sudo").is_err() {
        missing.push("  sudo (or set sudo = false in the config)".to_string());
    }

    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::Toolkit(missing.join("\n")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::fake_toolkit;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn complete_toolkit_passes() {
        let dir = tempdir().unwrap();
        let cfg = fake_toolkit(dir.path());
        check_toolkit(&cfg).unwrap();
    }

    #[test]
    fn every_missing_piece_is_listed() {
        let dir = tempdir().unwrap();
        let cfg = fake_toolkit(dir.path());
        fs::remove_file(cfg.script("tar2db.py")).unwrap();
        fs::remove_file(cfg.script("delete.sh")).unwrap();
        let err = check_toolkit(&cfg).unwrap_err();
        let Error::Toolkit(listing) = err else {
            panic!("expected a toolkit error");
        };
        assert!(listing.contains("tar2db.py"));
        assert!(listing.contains("delete.sh"));
        assert!(!listing.contains("getArch.sh"));
    }
}
