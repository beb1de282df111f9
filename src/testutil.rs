//! Fake toolkits for the test suite: small executable shell scripts that
//! play the transcripts the real tools produce.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use crate::config::{DatabaseConfig, RunnerConfig};

pub(crate) fn write_script(path: &Path, body: &str) -> PathBuf {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, format!("#!/bin/sh\n{body}\n")).unwrap();
    let mut perms = fs::metadata(path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).unwrap();
    path.to_path_buf()
}

/// A toolkit whose scripts play the happy path for firmware id 7.
///
/// Individual tests overwrite single scripts to exercise other branches.
pub(crate) fn fake_toolkit(root: &Path) -> RunnerConfig {
    let scripts = root.join("scripts");
    write_script(
        &root.join("sources/extractor/extractor.py"),
        "echo 'Database Image ID: 7'",
    );
    write_script(&scripts.join("getArch.sh"), "echo '/tmp/7.tar.gz: mipseb'");
    write_script(&scripts.join("tar2db.py"), "exit 0");
    write_script(&scripts.join("makeImage.sh"), "echo 'image done'");
    write_script(
        &scripts.join("inferNetwork.sh"),
        "echo 'Interfaces: [192.168.0.100]'",
    );
    write_script(
        &scripts.join("delete.sh"),
        "printf 'Password for user firmadyne:'; read _pw; echo Done",
    );
    write_script(&root.join("scratch/7/run.sh"), "echo 'booting firmware'");
    let psql = write_script(&root.join("bin/psql"), "echo '7|t'");

    RunnerConfig {
        toolkit_root: root.to_path_buf(),
        output_dir: None,
        sudo: false,
        probe_runtime_secs: 1,
        settle_secs: 0,
        database: DatabaseConfig {
            psql,
            ..DatabaseConfig::default()
        },
    }
}
