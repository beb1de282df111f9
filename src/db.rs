//! Read-only access to the firmware metadata store.
//!
//! The store belongs to the extraction toolkit; the runner issues a single
//! lookup per run through the system `psql` client rather than linking a
//! database driver, the same way every other external concern is reached
//! through its own tool.

use std::process::Command;

use crate::config::DatabaseConfig;
use crate::error::Error;

/// The row the extractor creates for an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageRecord {
    pub id: i64,
    pub rootfs_extracted: bool,
}

/// Look up the record keyed by the image file name.
pub fn lookup_image(db: &DatabaseConfig, filename: &str) -> Result<ImageRecord, Error> {
    let query = format!(
        "SELECT id, rootfs_extracted FROM image WHERE filename = '{}'",
        filename.replace('\'', "''")
    );
    let output = Command::new(&db.psql)
        .arg("-h")
        .arg(&db.host)
        .arg("-U")
        .arg(&db.user)
        .arg("-d")
        .arg(&db.name)
        .arg("-t")
        .arg("-A")
        .arg("-F")
        .arg("|")
        .arg("-c")
        .arg(&query)
        .env("PGPASSWORD", &db.password)
        .output()
        .map_err(|e| Error::Spawn(format!("{}: {e}", db.psql.display())))?;
    if !output.status.success() {
        return Err(Error::Connectivity);
    }
    parse_row(&String::from_utf8_lossy(&output.stdout))
}

fn parse_row(stdout: &str) -> Result<ImageRecord, Error> {
    let line = stdout
        .lines()
        .find(|line| !line.trim().is_empty())
        .ok_or(Error::Parse("image record"))?;
    let mut columns = line.trim().split('|');
    let id = columns
        .next()
        .and_then(|v| v.trim().parse::<i64>().ok())
        .ok_or(Error::Parse("image id"))?;
    let rootfs_extracted = match columns.next().map(str::trim) {
        Some("t") | Some("true") => true,
        Some("f") | Some("false") => false,
        _ => return Err(Error::Parse("rootfs_extracted flag")),
    };
    Ok(ImageRecord {
        id,
        rootfs_extracted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::write_script;
    use tempfile::tempdir;

    #[test]
    fn parses_a_plain_row() {
        let record = parse_row("7|t\n").unwrap();
        assert_eq!(
            record,
            ImageRecord {
                id: 7,
                rootfs_extracted: true
            }
        );
        assert!(!parse_row("9|f\n").unwrap().rootfs_extracted);
    }

    #[test]
    fn empty_result_sets_and_garbage_fail() {
        assert!(matches!(parse_row("\n"), Err(Error::Parse(_))));
        assert!(matches!(parse_row("abc|t\n"), Err(Error::Parse(_))));
        assert!(matches!(parse_row("7|maybe\n"), Err(Error::Parse(_))));
    }

    #[test]
    fn lookup_runs_the_configured_client() {
        let dir = tempdir().unwrap();
        let psql = write_script(&dir.path().join("psql"), "echo '7|t'");
        let db = DatabaseConfig {
            psql,
            ..DatabaseConfig::default()
        };
        let record = lookup_image(&db, "fw.bin").unwrap();
        assert_eq!(record.id, 7);
        assert!(record.rootfs_extracted);
    }

    #[test]
    fn failing_client_maps_to_connectivity() {
        let dir = tempdir().unwrap();
        let psql = write_script(&dir.path().join("psql"), "exit 2");
        let db = DatabaseConfig {
            psql,
            ..DatabaseConfig::default()
        };
        assert!(matches!(
            lookup_image(&db, "fw.bin"),
            Err(Error::Connectivity)
        ));
    }
}
