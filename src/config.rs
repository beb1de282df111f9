//! Runner configuration.
//!
//! The toolkit location, database credentials and stage tunables live in an
//! optional TOML file; everything defaults to a stock Firmadyne layout. The
//! whole structure is passed into the pipeline controller explicitly so the
//! stages can be pointed at a substitute toolkit.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "firmware-runner.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RunnerConfig {
    /// Root of the analysis-toolkit installation.
    pub toolkit_root: PathBuf,
    /// Where extracted archives land. Defaults to `<toolkit_root>/images`.
    pub output_dir: Option<PathBuf>,
    /// Run the disk-image builder through sudo.
    pub sudo: bool,
    /// How long the network prober lets the firmware run, in seconds.
    pub probe_runtime_secs: u64,
    /// Pause before handing the terminal to the emulator, in seconds.
    pub settle_secs: u64,
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct DatabaseConfig {
    pub name: String,
    pub user: String,
    pub password: String,
    pub host: String,
    /// Client binary used for the one metadata lookup per run.
    pub psql: PathBuf,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            toolkit_root: PathBuf::from("/opt/firmadyne"),
            output_dir: None,
            sudo: true,
            probe_runtime_secs: 60,
            settle_secs: 5,
            database: DatabaseConfig::default(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            name: "firmware".to_string(),
            user: "firmadyne".to_string(),
            password: "firmadyne".to_string(),
            host: "localhost".to_string(),
            psql: PathBuf::from("psql"),
        }
    }
}

impl RunnerConfig {
    /// Load from an explicit file, else `firmware-runner.toml` in the
    /// working directory, else built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !fallback.is_file() {
                    return Ok(Self::default());
                }
                fallback
            }
        };
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("reading config '{}'", path.display()))?;
        let parsed: RunnerConfig = toml::from_str(&raw)
            .with_context(|| format!("parsing config '{}'", path.display()))?;
        Ok(parsed)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| self.toolkit_root.join("images"))
    }

    pub fn script(&self, name: &str) -> PathBuf {
        self.toolkit_root.join("scripts").join(name)
    }

    pub fn extractor_script(&self) -> PathBuf {
        self.toolkit_root.join("sources/extractor/extractor.py")
    }

    /// The compressed filesystem archive the extractor writes for an image.
    pub fn archive_path(&self, firmware_id: i64) -> PathBuf {
        self.output_dir().join(format!("{firmware_id}.tar.gz"))
    }

    pub fn extractor_argv(&self, firmware: &Path, brand: Option<&str>) -> Vec<String> {
        let mut argv = vec![path_str(&self.extractor_script())];
        if let Some(brand) = brand {
            argv.push("-b".to_string());
            argv.push(brand.to_string());
        }
        argv.extend([
            "-sql".to_string(),
            "127.0.0.1".to_string(),
            "-np".to_string(),
            "-nk".to_string(),
            path_str(firmware),
            path_str(&self.output_dir()),
        ]);
        argv
    }

    pub fn getarch_argv(&self, firmware_id: i64) -> Vec<String> {
        vec![
            path_str(&self.script("getArch.sh")),
            path_str(&self.archive_path(firmware_id)),
        ]
    }

    pub fn tar2db_argv(&self, firmware_id: i64) -> Vec<String> {
        vec![
            path_str(&self.script("tar2db.py")),
            "-i".to_string(),
            firmware_id.to_string(),
            "-f".to_string(),
            path_str(&self.archive_path(firmware_id)),
        ]
    }

    pub fn makeimage_argv(&self, firmware_id: i64, arch: &str) -> Vec<String> {
        let mut argv = Vec::new();
        if self.sudo {
            argv.push("sudo".to_string());
        }
        argv.push(path_str(&self.script("makeImage.sh")));
        argv.push(firmware_id.to_string());
        argv.push(arch.to_string());
        argv
    }

    pub fn infernetwork_argv(&self, firmware_id: i64, arch: &str) -> Vec<String> {
        vec![
            path_str(&self.script("inferNetwork.sh")),
            firmware_id.to_string(),
            arch.to_string(),
        ]
    }

    pub fn emulate_argv(&self, firmware_id: i64) -> Vec<String> {
        vec![path_str(
            &self
                .toolkit_root
                .join("scratch")
                .join(firmware_id.to_string())
                .join("run.sh"),
        )]
    }

    pub fn delete_argv(&self, firmware_id: i64) -> Vec<String> {
        vec![path_str(&self.script("delete.sh")), firmware_id.to_string()]
    }
}

fn path_str(path: &Path) -> String {
    path.display().to_string()
}
