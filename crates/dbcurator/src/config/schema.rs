use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CuratorConfig {
    pub version: String,
    /// Folder that receives finished curation artifacts.
    pub fasta_folder: String,
    /// Parent folder for per-run scratch workspaces.
    #[serde(default = "default_temp_folder")]
    pub temp_folder: String,
    /// Folder holding downloaded source archives.
    pub archive_folder: String,
    #[serde(default)]
    pub database_path: Option<String>,
    #[serde(default = "default_true")]
    pub retain_artifacts: bool,
    #[serde(default)]
    pub invalid_artifact_policy: InvalidArtifactPolicy,
    #[serde(default = "default_poll_interval_ms")]
    pub download_poll_interval_ms: u64,
    #[serde(default)]
    pub ftp: FtpConfig,
    #[serde(default)]
    pub bundled_resources: BundledResourcesConfig,
}

fn default_true() -> bool {
    true
}

fn default_temp_folder() -> String {
    std::env::temp_dir().to_string_lossy().into_owned()
}

fn default_poll_interval_ms() -> u64 {
    2500
}

impl CuratorConfig {
    /// Explicit database path, or `~/.dbcurator/data/dbcurator.db`.
    pub fn database_path(&self) -> Option<PathBuf> {
        self.database_path
            .as_ref()
            .map(PathBuf::from)
            .or_else(crate::db::default_database_path)
    }

    pub fn download_poll_interval(&self) -> Duration {
        Duration::from_millis(self.download_poll_interval_ms)
    }
}

/// What to do when a run's final output is not a structurally valid FASTA file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvalidArtifactPolicy {
    /// Report the problem in the status messages and keep going.
    #[default]
    Warn,
    /// Mark the run failed and roll back.
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FtpConfig {
    #[serde(default = "default_ftp_username")]
    pub username: String,
    #[serde(default = "default_ftp_password")]
    pub password: String,
}

fn default_ftp_username() -> String {
    "anonymous".to_string()
}

fn default_ftp_password() -> String {
    "anonymous@".to_string()
}

impl Default for FtpConfig {
    fn default() -> Self {
        Self {
            username: default_ftp_username(),
            password: default_ftp_password(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BundledResourcesConfig {
    #[serde(default)]
    pub root: Option<String>,
    #[serde(default)]
    pub allowed: Vec<String>,
}
