use std::path::PathBuf;

use crate::config::{CuratorConfig, InvalidArtifactPolicy};

/// The slice of [`CuratorConfig`] a run needs.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub fasta_folder: PathBuf,
    pub temp_folder: PathBuf,
    pub retain_artifacts: bool,
    pub invalid_artifact_policy: InvalidArtifactPolicy,
}

impl ExecutorConfig {
    pub fn new<P: Into<PathBuf>, Q: Into<PathBuf>>(fasta_folder: P, temp_folder: Q) -> Self {
        Self {
            fasta_folder: fasta_folder.into(),
            temp_folder: temp_folder.into(),
            retain_artifacts: true,
            invalid_artifact_policy: InvalidArtifactPolicy::default(),
        }
    }

    pub fn from_config(config: &CuratorConfig) -> Self {
        Self {
            fasta_folder: PathBuf::from(&config.fasta_folder),
            temp_folder: PathBuf::from(&config.temp_folder),
            retain_artifacts: config.retain_artifacts,
            invalid_artifact_policy: config.invalid_artifact_policy,
        }
    }
}
