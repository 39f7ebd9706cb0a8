use thiserror::Error;

use crate::archive::ArchiveError;
use crate::db::DatabaseError;
use crate::error::{FastaError, StorageError};

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("Could not create a workspace for the run: {0}")]
    Workspace(StorageError),

    #[error("Storage failed: {0}")]
    Storage(#[from] StorageError),

    #[error("Store failed: {0}")]
    Store(#[from] DatabaseError),

    #[error("Archive failed: {0}")]
    Archive(#[from] ArchiveError),

    #[error("FASTA stream failed: {0}")]
    Fasta(#[from] FastaError),

    #[error("Failed to spawn executor thread: {0}")]
    SpawnFailed(String),

    #[error("Executor thread panicked")]
    WorkerPanicked,

    #[error("Step panicked: {0}")]
    StepPanicked(String),
}
