use std::path::PathBuf;
use thiserror::Error;

use crate::db::DatabaseError;
use crate::error::StorageError;

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Invalid source locator '{locator}': {reason}")]
    InvalidLocator { locator: String, reason: String },

    #[error("Unsupported URL scheme '{0}'")]
    UnsupportedScheme(String),

    #[error("Bundled resource '{0}' is not an allowed source")]
    NotAllowed(String),

    #[error("Archive destination already exists: {0}")]
    DestinationExists(PathBuf),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("FTP error: {0}")]
    Ftp(#[from] suppaftp::FtpError),

    #[error("IO error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Database error: {0}")]
    Store(#[from] DatabaseError),

    #[error("Failed to spawn download worker: {0}")]
    SpawnFailed(String),

    #[error("Download worker stopped without reporting a result")]
    DownloadAborted,
}
