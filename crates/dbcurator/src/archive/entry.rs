use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A downloaded copy of a source database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveEntry {
    #[serde(default)]
    pub id: Option<i64>,
    pub source_url: String,
    pub archive_path: PathBuf,
    /// Modification time reported by the server. The Unix epoch means unknown.
    pub server_date: DateTime<Utc>,
    pub download_date: DateTime<Utc>,
}

impl ArchiveEntry {
    pub fn new(
        source_url: impl Into<String>,
        archive_path: impl Into<PathBuf>,
        server_date: DateTime<Utc>,
        download_date: DateTime<Utc>,
    ) -> Self {
        Self {
            id: None,
            source_url: source_url.into(),
            archive_path: archive_path.into(),
            server_date,
            download_date,
        }
    }

    pub fn server_date_known(&self) -> bool {
        self.server_date.timestamp() > 0
    }

    /// Whether this entry can stand in for a remote file last modified at
    /// `observed`.
    pub fn is_current_for(&self, observed: DateTime<Utc>) -> bool {
        self.server_date_known() && self.server_date >= observed && self.archive_path.is_file()
    }
}
