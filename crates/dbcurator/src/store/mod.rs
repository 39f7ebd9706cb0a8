//! Persistence contract used by the executor, the steps, and the archive cache.

pub mod sqlite;

pub use sqlite::SqliteCurationStore;

use chrono::{DateTime, Utc};

use crate::archive::ArchiveEntry;
use crate::curation::{Curation, FastaSource};
use crate::db::DatabaseError;

pub trait CurationStore: Send + Sync {
    fn curation_by_short_name(&self, short_name: &str) -> Result<Option<Curation>, DatabaseError>;

    fn source_by_name(&self, name: &str) -> Result<Option<FastaSource>, DatabaseError>;

    fn source_by_url(&self, url: &str) -> Result<Option<FastaSource>, DatabaseError>;

    /// Newest archive of `source_url` whose server date is at least
    /// `min_server_date` and whose file still exists.
    fn find_archive(
        &self,
        source_url: &str,
        min_server_date: DateTime<Utc>,
    ) -> Result<Option<ArchiveEntry>, DatabaseError>;

    /// Inserts or updates the curation and its steps, assigning ids to
    /// anything new.
    fn save_curation(&self, curation: &mut Curation) -> Result<(), DatabaseError>;

    fn save_archive(&self, entry: &mut ArchiveEntry) -> Result<(), DatabaseError>;

    fn begin(&self) -> Result<(), DatabaseError>;

    fn commit(&self) -> Result<(), DatabaseError>;

    fn rollback(&self) -> Result<(), DatabaseError>;
}
