//! Archive repository: downloaded copies in the `source_archives` table.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use rusqlite::{params, Row};

use super::{format_timestamp, parse_timestamp, Database, DatabaseError};
use crate::archive::ArchiveEntry;

/// A raw archive row. Timestamps are stored as RFC 3339 text.
#[derive(Debug, Clone)]
struct ArchiveRow {
    id: i64,
    source_url: String,
    archive_path: String,
    server_date: String,
    download_date: String,
}

impl ArchiveRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            source_url: row.get("source_url")?,
            archive_path: row.get("archive_path")?,
            server_date: row.get("server_date")?,
            download_date: row.get("download_date")?,
        })
    }

    fn into_entry(self) -> Result<ArchiveEntry, DatabaseError> {
        Ok(ArchiveEntry {
            id: Some(self.id),
            source_url: self.source_url,
            archive_path: PathBuf::from(self.archive_path),
            server_date: parse_timestamp("server_date", &self.server_date)?,
            download_date: parse_timestamp("download_date", &self.download_date)?,
        })
    }
}

/// Inserts the entry, or updates it when it already has an id. Assigns the
/// id of a newly inserted row.
pub fn save(db: &Database, entry: &mut ArchiveEntry) -> Result<(), DatabaseError> {
    let archive_path = entry.archive_path.to_string_lossy().into_owned();
    let server_date = format_timestamp(entry.server_date);
    let download_date = format_timestamp(entry.download_date);

    let id = db.with_conn(|conn| match entry.id {
        Some(id) => {
            conn.execute(
                "UPDATE source_archives SET source_url=?2, archive_path=?3, server_date=?4,
                 download_date=?5 WHERE id=?1",
                params![id, entry.source_url, archive_path, server_date, download_date],
            )?;
            Ok(id)
        }
        None => {
            conn.execute(
                "INSERT INTO source_archives (source_url, archive_path, server_date, download_date)
                 VALUES (?1, ?2, ?3, ?4)",
                params![entry.source_url, archive_path, server_date, download_date],
            )?;
            Ok(conn.last_insert_rowid())
        }
    })?;
    entry.id = Some(id);
    Ok(())
}

/// Newest entry for `source_url` with a server date of at least
/// `min_server_date` whose file is still on disk.
pub fn find_current(
    db: &Database,
    source_url: &str,
    min_server_date: DateTime<Utc>,
) -> Result<Option<ArchiveEntry>, DatabaseError> {
    let rows = db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM source_archives
             WHERE source_url = ?1 AND server_date >= ?2
             ORDER BY server_date DESC, download_date DESC",
        )?;
        let rows = stmt
            .query_map(
                params![source_url, format_timestamp(min_server_date)],
                ArchiveRow::from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })?;

    for row in rows {
        let entry = row.into_entry()?;
        if entry.archive_path.is_file() {
            return Ok(Some(entry));
        }
        log::debug!(
            "Archive {} of {} is gone from disk",
            entry.archive_path.display(),
            entry.source_url
        );
    }
    Ok(None)
}
