//! Curation repository: rows of the `curations`, `steps` and
//! `curation_steps` tables.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{Database, DatabaseError};

/// A raw curation row. Timestamps are stored as RFC 3339 text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CurationRow {
    pub id: Option<i64>,
    pub short_name: String,
    pub title: Option<String>,
    pub notes: Option<String>,
    pub owner_email: Option<String>,
    pub first_run_date: Option<String>,
    pub run_date: Option<String>,
    pub deployment_date: Option<String>,
    pub decoy_regex: Option<String>,
    pub artifact_file: Option<String>,
}

impl CurationRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            short_name: row.get("short_name")?,
            title: row.get("title")?,
            notes: row.get("notes")?,
            owner_email: row.get("owner_email")?,
            first_run_date: row.get("first_run_date")?,
            run_date: row.get("run_date")?,
            deployment_date: row.get("deployment_date")?,
            decoy_regex: row.get("decoy_regex")?,
            artifact_file: row.get("artifact_file")?,
        })
    }
}

/// A persisted step: its kind, JSON configuration and run history.
#[derive(Debug, Clone, PartialEq)]
pub struct StepRow {
    pub id: Option<i64>,
    pub kind: String,
    pub config: String,
    pub last_run_completion_count: Option<i64>,
}

impl StepRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            kind: row.get("kind")?,
            config: row.get("config")?,
            last_run_completion_count: row.get("last_run_completion_count")?,
        })
    }
}

/// Inserts a new curation row and returns its id. `row.id` is ignored.
pub fn insert(db: &Database, row: &CurationRow) -> Result<i64, DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO curations (short_name, title, notes, owner_email, first_run_date,
             run_date, deployment_date, decoy_regex, artifact_file)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                row.short_name,
                row.title,
                row.notes,
                row.owner_email,
                row.first_run_date,
                row.run_date,
                row.deployment_date,
                row.decoy_regex,
                row.artifact_file,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    })
}

/// Overwrites every column of the row with `row.id`. Returns whether a row
/// was updated.
pub fn update(db: &Database, row: &CurationRow) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE curations SET short_name=?2, title=?3, notes=?4, owner_email=?5,
             first_run_date=?6, run_date=?7, deployment_date=?8, decoy_regex=?9,
             artifact_file=?10
             WHERE id=?1",
            params![
                row.id,
                row.short_name,
                row.title,
                row.notes,
                row.owner_email,
                row.first_run_date,
                row.run_date,
                row.deployment_date,
                row.decoy_regex,
                row.artifact_file,
            ],
        )?;
        Ok(changed > 0)
    })
}

pub fn find_by_id(db: &Database, id: i64) -> Result<Option<CurationRow>, DatabaseError> {
    db.with_conn(|conn| {
        conn.query_row(
            "SELECT * FROM curations WHERE id = ?1",
            params![id],
            CurationRow::from_row,
        )
        .optional()
        .map_err(DatabaseError::from)
    })
}

pub fn find_by_short_name(
    db: &Database,
    short_name: &str,
) -> Result<Option<CurationRow>, DatabaseError> {
    db.with_conn(|conn| {
        conn.query_row(
            "SELECT * FROM curations WHERE short_name = ?1",
            params![short_name],
            CurationRow::from_row,
        )
        .optional()
        .map_err(DatabaseError::from)
    })
}

/// Id of the curation using `short_name`, if any.
pub fn id_for_short_name(db: &Database, short_name: &str) -> Result<Option<i64>, DatabaseError> {
    db.with_conn(|conn| {
        conn.query_row(
            "SELECT id FROM curations WHERE short_name = ?1",
            params![short_name],
            |r| r.get(0),
        )
        .optional()
        .map_err(DatabaseError::from)
    })
}

/// Inserts a new step row and returns its id. `row.id` is ignored.
pub fn insert_step(db: &Database, row: &StepRow) -> Result<i64, DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO steps (kind, config, last_run_completion_count) VALUES (?1, ?2, ?3)",
            params![row.kind, row.config, row.last_run_completion_count],
        )?;
        Ok(conn.last_insert_rowid())
    })
}

/// Updates the step with `row.id`. Returns whether a row was updated.
pub fn update_step(db: &Database, row: &StepRow) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE steps SET kind=?2, config=?3, last_run_completion_count=?4 WHERE id=?1",
            params![row.id, row.kind, row.config, row.last_run_completion_count],
        )?;
        Ok(changed > 0)
    })
}

/// The steps of a curation, in pipeline order.
pub fn find_steps(db: &Database, curation_id: i64) -> Result<Vec<StepRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT s.* FROM steps s
             JOIN curation_steps cs ON cs.step_id = s.id
             WHERE cs.curation_id = ?1
             ORDER BY cs.position",
        )?;
        let rows = stmt
            .query_map(params![curation_id], StepRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Replaces the pipeline of a curation with `step_ids`, in order.
pub fn replace_step_links(
    db: &Database,
    curation_id: i64,
    step_ids: &[i64],
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "DELETE FROM curation_steps WHERE curation_id = ?1",
            params![curation_id],
        )?;
        let mut stmt = conn.prepare(
            "INSERT INTO curation_steps (curation_id, position, step_id) VALUES (?1, ?2, ?3)",
        )?;
        for (position, step_id) in step_ids.iter().enumerate() {
            stmt.execute(params![curation_id, position as i64, step_id])?;
        }
        Ok(())
    })
}

/// Runs `f` inside a savepoint, rolling back to it when `f` fails.
///
/// Savepoints nest inside an open transaction, so this is safe to call
/// while a run holds `BEGIN`.
pub fn in_savepoint<F, T>(db: &Database, name: &str, f: F) -> Result<T, DatabaseError>
where
    F: FnOnce() -> Result<T, DatabaseError>,
{
    db.with_conn(|conn| execute_savepoint(conn, "SAVEPOINT", name))?;
    match f() {
        Ok(value) => {
            db.with_conn(|conn| execute_savepoint(conn, "RELEASE", name))?;
            Ok(value)
        }
        Err(e) => {
            let undo = db.with_conn(|conn| {
                execute_savepoint(conn, "ROLLBACK TO", name)?;
                execute_savepoint(conn, "RELEASE", name)
            });
            if let Err(undo_err) = undo {
                log::warn!("Failed to roll back savepoint {}: {}", name, undo_err);
            }
            Err(e)
        }
    }
}

fn execute_savepoint(conn: &Connection, verb: &str, name: &str) -> Result<(), DatabaseError> {
    conn.execute_batch(&format!("{} {}", verb, name))?;
    Ok(())
}
