//! [`CurationStore`] over the SQLite [`Database`].

use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::archive::ArchiveEntry;
use crate::curation::{Curation, FastaSource, StepDescriptor, StepHandle};
use crate::db::curation_repo::{self, CurationRow, StepRow};
use crate::db::{
    archive_repo, format_timestamp, parse_optional_timestamp, source_repo, Database,
    DatabaseError,
};
use crate::store::CurationStore;

/// Store backed by one shared SQLite connection. A transaction opened with
/// [`CurationStore::begin`] covers every call until commit or rollback.
#[derive(Debug, Clone)]
pub struct SqliteCurationStore {
    db: Database,
}

impl SqliteCurationStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Registers a named source and assigns its id.
    pub fn add_source(&self, source: &mut FastaSource) -> Result<(), DatabaseError> {
        let id = source_repo::insert(&self.db, source)?;
        source.id = Some(id);
        log::debug!("Registered source {} ({})", source.name, source.url);
        Ok(())
    }

    pub fn common_sources(&self) -> Result<Vec<FastaSource>, DatabaseError> {
        source_repo::list_common(&self.db)
    }

    fn curation_row(curation: &Curation) -> CurationRow {
        CurationRow {
            id: curation.id(),
            short_name: curation.short_name().to_string(),
            title: curation.title().map(str::to_string),
            notes: curation.notes().map(str::to_string),
            owner_email: curation.owner_email().map(str::to_string),
            first_run_date: curation.first_run_date().map(format_timestamp),
            run_date: curation.run_date().map(format_timestamp),
            deployment_date: curation.deployment_date().map(format_timestamp),
            decoy_regex: curation.stored_decoy_regex().map(str::to_string),
            artifact_file: curation
                .artifact_file()
                .map(|p| p.to_string_lossy().into_owned()),
        }
    }

    fn curation_from_row(&self, row: CurationRow) -> Result<Curation, DatabaseError> {
        let mut curation = Curation::new(row.short_name);
        if let Some(id) = row.id {
            curation.set_id(id);
        }
        curation.set_title(row.title);
        curation.set_notes(row.notes);
        curation.set_owner_email(row.owner_email);
        curation.set_decoy_regex(row.decoy_regex);
        curation.set_artifact_file(row.artifact_file.map(PathBuf::from));
        curation.set_deployment_date(parse_optional_timestamp(
            "deployment_date",
            row.deployment_date,
        )?);
        curation.restore_run_dates(
            parse_optional_timestamp("first_run_date", row.first_run_date)?,
            parse_optional_timestamp("run_date", row.run_date)?,
        );

        if let Some(id) = row.id {
            for step_row in curation_repo::find_steps(&self.db, id)? {
                curation.add_step(Self::step_from_row(step_row)?, -1);
            }
        }
        Ok(curation)
    }

    fn step_from_row(row: StepRow) -> Result<StepHandle, DatabaseError> {
        let descriptor: StepDescriptor = serde_json::from_str(&row.config)?;
        let mut step = descriptor.into_step();
        if let Some(id) = row.id {
            step.set_id(id);
        }
        if let Some(count) = row.last_run_completion_count {
            step.set_last_run_completion_count(count);
        }
        Ok(StepHandle::from_boxed(step))
    }

    /// Writes every step, inserting new ones, and returns their ids in
    /// pipeline order.
    fn save_steps(&self, curation: &Curation) -> Result<Vec<i64>, DatabaseError> {
        let mut ids = Vec::with_capacity(curation.step_count());
        for (position, handle) in curation.steps().iter().enumerate() {
            let mut step = handle.lock();
            let descriptor = step.descriptor().ok_or_else(|| DatabaseError::NotPersistable {
                short_name: curation.short_name().to_string(),
                position,
            })?;
            let row = StepRow {
                id: step.id(),
                kind: descriptor.kind().to_string(),
                config: serde_json::to_string(&descriptor)?,
                last_run_completion_count: step.last_run_completion_count(),
            };

            let id = match row.id {
                Some(id) if curation_repo::update_step(&self.db, &row)? => id,
                _ => curation_repo::insert_step(&self.db, &row)?,
            };
            step.state_mut().id = Some(id);
            ids.push(id);
        }
        Ok(ids)
    }
}

impl CurationStore for SqliteCurationStore {
    fn curation_by_short_name(&self, short_name: &str) -> Result<Option<Curation>, DatabaseError> {
        curation_repo::find_by_short_name(&self.db, short_name)?
            .map(|row| self.curation_from_row(row))
            .transpose()
    }

    fn source_by_name(&self, name: &str) -> Result<Option<FastaSource>, DatabaseError> {
        source_repo::find_by_name(&self.db, name)
    }

    fn source_by_url(&self, url: &str) -> Result<Option<FastaSource>, DatabaseError> {
        source_repo::find_by_url(&self.db, url)
    }

    fn find_archive(
        &self,
        source_url: &str,
        min_server_date: DateTime<Utc>,
    ) -> Result<Option<ArchiveEntry>, DatabaseError> {
        archive_repo::find_current(&self.db, source_url, min_server_date)
    }

    fn save_curation(&self, curation: &mut Curation) -> Result<(), DatabaseError> {
        curation_repo::in_savepoint(&self.db, "save_curation", || {
            if let Some(existing) = curation_repo::id_for_short_name(&self.db, curation.short_name())? {
                if curation.id() != Some(existing) {
                    return Err(DatabaseError::DuplicateShortName(
                        curation.short_name().to_string(),
                    ));
                }
            }

            let step_ids = self.save_steps(curation)?;
            let row = Self::curation_row(curation);
            let id = match row.id {
                Some(id) if curation_repo::update(&self.db, &row)? => id,
                _ => curation_repo::insert(&self.db, &row)?,
            };
            curation_repo::replace_step_links(&self.db, id, &step_ids)?;
            curation.set_id(id);
            Ok(())
        })?;
        log::debug!(
            "Saved curation {} with {} steps",
            curation.short_name(),
            curation.step_count()
        );
        Ok(())
    }

    fn save_archive(&self, entry: &mut ArchiveEntry) -> Result<(), DatabaseError> {
        archive_repo::save(&self.db, entry)
    }

    fn begin(&self) -> Result<(), DatabaseError> {
        self.db.with_conn(|conn| Ok(conn.execute_batch("BEGIN")?))
    }

    fn commit(&self) -> Result<(), DatabaseError> {
        self.db.with_conn(|conn| Ok(conn.execute_batch("COMMIT")?))
    }

    fn rollback(&self) -> Result<(), DatabaseError> {
        self.db.with_conn(|conn| Ok(conn.execute_batch("ROLLBACK")?))
    }
}
