use crate::archive::{ArchiveEntry, SourceLocator, BUNDLED_PREFIX};
use crate::curation::source::CompiledTransform;
use crate::curation::step::{CurationStep, StepDescriptor, StepState};
use crate::curation::StepValidation;
use crate::error::FastaError;
use crate::executor::{ExecutionContext, RunStatus};
use crate::fasta::{FastaReader, FastaWriter};
use crate::store::CurationStore;

/// Appends every record of a source database, fetched through the archive
/// cache on first use. Records get the header transform of the matching
/// registered source, if it has one.
#[derive(Debug, Clone, Default)]
pub struct DatabaseInclusionStep {
    url: String,
    source: Option<ArchiveEntry>,
    state: StepState,
}

impl DatabaseInclusionStep {
    /// `url` is a network URL, a bundled `classpath:` locator, or the name
    /// of a registered source.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            source: None,
            state: StepState::default(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Archive this step reads from. `None` until the first fetch.
    pub fn source(&self) -> Option<&ArchiveEntry> {
        self.source.as_ref()
    }

    pub fn set_source(&mut self, source: Option<ArchiveEntry>) {
        self.source = source;
    }

    fn header_transform(
        &self,
        store: &dyn CurationStore,
    ) -> Result<Option<CompiledTransform>, StepValidation> {
        let mut validation = StepValidation::new();
        let registered = match store.source_by_url(&self.url) {
            Ok(Some(source)) => Some(source),
            Ok(None) => match store.source_by_name(&self.url) {
                Ok(source) => source,
                Err(e) => {
                    validation.add_message_with_cause("Could not look up the source database", e);
                    return Err(validation);
                }
            },
            Err(e) => {
                validation.add_message_with_cause("Could not look up the source database", e);
                return Err(validation);
            }
        };

        match registered.and_then(|source| source.transform) {
            None => Ok(None),
            Some(transform) => match transform.compile() {
                Ok(compiled) => Ok(Some(compiled)),
                Err(e) => {
                    validation.add_message_with_cause(
                        format!("Invalid header transform '{}'", transform.name),
                        e,
                    );
                    Err(validation)
                }
            },
        }
    }
}

fn append_archive(
    archive: &ArchiveEntry,
    output: &mut FastaWriter,
    transform: Option<&CompiledTransform>,
    status: &RunStatus,
) -> Result<(), FastaError> {
    let mut reader = FastaReader::open(&archive.archive_path)?;
    let mut processed = 0usize;
    while reader.next_sequence()? {
        match transform {
            Some(transform) => {
                let header = transform.apply(reader.header());
                output.append_sequence(&header, reader.sequence())?;
            }
            None => output.append_sequence(reader.header(), reader.sequence())?,
        }
        processed += 1;
        if processed % 1000 == 0 {
            status.set_current_step_progress(reader.percent_read());
        }
    }
    Ok(())
}

impl CurationStep for DatabaseInclusionStep {
    fn pre_validate(&self, store: &dyn CurationStore) -> StepValidation {
        let mut validation = StepValidation::new();
        let url = self.url.trim();
        if url.is_empty() {
            validation.add_message("No source database has been selected.");
            return validation;
        }
        if self.source.is_some() || url.starts_with(BUNDLED_PREFIX) {
            return validation;
        }

        match store.source_by_name(url) {
            Ok(Some(_)) => {}
            Ok(None) => {
                if let Err(e) = SourceLocator::parse(url) {
                    validation.add_message_with_cause(format!("Invalid source location '{}'", url), e);
                }
            }
            Err(e) => validation.add_message_with_cause("Could not look up the source database", e),
        }
        validation
    }

    fn perform(&mut self, ctx: &mut ExecutionContext) -> StepValidation {
        let mut validation = StepValidation::new();

        if let Err(e) = ctx.copy_input_to_output() {
            validation.add_message_with_cause("Error copying in stream to out stream", e);
            self.state.record(&validation);
            return validation;
        }

        if self.source.is_none() {
            match ctx.archive_cache().fetch(&self.url, ctx.store(), ctx.status()) {
                Ok(entry) => {
                    ctx.status()
                        .add_message("We have completed getting an archive.");
                    self.source = Some(entry);
                }
                Err(e) => {
                    validation.add_message_with_cause(format!("Download error: {}", e), e);
                    self.state.record(&validation);
                    return validation;
                }
            }
        }

        let transform = match self.header_transform(ctx.store()) {
            Ok(transform) => transform,
            Err(failed) => {
                self.state.record(&failed);
                return failed;
            }
        };

        if let Some(archive) = &self.source {
            let status = ctx.status().clone();
            if let Err(e) = append_archive(archive, ctx.output(), transform.as_ref(), &status) {
                validation.add_message_with_cause("Error creating an input stream from the archive", e);
            }
        }
        validation.set_completion_count(ctx.output().sequence_count() as i64);

        self.state.record(&validation);
        validation
    }

    fn copy(&self) -> Box<dyn CurationStep> {
        let mut copy = Self::new(self.url.clone());
        copy.source = self.source.clone().map(|archive| ArchiveEntry { id: None, ..archive });
        Box::new(copy)
    }

    fn describe(&self) -> Option<String> {
        let name = self
            .url
            .rsplit('/')
            .find(|segment| !segment.is_empty())
            .unwrap_or(&self.url);
        let name = name.strip_suffix(".gz").unwrap_or(name);
        let name = name.strip_suffix(".fasta").unwrap_or(name);
        let name = name.strip_prefix(BUNDLED_PREFIX).unwrap_or(name);
        Some(format!("Database {}", name))
    }

    fn descriptor(&self) -> Option<StepDescriptor> {
        Some(StepDescriptor::DatabaseInclusion {
            url: self.url.clone(),
            source: self.source.clone(),
        })
    }

    fn state(&self) -> &StepState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut StepState {
        &mut self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe() {
        let step = DatabaseInclusionStep::new("ftp://ftp.example.org/pub/uniprot_sprot.fasta.gz");
        assert_eq!(step.describe().as_deref(), Some("Database uniprot_sprot"));

        let bundled = DatabaseInclusionStep::new("classpath:/testdbs/ShortTest.fasta.gz");
        assert_eq!(bundled.describe().as_deref(), Some("Database ShortTest"));

        let named = DatabaseInclusionStep::new("Sprot");
        assert_eq!(named.describe().as_deref(), Some("Database Sprot"));
    }

    #[test]
    fn test_copy_keeps_source_archive() {
        let mut step = DatabaseInclusionStep::new("http://example.org/db.fasta");
        let mut archive = ArchiveEntry::new(
            "http://example.org/db.fasta",
            "/archive/db_20260101-000000.fasta.gz",
            chrono::Utc::now(),
            chrono::Utc::now(),
        );
        archive.id = Some(9);
        step.set_source(Some(archive.clone()));
        step.set_id(4);

        let copy = step.copy();
        assert_eq!(copy.id(), None);
        let Some(StepDescriptor::DatabaseInclusion { url, source }) = copy.descriptor() else {
            panic!("expected a database inclusion descriptor");
        };
        assert_eq!(url, "http://example.org/db.fasta");
        let source = source.expect("archive kept");
        assert_eq!(source.id, None);
        assert_eq!(source.archive_path, archive.archive_path);
        assert_eq!(source.server_date, archive.server_date);
    }
}
