use std::sync::Arc;

use crate::archive::SourceArchiveCache;
use crate::error::FastaError;
use crate::executor::RunStatus;
use crate::fasta::{FastaReader, FastaWriter};
use crate::store::CurationStore;

/// Everything a step sees while it runs: the previous step's output (absent
/// for the first step), its own output, and the shared collaborators.
pub struct ExecutionContext {
    input: Option<FastaReader>,
    output: FastaWriter,
    status: RunStatus,
    store: Arc<dyn CurationStore>,
    archive_cache: Arc<SourceArchiveCache>,
}

impl ExecutionContext {
    pub fn new(
        input: Option<FastaReader>,
        output: FastaWriter,
        status: RunStatus,
        store: Arc<dyn CurationStore>,
        archive_cache: Arc<SourceArchiveCache>,
    ) -> Self {
        Self {
            input,
            output,
            status,
            store,
            archive_cache,
        }
    }

    pub fn input(&mut self) -> Option<&mut FastaReader> {
        self.input.as_mut()
    }

    pub fn output(&mut self) -> &mut FastaWriter {
        &mut self.output
    }

    /// Input and output borrowed together.
    pub fn streams(&mut self) -> (Option<&mut FastaReader>, &mut FastaWriter) {
        (self.input.as_mut(), &mut self.output)
    }

    pub fn status(&self) -> &RunStatus {
        &self.status
    }

    pub fn store(&self) -> &dyn CurationStore {
        self.store.as_ref()
    }

    pub fn archive_cache(&self) -> &SourceArchiveCache {
        &self.archive_cache
    }

    /// Writes every input record to the output, starting from the first.
    /// Does nothing for the first step of a run.
    pub fn copy_input_to_output(&mut self) -> Result<(), FastaError> {
        if let Some(input) = self.input.as_mut() {
            input.before_first()?;
            self.output.append_remaining(input)?;
        }
        Ok(())
    }

    /// Flushes the output and releases both files.
    pub fn close(mut self) -> Result<(), FastaError> {
        if let Some(input) = self.input.as_mut() {
            input.close();
        }
        self.output.close()
    }
}
