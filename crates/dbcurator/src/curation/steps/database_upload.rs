use std::path::{Path, PathBuf};

use crate::curation::step::{CurationStep, StepDescriptor, StepState};
use crate::curation::StepValidation;
use crate::error::FastaError;
use crate::executor::ExecutionContext;
use crate::fasta::{FastaReader, FastaWriter};
use crate::store::CurationStore;

/// Appends the records of a FASTA file a user uploaded to the server.
#[derive(Debug, Clone, Default)]
pub struct DatabaseUploadStep {
    path: Option<PathBuf>,
    file_name: Option<String>,
    state: StepState,
}

impl DatabaseUploadStep {
    /// `file_name` is the name the user uploaded the file under.
    pub fn new(path: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
        Self::from_parts(Some(path.into()), Some(file_name.into()))
    }

    pub fn from_parts(path: Option<PathBuf>, file_name: Option<String>) -> Self {
        Self {
            path,
            file_name,
            state: StepState::default(),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn check(&self) -> StepValidation {
        let mut validation = StepValidation::new();
        match &self.path {
            None => validation.add_message("No file has been uploaded."),
            Some(path) if !path.is_file() => validation
                .add_message("The file can no longer be found on the server, please re-upload."),
            Some(_) => {}
        }
        validation
    }
}

fn append_file(path: &Path, output: &mut FastaWriter) -> Result<(), FastaError> {
    let mut upload = FastaReader::open(path)?;
    output.append_remaining(&mut upload)
}

impl CurationStep for DatabaseUploadStep {
    fn pre_validate(&self, _store: &dyn CurationStore) -> StepValidation {
        self.check()
    }

    fn perform(&mut self, ctx: &mut ExecutionContext) -> StepValidation {
        let mut validation = self.check();
        if let (true, Some(path)) = (validation.is_ok(), self.path.as_deref()) {
            if let Err(e) = ctx.copy_input_to_output() {
                validation.add_message_with_cause("Error copying in stream to out stream", e);
            } else if let Err(e) = append_file(path, ctx.output()) {
                validation.add_message_with_cause("Error reading the uploaded file", e);
            }
            validation.set_completion_count(ctx.output().sequence_count() as i64);
        }

        self.state.record(&validation);
        validation
    }

    fn copy(&self) -> Box<dyn CurationStep> {
        Box::new(Self::from_parts(self.path.clone(), self.file_name.clone()))
    }

    fn describe(&self) -> Option<String> {
        let name = self
            .file_name
            .clone()
            .or_else(|| {
                self.path
                    .as_ref()
                    .and_then(|p| p.file_name())
                    .map(|n| n.to_string_lossy().into_owned())
            })
            .unwrap_or_default();
        Some(format!("Upload {}", name))
    }

    fn descriptor(&self) -> Option<StepDescriptor> {
        Some(StepDescriptor::DatabaseUpload {
            path: self.path.clone(),
            file_name: self.file_name.clone(),
        })
    }

    fn state(&self) -> &StepState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut StepState {
        &mut self.state
    }
}
