use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::archive::ArchiveEntry;
use crate::curation::steps::{
    DatabaseInclusionStep, DatabaseUploadStep, HeaderFilterStep, HeaderTransformStep,
    MakeDecoyStep, ManualInclusionStep,
};
use crate::curation::StepValidation;
use crate::executor::ExecutionContext;
use crate::fasta::{ManipulatorKind, MatchMode, TextMode};
use crate::store::CurationStore;

/// Identity and run history every step carries. Never duplicated by `copy`.
#[derive(Debug, Clone, Default)]
pub struct StepState {
    pub id: Option<i64>,
    pub last_run_completion_count: Option<i64>,
    pub last_validation: Option<StepValidation>,
}

impl StepState {
    /// Remembers the report of a `perform` call.
    pub fn record(&mut self, validation: &StepValidation) {
        if validation.completion_count() >= 0 {
            self.last_run_completion_count = Some(validation.completion_count());
        }
        self.last_validation = Some(validation.clone());
    }
}

/// One unit of work in a curation pipeline.
///
/// `perform` reads the previous step's output from the context (if there
/// is one) and writes this step's complete output. A step that only adds
/// records must copy its input through first.
pub trait CurationStep: Send + fmt::Debug {
    /// Side-effect free configuration check. Passing does not guarantee
    /// that `perform` will succeed.
    fn pre_validate(&self, store: &dyn CurationStore) -> StepValidation;

    fn perform(&mut self, ctx: &mut ExecutionContext) -> StepValidation;

    /// New step with the same persistable configuration and no identity.
    fn copy(&self) -> Box<dyn CurationStep>;

    /// Short human-readable summary, if the step has one.
    fn describe(&self) -> Option<String>;

    /// Serializable configuration. `None` marks a step the store cannot persist.
    fn descriptor(&self) -> Option<StepDescriptor>;

    fn state(&self) -> &StepState;

    fn state_mut(&mut self) -> &mut StepState;

    /// Report of the most recent `perform`.
    fn post_validate(&self) -> Option<StepValidation> {
        self.state().last_validation.clone()
    }

    fn id(&self) -> Option<i64> {
        self.state().id
    }

    /// Assigns the persistent id. Ignored once an id is set.
    fn set_id(&mut self, id: i64) {
        let state = self.state_mut();
        if state.id.is_none() {
            state.id = Some(id);
        }
    }

    fn last_run_completion_count(&self) -> Option<i64> {
        self.state().last_run_completion_count
    }

    fn set_last_run_completion_count(&mut self, count: i64) {
        self.state_mut().last_run_completion_count = Some(count);
    }
}

/// Shared, lockable reference to a step. Refresh copies of a curation hold
/// the same handles as the original.
#[derive(Clone, Debug)]
pub struct StepHandle(Arc<Mutex<Box<dyn CurationStep>>>);

impl StepHandle {
    pub fn new<S: CurationStep + 'static>(step: S) -> Self {
        Self::from_boxed(Box::new(step))
    }

    pub fn from_boxed(step: Box<dyn CurationStep>) -> Self {
        Self(Arc::new(Mutex::new(step)))
    }

    pub fn lock(&self) -> MutexGuard<'_, Box<dyn CurationStep>> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Whether both handles point at the same step instance.
    pub fn same_step(&self, other: &StepHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Independent copy of the step's configuration.
    pub fn copy(&self) -> StepHandle {
        StepHandle::from_boxed(self.lock().copy())
    }

    pub fn describe(&self) -> Option<String> {
        self.lock().describe()
    }

    pub fn id(&self) -> Option<i64> {
        self.lock().id()
    }
}

/// Persistable configuration of the built-in step kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepDescriptor {
    DatabaseInclusion {
        url: String,
        #[serde(default)]
        source: Option<ArchiveEntry>,
    },
    ManualInclusion {
        header: String,
        sequence: String,
    },
    DatabaseUpload {
        path: Option<PathBuf>,
        file_name: Option<String>,
    },
    HeaderFilter {
        criteria: String,
        text_mode: TextMode,
        match_mode: MatchMode,
    },
    HeaderTransform {
        description: Option<String>,
        match_pattern: Option<String>,
        substitution_pattern: Option<String>,
    },
    MakeDecoy {
        manipulator: ManipulatorKind,
        overwrite: bool,
    },
}

impl StepDescriptor {
    pub fn kind(&self) -> &'static str {
        match self {
            StepDescriptor::DatabaseInclusion { .. } => "database_inclusion",
            StepDescriptor::ManualInclusion { .. } => "manual_inclusion",
            StepDescriptor::DatabaseUpload { .. } => "database_upload",
            StepDescriptor::HeaderFilter { .. } => "header_filter",
            StepDescriptor::HeaderTransform { .. } => "header_transform",
            StepDescriptor::MakeDecoy { .. } => "make_decoy",
        }
    }

    /// Builds a fresh step (no id, no history) from this configuration.
    pub fn into_step(self) -> Box<dyn CurationStep> {
        match self {
            StepDescriptor::DatabaseInclusion { url, source } => {
                let mut step = DatabaseInclusionStep::new(url);
                step.set_source(source);
                Box::new(step)
            }
            StepDescriptor::ManualInclusion { header, sequence } => {
                Box::new(ManualInclusionStep::new(header, sequence))
            }
            StepDescriptor::DatabaseUpload { path, file_name } => {
                Box::new(DatabaseUploadStep::from_parts(path, file_name))
            }
            StepDescriptor::HeaderFilter {
                criteria,
                text_mode,
                match_mode,
            } => Box::new(HeaderFilterStep::new(criteria, text_mode, match_mode)),
            StepDescriptor::HeaderTransform {
                description,
                match_pattern,
                substitution_pattern,
            } => Box::new(HeaderTransformStep::from_parts(
                description,
                match_pattern,
                substitution_pattern,
            )),
            StepDescriptor::MakeDecoy {
                manipulator,
                overwrite,
            } => Box::new(MakeDecoyStep::new(manipulator, overwrite)),
        }
    }
}
