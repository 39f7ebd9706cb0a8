pub mod model;
pub mod source;
pub mod step;
pub mod steps;
pub mod validation;

pub use model::{translate_step_index, Curation, DEFAULT_DECOY_REGEX};
pub use source::{FastaSource, HeaderTransform};
pub use step::{CurationStep, StepDescriptor, StepHandle, StepState};
pub use steps::{
    DatabaseInclusionStep, DatabaseUploadStep, HeaderFilterStep, HeaderTransformStep,
    MakeDecoyStep, ManualInclusionStep,
};
pub use validation::StepValidation;
