use crate::curation::step::{CurationStep, StepDescriptor, StepState};
use crate::curation::StepValidation;
use crate::executor::ExecutionContext;
use crate::store::CurationStore;

/// Appends one user-entered sequence to the running database.
#[derive(Debug, Clone, Default)]
pub struct ManualInclusionStep {
    header: String,
    sequence: String,
    state: StepState,
}

impl ManualInclusionStep {
    pub fn new(header: impl Into<String>, sequence: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            sequence: sequence.into(),
            state: StepState::default(),
        }
    }

    pub fn header(&self) -> &str {
        &self.header
    }

    pub fn sequence(&self) -> &str {
        &self.sequence
    }

    fn check(&self) -> StepValidation {
        let mut validation = StepValidation::new();
        if self.sequence.trim().is_empty() {
            validation.add_message("No sequence has been entered.");
        }
        if self.header.trim().is_empty() {
            validation.add_message("No header has been entered.");
        }
        validation
    }
}

impl CurationStep for ManualInclusionStep {
    fn pre_validate(&self, _store: &dyn CurationStore) -> StepValidation {
        self.check()
    }

    fn perform(&mut self, ctx: &mut ExecutionContext) -> StepValidation {
        let mut validation = self.check();
        if validation.is_ok() {
            if let Err(e) = ctx.copy_input_to_output() {
                validation.add_message_with_cause("Error copying in stream to out stream", e);
            } else if let Err(e) = ctx
                .output()
                .append_sequence(self.header.trim(), self.sequence.trim())
            {
                validation.add_message_with_cause("Error appending the sequence", e);
            }
            validation.set_completion_count(ctx.output().sequence_count() as i64);
        }

        self.state.record(&validation);
        validation
    }

    fn copy(&self) -> Box<dyn CurationStep> {
        Box::new(Self::new(self.header.clone(), self.sequence.clone()))
    }

    fn describe(&self) -> Option<String> {
        Some("user sequence".to_string())
    }

    fn descriptor(&self) -> Option<StepDescriptor> {
        Some(StepDescriptor::ManualInclusion {
            header: self.header.clone(),
            sequence: self.sequence.clone(),
        })
    }

    fn state(&self) -> &StepState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut StepState {
        &mut self.state
    }
}
