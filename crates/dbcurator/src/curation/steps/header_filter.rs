use crate::curation::step::{CurationStep, StepDescriptor, StepState};
use crate::curation::steps::report_progress;
use crate::curation::StepValidation;
use crate::error::FastaError;
use crate::executor::{ExecutionContext, RunStatus};
use crate::fasta::{build_filter, FastaReader, FastaWriter, MatchMode, TextFilter, TextMode};
use crate::store::CurationStore;

/// Keeps only the records whose header passes a text filter.
#[derive(Debug, Clone, Default)]
pub struct HeaderFilterStep {
    criteria: String,
    text_mode: TextMode,
    match_mode: MatchMode,
    state: StepState,
}

impl HeaderFilterStep {
    pub fn new(criteria: impl Into<String>, text_mode: TextMode, match_mode: MatchMode) -> Self {
        Self {
            criteria: criteria.into(),
            text_mode,
            match_mode,
            state: StepState::default(),
        }
    }

    fn filter(&self) -> Box<dyn TextFilter> {
        build_filter(&self.criteria, self.text_mode, self.match_mode)
    }
}

fn filter_records(
    input: &mut FastaReader,
    output: &mut FastaWriter,
    filter: &dyn TextFilter,
    status: &RunStatus,
    expected: i64,
) -> Result<(), FastaError> {
    input.before_first()?;
    let mut processed = 0usize;
    while input.next_sequence()? {
        if filter.matches(input.header()) {
            output.append_sequence(input.header(), input.sequence())?;
        }
        processed += 1;
        report_progress(status, processed, expected, 100.0, 0.0);
    }
    Ok(())
}

impl CurationStep for HeaderFilterStep {
    fn pre_validate(&self, _store: &dyn CurationStore) -> StepValidation {
        let mut validation = StepValidation::new();
        if let Err(message) = self.filter().test_criteria() {
            validation.add_message(message);
        }
        validation
    }

    fn perform(&mut self, ctx: &mut ExecutionContext) -> StepValidation {
        let mut validation = StepValidation::new();
        let filter = self.filter();
        if let Err(message) = filter.test_criteria() {
            validation.add_message(message);
            self.state.record(&validation);
            return validation;
        }

        let expected = ctx.status().last_step_sequence_count();
        let status = ctx.status().clone();
        let (input, output) = ctx.streams();
        match input {
            None => validation.add_message("There are no sequences to filter."),
            Some(input) => {
                if let Err(e) = filter_records(input, output, filter.as_ref(), &status, expected) {
                    validation.add_message_with_cause("Error filtering sequences", e);
                }
                validation.set_completion_count(output.sequence_count() as i64);
            }
        }

        self.state.record(&validation);
        validation
    }

    fn copy(&self) -> Box<dyn CurationStep> {
        Box::new(Self::new(self.criteria.clone(), self.text_mode, self.match_mode))
    }

    fn describe(&self) -> Option<String> {
        Some(format!(
            "filtered {} \"{}\"",
            self.match_mode.as_str(),
            self.criteria
        ))
    }

    fn descriptor(&self) -> Option<StepDescriptor> {
        Some(StepDescriptor::HeaderFilter {
            criteria: self.criteria.clone(),
            text_mode: self.text_mode,
            match_mode: self.match_mode,
        })
    }

    fn state(&self) -> &StepState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut StepState {
        &mut self.state
    }
}
