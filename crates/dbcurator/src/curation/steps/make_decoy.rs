use std::sync::LazyLock;

use regex::Regex;

use crate::curation::step::{CurationStep, StepDescriptor, StepState};
use crate::curation::steps::report_progress;
use crate::curation::StepValidation;
use crate::error::FastaError;
use crate::executor::{ExecutionContext, RunStatus};
use crate::fasta::{FastaReader, FastaWriter, ManipulatorKind, SequenceManipulator};
use crate::store::CurationStore;

static RE_HEADER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^>\s*(\S+\s*)(.*)$").unwrap());

/// Builds decoy records by reversing or scrambling every input sequence.
///
/// In overwrite mode only the decoys are written. Otherwise the targets are
/// copied first and the decoys appended after them.
#[derive(Debug, Clone)]
pub struct MakeDecoyStep {
    manipulator: ManipulatorKind,
    overwrite: bool,
    state: StepState,
}

impl Default for MakeDecoyStep {
    fn default() -> Self {
        Self::new(ManipulatorKind::Reversal, true)
    }
}

impl MakeDecoyStep {
    pub fn new(manipulator: ManipulatorKind, overwrite: bool) -> Self {
        Self {
            manipulator,
            overwrite,
            state: StepState::default(),
        }
    }

    pub fn is_overwrite(&self) -> bool {
        self.overwrite
    }
}

/// `>Reversed_sp|P1|X (Reversed) rest` from `>sp|P1|X rest`. Headers
/// without an accession after `>` are returned unchanged.
pub fn decoy_header(description: &str, header: &str) -> String {
    match RE_HEADER.captures(header) {
        Some(caps) => {
            let accession = caps.get(1).map_or("", |m| m.as_str());
            let rest = caps.get(2).map_or("", |m| m.as_str());
            let mut decoy = format!(">{}_{}", description, accession);
            if !rest.is_empty() {
                decoy.push_str(&format!("({}) {}", description, rest));
            }
            decoy
        }
        None => header.to_string(),
    }
}

struct DecoyPass<'a> {
    status: &'a RunStatus,
    expected: i64,
    /// Progress share of each pass.
    scale: f32,
}

fn copy_targets(
    input: &mut FastaReader,
    output: &mut FastaWriter,
    pass: &DecoyPass<'_>,
) -> Result<(), FastaError> {
    input.before_first()?;
    let mut processed = 0usize;
    while input.next_sequence()? {
        output.append_sequence(input.header(), input.sequence())?;
        processed += 1;
        report_progress(pass.status, processed, pass.expected, pass.scale, 0.0);
    }
    Ok(())
}

fn write_decoys(
    input: &mut FastaReader,
    output: &mut FastaWriter,
    manipulator: &mut dyn SequenceManipulator,
    pass: &DecoyPass<'_>,
    offset: f32,
) -> Result<(), FastaError> {
    input.before_first()?;
    let description = manipulator.description();
    let mut processed = 0usize;
    while input.next_sequence()? {
        let header = decoy_header(description, input.header());
        let sequence = manipulator.manipulate(input.sequence());
        output.append_sequence(&header, &sequence)?;
        processed += 1;
        report_progress(pass.status, processed, pass.expected, pass.scale, offset);
    }
    Ok(())
}

impl CurationStep for MakeDecoyStep {
    fn pre_validate(&self, _store: &dyn CurationStore) -> StepValidation {
        StepValidation::new()
    }

    fn perform(&mut self, ctx: &mut ExecutionContext) -> StepValidation {
        let mut validation = StepValidation::new();
        let status = ctx.status().clone();
        let pass = DecoyPass {
            status: &status,
            expected: status.last_step_sequence_count(),
            scale: if self.overwrite { 100.0 } else { 50.0 },
        };
        let mut manipulator = self.manipulator.build();

        let (input, output) = ctx.streams();
        match input {
            None => validation.add_message("There are no sequences to make decoys from."),
            Some(input) => {
                let result = if self.overwrite {
                    write_decoys(input, output, manipulator.as_mut(), &pass, 0.0)
                } else {
                    copy_targets(input, output, &pass)
                        .and_then(|_| write_decoys(input, output, manipulator.as_mut(), &pass, 50.0))
                };
                if let Err(e) = result {
                    validation.add_message_with_cause("Error creating decoy sequences", e);
                }
                validation.set_completion_count(output.sequence_count() as i64);
            }
        }

        self.state.record(&validation);
        validation
    }

    fn copy(&self) -> Box<dyn CurationStep> {
        Box::new(Self::new(self.manipulator, self.overwrite))
    }

    fn describe(&self) -> Option<String> {
        Some(self.manipulator.description().to_string())
    }

    fn descriptor(&self) -> Option<StepDescriptor> {
        Some(StepDescriptor::MakeDecoy {
            manipulator: self.manipulator,
            overwrite: self.overwrite,
        })
    }

    fn state(&self) -> &StepState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut StepState {
        &mut self.state
    }
}
