//! Builders and test-only steps for creating curations programmatically.

#![allow(dead_code)]

use std::path::Path;

use crossbeam_channel::{Receiver, Sender};

use dbcurator::curation::{
    Curation, CurationStep, DatabaseInclusionStep, DatabaseUploadStep, HeaderFilterStep,
    HeaderTransformStep, MakeDecoyStep, ManualInclusionStep, StepDescriptor, StepHandle, StepState,
    StepValidation,
};
use dbcurator::executor::ExecutionContext;
use dbcurator::fasta::{ManipulatorKind, MatchMode, TextMode};
use dbcurator::store::CurationStore;

/// Header of the marker record appended by step `n`.
pub fn marker_header(n: usize) -> String {
    format!(">marker_{}", n)
}

/// A persistable step that appends one marker record.
pub fn marker(n: usize) -> StepHandle {
    StepHandle::new(ManualInclusionStep::new(marker_header(n), "MARKER"))
}

/// Builder for creating `Curation` instances.
pub struct CurationBuilder {
    curation: Curation,
}

impl CurationBuilder {
    pub fn new(short_name: &str) -> Self {
        Self {
            curation: Curation::new(short_name),
        }
    }

    pub fn title(mut self, title: &str) -> Self {
        self.curation.set_title(Some(title.to_string()));
        self
    }

    pub fn decoy_regex(mut self, regex: &str) -> Self {
        self.curation.set_decoy_regex(Some(regex.to_string()));
        self
    }

    /// Appends a step.
    pub fn step(mut self, step: StepHandle) -> Self {
        self.curation.add_step(step, -1);
        self
    }

    /// Appends `count` marker steps numbered from 1.
    pub fn markers(mut self, count: usize) -> Self {
        for n in 1..=count {
            self.curation.add_step(marker(n), -1);
        }
        self
    }

    pub fn manual(self, header: &str, sequence: &str) -> Self {
        self.step(StepHandle::new(ManualInclusionStep::new(header, sequence)))
    }

    pub fn upload(self, path: &Path) -> Self {
        let name = path.file_name().map(|n| n.to_string_lossy().into_owned());
        self.step(StepHandle::new(DatabaseUploadStep::from_parts(
            Some(path.to_path_buf()),
            name,
        )))
    }

    pub fn include(self, locator: &str) -> Self {
        self.step(StepHandle::new(DatabaseInclusionStep::new(locator)))
    }

    pub fn filter(self, criteria: &str, text_mode: TextMode, match_mode: MatchMode) -> Self {
        self.step(StepHandle::new(HeaderFilterStep::new(
            criteria, text_mode, match_mode,
        )))
    }

    pub fn transform(self, description: &str, pattern: &str, substitution: &str) -> Self {
        self.step(StepHandle::new(HeaderTransformStep::new(
            description,
            pattern,
            substitution,
        )))
    }

    pub fn decoy(self, manipulator: ManipulatorKind, overwrite: bool) -> Self {
        self.step(StepHandle::new(MakeDecoyStep::new(manipulator, overwrite)))
    }

    pub fn build(self) -> Curation {
        self.curation
    }
}

/// Copies its input through and then reports failure.
#[derive(Debug, Default)]
pub struct FailingStep {
    state: StepState,
}

impl CurationStep for FailingStep {
    fn pre_validate(&self, _store: &dyn CurationStore) -> StepValidation {
        StepValidation::new()
    }

    fn perform(&mut self, ctx: &mut ExecutionContext) -> StepValidation {
        let mut validation = StepValidation::new();
        if let Err(e) = ctx.copy_input_to_output() {
            validation.add_message_with_cause("copy failed", e);
        }
        validation.add_message("deliberate failure");
        validation
    }

    fn copy(&self) -> Box<dyn CurationStep> {
        Box::new(FailingStep::default())
    }

    fn describe(&self) -> Option<String> {
        Some("fail".to_string())
    }

    fn descriptor(&self) -> Option<StepDescriptor> {
        None
    }

    fn state(&self) -> &StepState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut StepState {
        &mut self.state
    }
}

/// Persists as the manual inclusion of marker `n`.
fn marker_descriptor(n: usize) -> Option<StepDescriptor> {
    Some(StepDescriptor::ManualInclusion {
        header: marker_header(n),
        sequence: "MARKER".to_string(),
    })
}

/// Copies its input through, blocks until released, then appends marker `n`.
///
/// Announces on `started` when `perform` begins so a test can act while the
/// step is mid-flight.
#[derive(Debug)]
pub struct GateStep {
    marker: usize,
    started: Sender<()>,
    release: Receiver<()>,
    state: StepState,
}

impl GateStep {
    /// Returns the step plus the test's ends of both channels.
    pub fn new(marker: usize) -> (Self, Receiver<()>, Sender<()>) {
        let (started_tx, started_rx) = crossbeam_channel::bounded(1);
        let (release_tx, release_rx) = crossbeam_channel::bounded(1);
        let step = Self {
            marker,
            started: started_tx,
            release: release_rx,
            state: StepState::default(),
        };
        (step, started_rx, release_tx)
    }
}

impl CurationStep for GateStep {
    fn pre_validate(&self, _store: &dyn CurationStore) -> StepValidation {
        StepValidation::new()
    }

    fn perform(&mut self, ctx: &mut ExecutionContext) -> StepValidation {
        let mut validation = StepValidation::new();
        let _ = self.started.send(());
        let _ = self.release.recv();
        if let Err(e) = ctx.copy_input_to_output() {
            validation.add_message_with_cause("copy failed", e);
        }
        if let Err(e) = ctx
            .output()
            .append_sequence(&marker_header(self.marker), "MARKER")
        {
            validation.add_message_with_cause("append failed", e);
        }
        validation.set_completion_count(ctx.output().sequence_count() as i64);
        validation
    }

    fn copy(&self) -> Box<dyn CurationStep> {
        let (step, _, _) = GateStep::new(self.marker);
        Box::new(step)
    }

    fn describe(&self) -> Option<String> {
        None
    }

    fn descriptor(&self) -> Option<StepDescriptor> {
        marker_descriptor(self.marker)
    }

    fn state(&self) -> &StepState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut StepState {
        &mut self.state
    }
}

/// Panics inside `perform`.
#[derive(Debug, Default)]
pub struct PanickingStep {
    state: StepState,
}

impl CurationStep for PanickingStep {
    fn pre_validate(&self, _store: &dyn CurationStore) -> StepValidation {
        StepValidation::new()
    }

    fn perform(&mut self, _ctx: &mut ExecutionContext) -> StepValidation {
        panic!("step blew up");
    }

    fn copy(&self) -> Box<dyn CurationStep> {
        Box::new(PanickingStep::default())
    }

    fn describe(&self) -> Option<String> {
        None
    }

    fn descriptor(&self) -> Option<StepDescriptor> {
        None
    }

    fn state(&self) -> &StepState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut StepState {
        &mut self.state
    }
}

/// Copies its input through, requests an interrupt, then appends marker `n`.
#[derive(Debug, Default)]
pub struct InterruptingStep {
    marker: usize,
    state: StepState,
}

impl InterruptingStep {
    pub fn new(marker: usize) -> Self {
        Self {
            marker,
            state: StepState::default(),
        }
    }
}

impl CurationStep for InterruptingStep {
    fn pre_validate(&self, _store: &dyn CurationStore) -> StepValidation {
        StepValidation::new()
    }

    fn perform(&mut self, ctx: &mut ExecutionContext) -> StepValidation {
        let mut validation = StepValidation::new();
        if let Err(e) = ctx.copy_input_to_output() {
            validation.add_message_with_cause("copy failed", e);
        }
        ctx.status().cause_interrupt();
        if let Err(e) = ctx
            .output()
            .append_sequence(&marker_header(self.marker), "MARKER")
        {
            validation.add_message_with_cause("append failed", e);
        }
        validation.set_completion_count(ctx.output().sequence_count() as i64);
        validation
    }

    fn copy(&self) -> Box<dyn CurationStep> {
        Box::new(InterruptingStep::new(self.marker))
    }

    fn describe(&self) -> Option<String> {
        None
    }

    fn descriptor(&self) -> Option<StepDescriptor> {
        marker_descriptor(self.marker)
    }

    fn state(&self) -> &StepState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut StepState {
        &mut self.state
    }
}
