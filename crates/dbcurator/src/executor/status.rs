use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::curation::StepValidation;

/// Receives progress from long-running work such as archive downloads.
pub trait StatusSink: Send + Sync {
    fn add_message(&self, message: String);
    fn set_current_step_progress(&self, percent: f32);
}

/// No-op sink for unit tests.
pub struct NoopStatus;

impl StatusSink for NoopStatus {
    fn add_message(&self, _message: String) {}
    fn set_current_step_progress(&self, _percent: f32) {}
}

/// Coarse run state derived from a [`RunStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    NotStarted,
    Running { step: usize },
    Failed { step: usize },
    Interrupted { step: usize },
    Completed,
}

#[derive(Default)]
struct StatusState {
    messages: Vec<String>,
    completed: Vec<StepValidation>,
    failed: Vec<StepValidation>,
    step_number: usize,
    step_progress: f32,
    done: bool,
    interrupted: bool,
    aborted: bool,
}

/// Shared progress and control channel between a running curation and its
/// observers. Cloning is cheap and every clone sees the same state.
///
/// `done` and `interrupted` only ever go from false to true. Messages are
/// drained on read, so observers that want a transcript keep their own.
#[derive(Clone, Default)]
pub struct RunStatus {
    inner: Arc<(Mutex<StatusState>, Condvar)>,
}

impl RunStatus {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, StatusState> {
        self.inner
            .0
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Returns and clears the pending messages.
    pub fn take_messages(&self) -> Vec<String> {
        std::mem::take(&mut self.state().messages)
    }

    pub fn add_message(&self, message: impl Into<String>) {
        self.state().messages.push(message.into());
    }

    /// 1-based number of the step currently (or last) running, 0 before the first.
    pub fn current_step_number(&self) -> usize {
        self.state().step_number
    }

    /// Moves to the next step and resets its progress.
    pub fn increment_step(&self) {
        let mut state = self.state();
        state.step_number += 1;
        state.step_progress = 0.0;
    }

    pub fn current_step_progress(&self) -> f32 {
        self.state().step_progress
    }

    /// Clamped to 0..=100.
    pub fn set_current_step_progress(&self, percent: f32) {
        let percent = if percent.is_nan() {
            0.0
        } else {
            percent.clamp(0.0, 100.0)
        };
        self.state().step_progress = percent;
    }

    pub fn add_completed_step_validation(&self, validation: StepValidation) {
        self.state().completed.push(validation);
    }

    pub fn add_failed_step_validation(&self, validation: StepValidation) {
        self.state().failed.push(validation);
    }

    pub fn completed_step_validations(&self) -> Vec<StepValidation> {
        self.state().completed.clone()
    }

    pub fn failed_step_validations(&self) -> Vec<StepValidation> {
        self.state().failed.clone()
    }

    /// Record count of the most recent completed step, `-1` if there is none.
    pub fn last_step_sequence_count(&self) -> i64 {
        self.state()
            .completed
            .last()
            .map(|v| v.completion_count())
            .unwrap_or(-1)
    }

    /// True until the run finishes or an interrupt is requested.
    pub fn is_in_progress(&self) -> bool {
        let state = self.state();
        !state.done && !state.interrupted
    }

    pub fn is_done(&self) -> bool {
        self.state().done
    }

    pub fn set_to_done(&self) {
        let (_, signal) = &*self.inner;
        self.state().done = true;
        signal.notify_all();
    }

    /// Requests a cooperative stop at the next step boundary.
    pub fn cause_interrupt(&self) {
        self.state().interrupted = true;
    }

    pub fn is_interrupted(&self) -> bool {
        self.state().interrupted
    }

    /// Marks the run failed for reasons other than a failing step, such as
    /// a broken workspace or a failed finalization.
    pub fn mark_aborted(&self) {
        self.state().aborted = true;
    }

    pub fn is_failed(&self) -> bool {
        let state = self.state();
        state.aborted || !state.failed.is_empty()
    }

    pub fn run_state(&self) -> RunState {
        let state = self.state();
        let step = state.step_number;
        let failed = state.aborted || !state.failed.is_empty();
        if !state.done {
            if step == 0 {
                return RunState::NotStarted;
            }
            return RunState::Running { step };
        }
        if failed {
            RunState::Failed { step }
        } else if state.interrupted {
            RunState::Interrupted { step }
        } else {
            RunState::Completed
        }
    }

    /// Blocks until the run is done or `timeout` elapses. Returns whether
    /// the run is done.
    pub fn wait_until_done(&self, timeout: Duration) -> bool {
        let (lock, signal) = &*self.inner;
        let deadline = Instant::now() + timeout;
        let mut state = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        while !state.done {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            state = match signal.wait_timeout(state, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
        true
    }

    /// Renders every failed validation with its messages and causes.
    pub fn failed_validations_to_string(&self) -> String {
        self.state()
            .failed
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl StatusSink for RunStatus {
    fn add_message(&self, message: String) {
        RunStatus::add_message(self, message);
    }

    fn set_current_step_progress(&self, percent: f32) {
        RunStatus::set_current_step_progress(self, percent);
    }
}

impl std::fmt::Debug for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("RunStatus")
            .field("step_number", &state.step_number)
            .field("step_progress", &state.step_progress)
            .field("pending_messages", &state.messages.len())
            .field("completed", &state.completed.len())
            .field("failed", &state.failed.len())
            .field("done", &state.done)
            .field("interrupted", &state.interrupted)
            .finish()
    }
}
