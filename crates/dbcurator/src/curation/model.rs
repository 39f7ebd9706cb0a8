use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::curation::StepHandle;

/// Decoy marker used when a curation does not set its own.
pub const DEFAULT_DECOY_REGEX: &str = "Reversed_";

/// Maps a user-facing step position onto an insertion index for a list of
/// `len` steps. Negative positions count back from the end, so `-1` appends.
pub fn translate_step_index(position: i64, len: usize) -> usize {
    let len = len as i64;
    if len == 0 {
        return 0;
    }
    let index = if position > len {
        len - 1
    } else if position < 0 {
        len + position + 1
    } else {
        position
    };
    index.clamp(0, len) as usize
}

/// A named, ordered pipeline of steps and the artifact it last produced.
#[derive(Debug)]
pub struct Curation {
    id: Option<i64>,
    short_name: String,
    title: Option<String>,
    notes: Option<String>,
    owner_email: Option<String>,
    first_run_date: Option<DateTime<Utc>>,
    run_date: Option<DateTime<Utc>>,
    deployment_date: Option<DateTime<Utc>>,
    decoy_regex: Option<String>,
    steps: Vec<StepHandle>,
    artifact_file: Option<PathBuf>,
}

impl Curation {
    pub fn new(short_name: impl Into<String>) -> Self {
        Self {
            id: None,
            short_name: short_name.into(),
            title: None,
            notes: None,
            owner_email: None,
            first_run_date: None,
            run_date: None,
            deployment_date: None,
            decoy_regex: None,
            steps: Vec::new(),
            artifact_file: None,
        }
    }

    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    pub fn short_name(&self) -> &str {
        &self.short_name
    }

    pub fn set_short_name(&mut self, short_name: impl Into<String>) {
        self.short_name = short_name.into();
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn set_title(&mut self, title: Option<String>) {
        self.title = title;
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn set_notes(&mut self, notes: Option<String>) {
        self.notes = notes;
    }

    pub fn owner_email(&self) -> Option<&str> {
        self.owner_email.as_deref()
    }

    pub fn set_owner_email(&mut self, owner_email: Option<String>) {
        self.owner_email = owner_email;
    }

    pub fn first_run_date(&self) -> Option<DateTime<Utc>> {
        self.first_run_date
    }

    pub fn run_date(&self) -> Option<DateTime<Utc>> {
        self.run_date
    }

    /// Also sets the first run date, the first time only.
    pub fn set_run_date(&mut self, run_date: DateTime<Utc>) {
        self.run_date = Some(run_date);
        if self.first_run_date.is_none() {
            self.first_run_date = Some(run_date);
        }
    }

    /// Restores stored run history. Used when loading from a store.
    pub(crate) fn restore_run_dates(
        &mut self,
        first_run_date: Option<DateTime<Utc>>,
        run_date: Option<DateTime<Utc>>,
    ) {
        self.first_run_date = first_run_date;
        self.run_date = run_date;
    }

    pub fn deployment_date(&self) -> Option<DateTime<Utc>> {
        self.deployment_date
    }

    pub fn set_deployment_date(&mut self, deployment_date: Option<DateTime<Utc>>) {
        self.deployment_date = deployment_date;
    }

    /// Never empty; falls back to [`DEFAULT_DECOY_REGEX`].
    pub fn decoy_regex(&self) -> &str {
        match self.decoy_regex.as_deref() {
            Some(regex) if !regex.is_empty() => regex,
            _ => DEFAULT_DECOY_REGEX,
        }
    }

    pub fn set_decoy_regex(&mut self, decoy_regex: Option<String>) {
        self.decoy_regex = decoy_regex;
    }

    pub(crate) fn stored_decoy_regex(&self) -> Option<&str> {
        self.decoy_regex.as_deref()
    }

    pub fn artifact_file(&self) -> Option<&Path> {
        self.artifact_file.as_deref()
    }

    pub fn set_artifact_file(&mut self, artifact_file: Option<PathBuf>) {
        self.artifact_file = artifact_file;
    }

    pub fn has_run(&self) -> bool {
        self.artifact_file.is_some()
    }

    pub fn steps(&self) -> &[StepHandle] {
        &self.steps
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Inserts `step` at `position`, see [`translate_step_index`].
    pub fn add_step(&mut self, step: StepHandle, position: i64) -> &mut Self {
        let index = translate_step_index(position, self.steps.len());
        self.steps.insert(index, step);
        self
    }

    pub fn step_at(&self, position: i64) -> Option<&StepHandle> {
        self.steps
            .get(translate_step_index(position, self.steps.len()))
    }

    pub fn remove_step(&mut self, position: i64) -> Option<StepHandle> {
        let index = translate_step_index(position, self.steps.len());
        (index < self.steps.len()).then(|| self.steps.remove(index))
    }

    pub fn clear_steps(&mut self) {
        self.steps.clear();
    }

    /// Comma-separated step descriptions, skipping steps without one.
    pub fn simple_description(&self) -> String {
        self.steps
            .iter()
            .filter_map(|step| step.describe())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// A new curation with the same definition.
    ///
    /// A refresh copy shares the step instances and keeps deployment date,
    /// owner and first run date. Otherwise the steps are copied and that
    /// history is left unset.
    pub fn create_copy(&self, for_refresh: bool) -> Curation {
        let mut copy = Curation::new(self.short_name.clone());
        copy.title = self.title.clone();
        copy.notes = self.notes.clone();
        copy.decoy_regex = self.decoy_regex.clone();

        if for_refresh {
            copy.deployment_date = self.deployment_date;
            copy.owner_email = self.owner_email.clone();
            copy.first_run_date = self.first_run_date;
            copy.steps = self.steps.clone();
        } else {
            copy.steps = self.steps.iter().map(StepHandle::copy).collect();
        }
        copy
    }

    /// Field-for-field copy, including id, run history, and artifact.
    /// Steps are copied, not shared.
    pub fn copy_full(&self) -> Curation {
        Curation {
            id: self.id,
            short_name: self.short_name.clone(),
            title: self.title.clone(),
            notes: self.notes.clone(),
            owner_email: self.owner_email.clone(),
            first_run_date: self.first_run_date,
            run_date: self.run_date,
            deployment_date: self.deployment_date,
            decoy_regex: self.decoy_regex.clone(),
            steps: self.steps.iter().map(StepHandle::copy).collect(),
            artifact_file: self.artifact_file.clone(),
        }
    }
}
