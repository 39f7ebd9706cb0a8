use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use chrono::Utc;
use tracing::{debug, error, info, info_span, warn};

use crate::archive::SourceArchiveCache;
use crate::config::InvalidArtifactPolicy;
use crate::curation::{Curation, StepHandle};
use crate::fasta::{is_fasta_file_valid, FastaReader, FastaWriter};
use crate::storage::{create_run_workspace, remove_workspace, ArtifactStorage, MoveMethod, Placement};
use crate::store::CurationStore;

use super::config::ExecutorConfig;
use super::context::ExecutionContext;
use super::error::ExecutorError;
use super::status::RunStatus;

/// How the step loop ended. Only `Completed` commits the store transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunOutcome {
    Completed,
    Halted,
}

/// Runs one curation. Construct it, then either call [`run`](Self::run) on
/// the current thread or [`execute`](Self::execute) to run on a worker.
pub struct CurationExecutor {
    curation: Curation,
    config: Arc<ExecutorConfig>,
    store: Arc<dyn CurationStore>,
    archive_cache: Arc<SourceArchiveCache>,
    storage: ArtifactStorage,
    status: RunStatus,
}

impl CurationExecutor {
    pub fn new(
        curation: Curation,
        config: Arc<ExecutorConfig>,
        store: Arc<dyn CurationStore>,
        archive_cache: Arc<SourceArchiveCache>,
    ) -> Self {
        let storage = ArtifactStorage::new(&config.fasta_folder);
        Self {
            curation,
            config,
            store,
            archive_cache,
            storage,
            status: RunStatus::new(),
        }
    }

    /// Handle on the run's status. Clones observe the same run.
    pub fn status(&self) -> RunStatus {
        self.status.clone()
    }

    pub fn curation(&self) -> &Curation {
        &self.curation
    }

    pub fn into_curation(self) -> Curation {
        self.curation
    }

    /// Starts the run on a dedicated thread.
    pub fn execute(self) -> Result<RunHandle, ExecutorError> {
        let status = self.status.clone();
        let name = format!("curation-executor: {}", self.curation.short_name());
        let handle = thread::Builder::new()
            .name(name)
            .spawn(move || {
                let mut executor = self;
                executor.run();
                executor.into_curation()
            })
            .map_err(|e| ExecutorError::SpawnFailed(e.to_string()))?;

        Ok(RunHandle { status, handle })
    }

    /// Runs the curation to the end on the current thread. Never fails:
    /// problems are reported through the status, which is always marked
    /// done on return.
    pub fn run(&mut self) {
        let _run_span =
            info_span!("curation_run", short_name = %self.curation.short_name()).entered();

        match create_run_workspace(&self.config.temp_folder) {
            Ok(workspace) => {
                debug!(workspace = %workspace.display(), "Created run workspace");
                if let Err(e) = self.run_in_transaction(&workspace) {
                    error!(error = %e, "Curation run failed");
                    self.status.add_message(format!("Error: {}", e));
                    self.status.mark_aborted();
                }
                if let Err(e) = remove_workspace(&workspace) {
                    warn!(error = %e, "Failed to remove run workspace");
                }
            }
            Err(e) => {
                let e = ExecutorError::Workspace(e);
                error!(error = %e, "Curation run could not start");
                self.status.add_message(e.to_string());
                self.status.mark_aborted();
            }
        }

        self.status.set_to_done();
    }

    fn run_in_transaction(&mut self, workspace: &Path) -> Result<(), ExecutorError> {
        self.store.begin()?;

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.execute_curation(workspace)))
            .unwrap_or_else(|payload| Err(ExecutorError::StepPanicked(panic_message(payload))));

        match outcome {
            Ok(RunOutcome::Completed) => {
                self.store.commit()?;
                info!("Curation run completed");
                Ok(())
            }
            Ok(outcome) => {
                self.store.rollback()?;
                info!(?outcome, "Curation run stopped early");
                Ok(())
            }
            Err(e) => {
                if let Err(rollback_err) = self.store.rollback() {
                    warn!(error = %rollback_err, "Rollback failed");
                }
                Err(e)
            }
        }
    }

    /// The step loop plus finalization. An interrupt ends the loop early but
    /// the last completed output is still validated and retained.
    fn execute_curation(&mut self, workspace: &Path) -> Result<RunOutcome, ExecutorError> {
        let steps: Vec<StepHandle> = self.curation.steps().to_vec();
        let mut previous_output: Option<PathBuf> = None;

        for handle in &steps {
            if self.status.is_interrupted() {
                self.status.add_message("User interrupted");
                info!("Run interrupted before step {}", self.status.current_step_number() + 1);
                break;
            }

            self.status.increment_step();
            let number = self.status.current_step_number();
            let _step_span = info_span!("step", number).entered();
            self.status.add_message(format!("Step {} has begun", number));

            let input = match previous_output.as_deref().map(FastaReader::open).transpose() {
                Ok(input) => input,
                Err(e) => {
                    warn!(error = %e, "Could not reopen the previous step's output");
                    self.status
                        .add_message("Error setting up an input stream on step change");
                    self.status.mark_aborted();
                    return Ok(RunOutcome::Halted);
                }
            };
            let output_path = workspace.join(number.to_string());
            let output = match FastaWriter::create(&output_path) {
                Ok(output) => output,
                Err(e) => {
                    warn!(error = %e, "Could not create the step output");
                    self.status.add_message(format!(
                        "Error setting up the output file for step {}: {}",
                        number, e
                    ));
                    self.status.mark_aborted();
                    return Ok(RunOutcome::Halted);
                }
            };

            let mut ctx = ExecutionContext::new(
                input,
                output,
                self.status.clone(),
                Arc::clone(&self.store),
                Arc::clone(&self.archive_cache),
            );
            let mut validation = {
                let mut step = handle.lock();
                step.perform(&mut ctx)
            };
            if let Err(e) = ctx.close() {
                validation.add_message_with_cause("Could not finish writing the step output", e);
            }
            handle.lock().state_mut().record(&validation);

            if validation.is_ok() {
                debug!(sequences = validation.completion_count(), "Step completed");
                let message = format!(
                    "Step {} completed with {} sequences",
                    number,
                    validation.completion_count()
                );
                self.status.add_completed_step_validation(validation);
                self.status.add_message(message);
                previous_output = Some(output_path);
            } else {
                warn!(report = %validation, "Step failed");
                for message in validation.messages() {
                    self.status.add_message(format!("Step failed: {}", message));
                }
                self.status.add_failed_step_validation(validation);
                return Ok(RunOutcome::Halted);
            }
        }

        self.finalize(previous_output.as_deref())
    }

    fn finalize(&mut self, output: Option<&Path>) -> Result<RunOutcome, ExecutorError> {
        let output = match output.filter(|path| is_fasta_file_valid(path)) {
            Some(output) => output,
            None => {
                warn!("Final output is not a valid FASTA file");
                self.status
                    .add_message("Error: The resulting .fasta file is not valid!");
                return Ok(match self.config.invalid_artifact_policy {
                    InvalidArtifactPolicy::Warn => RunOutcome::Completed,
                    InvalidArtifactPolicy::Fail => {
                        self.status.mark_aborted();
                        RunOutcome::Halted
                    }
                });
            }
        };

        if !self.config.retain_artifacts {
            return Ok(RunOutcome::Completed);
        }

        self.status
            .add_message("Determining if there is an identical file already (may take a moment)");
        let placement = self.storage.place(output, self.curation.short_name())?;
        match &placement {
            Placement::Reused(path) => {
                info!(path = %path.display(), "Reusing identical artifact");
                self.status.add_message(format!(
                    "There already was an identical file so we will use that {}",
                    path.display()
                ));
            }
            Placement::Moved { path, method } => {
                let message = match method {
                    MoveMethod::Renamed => "Moving result file to final place",
                    MoveMethod::Copied => "Copied result file to final place",
                };
                self.status
                    .add_message(format!("{}: {}", message, path.display()));
            }
        }

        let now = Utc::now();
        self.curation
            .set_artifact_file(Some(placement.path().to_path_buf()));
        self.curation.set_run_date(now);
        if self.curation.deployment_date().is_none() {
            self.curation.set_deployment_date(Some(now));
        }
        self.store.save_curation(&mut self.curation)?;

        Ok(RunOutcome::Completed)
    }
}

impl std::fmt::Debug for CurationExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CurationExecutor")
            .field("curation", &self.curation.short_name())
            .field("config", &self.config)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// A run started with [`CurationExecutor::execute`].
#[derive(Debug)]
pub struct RunHandle {
    status: RunStatus,
    handle: JoinHandle<Curation>,
}

impl RunHandle {
    pub fn status(&self) -> &RunStatus {
        &self.status
    }

    /// Waits for the worker and returns the curation, updated by the run.
    pub fn join(self) -> Result<Curation, ExecutorError> {
        self.handle.join().map_err(|_| ExecutorError::WorkerPanicked)
    }
}
