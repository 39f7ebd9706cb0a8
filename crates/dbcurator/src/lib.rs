pub mod archive;
pub mod config;
pub mod curation;
pub mod db;
pub mod error;
pub mod executor;
pub mod fasta;
pub mod storage;
pub mod store;
pub mod telemetry;

pub use archive::{ArchiveEntry, ArchiveError, SourceArchiveCache};
pub use config::{load_config, CuratorConfig, InvalidArtifactPolicy};
pub use curation::{Curation, CurationStep, StepDescriptor, StepHandle, StepValidation};
pub use db::{Database, DatabaseError};
pub use error::{ConfigError, CuratorError, FastaError, Result, StorageError};
pub use executor::{CurationExecutor, ExecutorConfig, ExecutorError, RunHandle, RunStatus};
pub use store::{CurationStore, SqliteCurationStore};
