//! Runs a curation: chains its steps through a scratch workspace, places
//! the final artifact and records the run.

pub mod config;
pub mod context;
pub mod error;
pub mod runner;
pub mod status;

pub use crate::config::InvalidArtifactPolicy;
pub use config::ExecutorConfig;
pub use context::ExecutionContext;
pub use error::ExecutorError;
pub use runner::{CurationExecutor, RunHandle};
pub use status::{NoopStatus, RunState, RunStatus, StatusSink};
