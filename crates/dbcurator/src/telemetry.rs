//! Tracing setup for binaries and tools embedding the curator.

use std::sync::OnceLock;

use tracing_subscriber::EnvFilter;

use crate::error::CuratorError;

static INIT: OnceLock<Result<(), String>> = OnceLock::new();

/// Installs a global fmt subscriber filtered by `RUST_LOG` (falling back to
/// `default_filter`) and routes `log` records into it.
///
/// Only the first call installs anything. Later calls return the outcome of
/// that first call, so the error case is another library having installed a
/// global subscriber or logger first.
pub fn init_tracing(default_filter: &str, json: bool) -> Result<(), CuratorError> {
    INIT.get_or_init(|| install(default_filter, json))
        .clone()
        .map_err(CuratorError::Telemetry)
}

fn install(default_filter: &str, json: bool) -> Result<(), String> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_log::LogTracer::init().map_err(|e| e.to_string())?;

    let result = if json {
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_thread_names(true)
            .finish();
        tracing::subscriber::set_global_default(subscriber)
    } else {
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_thread_names(true)
            .finish();
        tracing::subscriber::set_global_default(subscriber)
    };

    result.map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_init_is_idempotent() {
        let first = init_tracing("info", false);
        assert!(first.is_ok(), "first init failed: {:?}", first.err());
        assert!(init_tracing("debug", true).is_ok());
    }

    #[test]
    #[serial]
    fn test_log_records_are_bridged_after_init() {
        init_tracing("info", false).unwrap();
        assert!(tracing::dispatcher::has_been_set());
        assert_eq!(log::max_level(), log::LevelFilter::Trace);
        log::info!("bridged through tracing-log");
    }
}
