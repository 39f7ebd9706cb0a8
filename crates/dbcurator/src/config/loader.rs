use std::path::Path;

use crate::archive::BUNDLED_PREFIX;
use crate::config::schema::CuratorConfig;
use crate::error::ConfigError;

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CuratorConfig, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<CuratorConfig, ConfigError> {
    let config: CuratorConfig = serde_json::from_str(content)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_config(config: &CuratorConfig) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    for (name, value) in [
        ("fasta_folder", &config.fasta_folder),
        ("temp_folder", &config.temp_folder),
        ("archive_folder", &config.archive_folder),
    ] {
        if value.trim().is_empty() {
            return Err(ConfigError::Validation {
                message: format!("{} must not be empty", name),
            });
        }
    }

    if config.download_poll_interval_ms == 0 {
        return Err(ConfigError::Validation {
            message: "download_poll_interval_ms must be greater than zero".to_string(),
        });
    }

    for locator in &config.bundled_resources.allowed {
        if !locator.starts_with(BUNDLED_PREFIX) {
            return Err(ConfigError::Validation {
                message: format!(
                    "Bundled resource '{}' must start with '{}'",
                    locator, BUNDLED_PREFIX
                ),
            });
        }
    }

    Ok(())
}
