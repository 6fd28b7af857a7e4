use std::path::Path;

use crate::config::schema::Config;
use crate::error::ConfigError;

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_json::from_str(content)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.worker_count == 0 {
        return Err(ConfigError::Validation {
            message: "worker_count must be at least 1".to_string(),
        });
    }

    if config.analysis_timeout_secs == 0 {
        return Err(ConfigError::Validation {
            message: "analysis_timeout_secs must be at least 1".to_string(),
        });
    }

    // A lease shorter than the analysis budget would redeliver tasks that
    // are still being worked on.
    if config.lease_secs <= config.analysis_timeout_secs {
        return Err(ConfigError::Validation {
            message: format!(
                "lease_secs ({}) must exceed analysis_timeout_secs ({})",
                config.lease_secs, config.analysis_timeout_secs
            ),
        });
    }

    if config.ai.enabled && config.ai.model.is_empty() {
        return Err(ConfigError::Validation {
            message: "ai.model must be set when ai.enabled is true".to_string(),
        });
    }

    Ok(())
}
