use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Directory where uploaded model files are stored.
    #[serde(default = "default_upload_directory")]
    pub upload_directory: PathBuf,

    /// Number of worker threads pulling analysis tasks.
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    /// Hard time budget for analyzing a single model, in seconds.
    #[serde(default = "default_analysis_timeout_secs")]
    pub analysis_timeout_secs: u64,

    /// How long a delivered task stays invisible before redelivery, in
    /// seconds. Must exceed the analysis timeout.
    #[serde(default = "default_lease_secs")]
    pub lease_secs: u64,

    #[serde(default)]
    pub ai: AiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_ai_api_base")]
    pub api_base: String,

    /// Read from the environment when empty.
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_ai_model")]
    pub model: String,
}

fn default_database_path() -> PathBuf {
    crate::db::default_database_path().unwrap_or_else(|| PathBuf::from("partlab.db"))
}

fn default_upload_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".partlab")
        .join("uploads")
}

fn default_worker_count() -> usize {
    num_cpus::get().max(1)
}

fn default_analysis_timeout_secs() -> u64 {
    120
}

fn default_lease_secs() -> u64 {
    300
}

fn default_ai_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_ai_model() -> String {
    "gpt-4o".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            upload_directory: default_upload_directory(),
            worker_count: default_worker_count(),
            analysis_timeout_secs: default_analysis_timeout_secs(),
            lease_secs: default_lease_secs(),
            ai: AiConfig::default(),
        }
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_base: default_ai_api_base(),
            api_key: String::new(),
            model: default_ai_model(),
        }
    }
}
