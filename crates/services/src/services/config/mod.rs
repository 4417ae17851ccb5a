use std::path::Path;

use thiserror::Error;

pub mod versions;

pub use versions::v1::{ExportConfig, ImportConfig, InstanceConfig, ToolchainConfig};

pub type Config = versions::v1::Config;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("Config error: {0}")]
    Custom(String),
}

/// Load the config from `config_path`, falling back to defaults when the file
/// is missing or cannot be understood
pub async fn load_config_from_file(config_path: &Path) -> Config {
    match tokio::fs::read_to_string(config_path).await {
        Ok(raw_config) => Config::from(raw_config),
        Err(_) => {
            tracing::info!("No config file found, creating one");
            Config::default()
        }
    }
}

pub async fn save_config_to_file(config: &Config, config_path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = config_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let raw_config = serde_json::to_string_pretty(config)?;
    tokio::fs::write(config_path, raw_config).await?;
    Ok(())
}
