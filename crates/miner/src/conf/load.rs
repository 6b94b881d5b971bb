//! Load — config loading from file and environment variables.

use std::path::Path;

use crate::error::{MinerError, Result};
use super::model::MinerConfig;

impl MinerConfig {
    /// Load configuration from file or defaults.
    /// Priority: Environment Variables > Config File > Defaults
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("MINER_CONFIG_FILE")
            .unwrap_or_else(|_| "miner.toml".to_string());

        let mut config = if Path::new(&config_path).exists() {
            tracing::info!("Loading configuration from: {}", config_path);
            Self::from_file(&config_path)?
        } else {
            tracing::info!("Config file not found at {}, using defaults", config_path);
            Self::default()
        };

        config.apply_env();
        config.validate().map_err(MinerError::Config)?;
        Ok(config)
    }

    /// Load configuration from TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| MinerError::Config(e.to_string()))
    }

    /// Environment variables override file config for these settings
    pub fn apply_env(&mut self) {
        if let Ok(sym) = std::env::var("MINER_VARIABLE_SYMBOL") {
            self.variable_symbol = sym;
        }
        if let Ok(model) = std::env::var("MINER_CRF_MODEL") {
            self.crf.model_filename = model;
        }
        if let Ok(def_path) = std::env::var("MINER_IMPORT_DEF_PATH") {
            self.import.def_path = def_path;
        }
        if let Some(epochs) = std::env::var("MINER_CRF_EPOCHS")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            self.crf.epochs = epochs;
        }
    }
}
