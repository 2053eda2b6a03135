//! Configuration loading and parsing for `patchpilot.toml` files.
//!
//! Every field is optional; anything missing falls back to its default.
use log::*;
use serde::Deserialize;
use std::{path::Path, time::Duration};
use tokio::fs;

use crate::{Result, error::PatchpilotError};

/// Default configuration filename.
pub const DEFAULT_CONFIG_FILE: &str = "patchpilot.toml";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_PUBLISH_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_GENERATOR_URL: &str =
    "https://api.openai.com/v1/chat/completions";

/// Model endpoint settings for plan and code generation.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)] // Use default for missing fields
pub struct GeneratorConfig {
    /// OpenAI-compatible chat completions URL.
    pub api_url: String,
    pub plan_model: String,
    pub code_model: String,
    pub plan_max_tokens: u32,
    pub code_max_tokens: u32,
    /// Per request deadline for the model API.
    pub request_timeout_secs: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_GENERATOR_URL.into(),
            plan_model: "gpt-4o-mini".into(),
            code_model: "gpt-4o".into(),
            plan_max_tokens: 300,
            code_max_tokens: 1000,
            request_timeout_secs: 90,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Port the HTTP server listens on.
    pub port: u16,
    /// Deadline for one whole publish, network calls included.
    pub publish_timeout_secs: u64,
    /// Allow cross-origin requests to the HTTP API (default: true)
    pub cors: bool,
    /// Path prefixes generated changes may never touch, e.g. `.github/`.
    pub protected_paths: Vec<String>,
    pub generator: GeneratorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            publish_timeout_secs: DEFAULT_PUBLISH_TIMEOUT_SECS,
            cors: true,
            protected_paths: vec![],
            generator: GeneratorConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from `path`, or from [`DEFAULT_CONFIG_FILE`] in the
    /// working directory when no path is given. Only the default file may be
    /// absent.
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(path) => (path, true),
            None => (Path::new(DEFAULT_CONFIG_FILE), false),
        };

        if !fs::try_exists(path).await? {
            if explicit {
                return Err(PatchpilotError::invalid_config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }

            info!("configuration not found: using default");
            return Ok(Config::default());
        }

        let content = fs::read_to_string(path).await?;
        let config: Config = toml::from_str(&content)?;

        if config.publish_timeout_secs == 0 {
            return Err(PatchpilotError::invalid_config(
                "publish_timeout_secs must be greater than zero",
            ));
        }

        debug!("loaded configuration from {}", path.display());

        Ok(config)
    }

    pub fn publish_timeout(&self) -> Duration {
        Duration::from_secs(self.publish_timeout_secs)
    }
}
