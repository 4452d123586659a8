use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{Result, anyhow};

use crate::logger::LogSettings;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_HEALTH_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_MERMAID_CLI: &str = "mmdc";

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub api_url: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub health_interval_secs: Option<u64>,
    pub development: Option<bool>,
    pub mermaid_cli: Option<String>,
    pub render_dir: Option<String>,
    pub voice_output: Option<bool>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(config_path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(config_path, config_content)?;
        Ok(())
    }

    /// Apply `BRAINCRAFT_*` environment overrides on top of the file values
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("BRAINCRAFT_API_URL") {
            self.api_url = Some(url);
        }
        if let Ok(env) = std::env::var("BRAINCRAFT_ENV") {
            self.development = Some(env.eq_ignore_ascii_case("development"));
        }
        if let Ok(cli) = std::env::var("BRAINCRAFT_MERMAID_CLI") {
            self.mermaid_cli = Some(cli);
        }
        self
    }

    pub fn api_url(&self) -> String {
        self.api_url
            .clone()
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
            .trim_end_matches('/')
            .to_string()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    pub fn health_interval(&self) -> Duration {
        Duration::from_secs(self.health_interval_secs.unwrap_or(DEFAULT_HEALTH_INTERVAL_SECS))
    }

    pub fn log_settings(&self) -> LogSettings {
        LogSettings {
            development: self.development.unwrap_or(false),
        }
    }

    pub fn mermaid_cli(&self) -> String {
        self.mermaid_cli
            .clone()
            .unwrap_or_else(|| DEFAULT_MERMAID_CLI.to_string())
    }

    pub fn render_dir(&self) -> PathBuf {
        if let Some(dir) = &self.render_dir {
            return PathBuf::from(dir);
        }
        dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("braincraft")
            .join("diagrams")
    }

    pub fn voice_output(&self) -> bool {
        self.voice_output.unwrap_or(false)
    }

    pub fn log_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("braincraft.log"))
    }

    fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("braincraft"))
    }

    fn get_config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }
}
