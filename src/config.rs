use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const API_KEY_ENV: &str = "READALOUD_API_KEY";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // Speech
    pub engine: String,
    pub lang: Option<String>,
    pub voice_name: Option<String>,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,

    // Voice loading
    pub voice_load_timeout_ms: u64,
    pub voice_poll_interval_ms: u64,

    // Host profile overrides (0 disables)
    pub max_utterance_len: Option<usize>,
    pub keep_alive_secs: Option<u64>,

    // Explain
    pub explain_enabled: bool,
    pub explain_provider: String,
    pub explain_url: String,
    pub explain_model: String,
    pub explain_api_key: String,
    pub explain_max_retries: usize,
    pub explain_timeout_secs: u64,
    pub explain_max_chars: usize,

    // Meta
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine: "system".to_string(),
            lang: None,
            voice_name: None,
            rate: 1.0,
            pitch: 1.0,
            volume: 1.0,
            voice_load_timeout_ms: 3000,
            voice_poll_interval_ms: 100,
            max_utterance_len: None,
            keep_alive_secs: None,
            explain_enabled: true,
            explain_provider: "openai".to_string(),
            explain_url: "https://api.openai.com".to_string(),
            explain_model: "gpt-4o-mini".to_string(),
            explain_api_key: "".to_string(),
            explain_max_retries: 3,
            explain_timeout_secs: 30,
            explain_max_chars: 4000,
            log_level: "INFO".to_string(),
        }
    }
}

impl Config {
    /// Load config from the default path, or create default
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            match serde_json::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    // Graceful degradation: log warning and use defaults
                    tracing::warn!("⚠️ Config file corrupted or invalid, using defaults: {}", e);
                    let backup_path = path.with_extension("json.corrupt");
                    let _ = std::fs::rename(path, &backup_path);
                    Self::default()
                }
            }
        } else {
            Self::default()
        };

        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.is_empty() {
                config.explain_api_key = key;
            }
        }
        Ok(config)
    }

    /// Save config to the default path
    pub fn save(&self) -> Result<()> {
        self.save_to(&config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn voice_load_timeout(&self) -> Duration {
        Duration::from_millis(self.voice_load_timeout_ms)
    }

    pub fn voice_poll_interval(&self) -> Duration {
        Duration::from_millis(self.voice_poll_interval_ms.max(1))
    }
}

pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("readaloud")
        .join("config.json")
}
