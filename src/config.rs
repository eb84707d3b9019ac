use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

const APP_DIR: &str = "feedvault";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub db_path: PathBuf,
    /// Seconds between two full synchronization passes.
    pub sync_interval_secs: u64,
    /// Maximum number of feeds fetched at the same time.
    pub sync_concurrency: usize,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub user_agent: String,
    /// Every Nth scheduler tick re-checks articles flagged as dead links.
    pub dead_link_recheck_every: u32,
}

impl Default for Config {
    fn default() -> Self {
        let db_path = dirs::data_dir()
            .map(|dir| dir.join(APP_DIR))
            .unwrap_or_else(|| PathBuf::from("data"))
            .join("feedvault.db");

        Self {
            db_path,
            sync_interval_secs: 60 * 60,
            sync_concurrency: 4,
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
            user_agent: concat!("feedvault/", env!("CARGO_PKG_VERSION")).to_string(),
            dead_link_recheck_every: 1,
        }
    }
}

impl Config {
    pub fn config_path() -> Result<PathBuf> {
        let dir = dirs::config_dir()
            .ok_or_else(|| AppError::NotFound("user configuration directory".to_string()))?;
        Ok(dir.join(APP_DIR).join("config.toml"))
    }

    /// Loads the user config, writing the defaults out on first run.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if !path.exists() {
            let config = Self::default();
            if let Err(err) = config.save_to(&path) {
                tracing::warn!(path = %path.display(), error = %err, "unable to write default config");
            }
            return Ok(config);
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Builds the shared outbound client; every request gets the configured timeouts.
    pub fn http_client(&self) -> Result<reqwest::Client> {
        let client = reqwest::Client::builder()
            .timeout(self.request_timeout())
            .connect_timeout(self.connect_timeout())
            .user_agent(self.user_agent.clone())
            .build()?;
        Ok(client)
    }
}
