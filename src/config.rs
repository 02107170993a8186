use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub avatar: AvatarConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_path: String,

    pub log_level: String,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,

    /// Maximum database connections (default: 5)
    pub max_db_connections: u32,

    /// Minimum database connections (default: 1)
    pub min_db_connections: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: "sqlite:data/accounts.db".to_string(),
            log_level: "info".to_string(),
            worker_threads: 2,
            max_db_connections: 5,
            min_db_connections: 1,
        }
    }
}

/// Gravatar lookup used to give new accounts a profile image.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AvatarConfig {
    /// When disabled, accounts are created without an avatar.
    pub enabled: bool,

    pub base_url: String,

    /// Image edge length in pixels (1-2048)
    pub size: u32,

    /// Fallback image Gravatar serves for unknown emails ("identicon", "mp", "retro", ...)
    pub default_image: String,

    pub rating: String,

    /// Check with a HEAD request that the email has a real Gravatar image.
    /// Accounts without one get no avatar instead of the fallback image.
    pub verify: bool,

    pub request_timeout_seconds: u64,
}

impl Default for AvatarConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://www.gravatar.com/avatar".to_string(),
            size: 200,
            default_image: "identicon".to_string(),
            rating: "g".to_string(),
            verify: false,
            request_timeout_seconds: 10,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(Self::locate().as_deref())
    }

    /// First existing file on the config search path.
    #[must_use]
    pub fn locate() -> Option<PathBuf> {
        Self::first_existing(&Self::config_paths())
    }

    /// Loads `path`, or the defaults when there is no config file.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        path.map_or_else(|| Ok(Self::default()), Self::load_from_path)
    }

    fn first_existing(paths: &[PathBuf]) -> Option<PathBuf> {
        paths.iter().find(|path| path.exists()).cloned()
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![Self::default_config_path()];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("account-store").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".account-store").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            let config = Self::default();
            config.save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.general.database_path.is_empty() {
            anyhow::bail!("Database path cannot be empty");
        }

        if self.general.max_db_connections == 0 {
            anyhow::bail!("max_db_connections must be > 0");
        }

        if self.general.min_db_connections > self.general.max_db_connections {
            anyhow::bail!("min_db_connections cannot exceed max_db_connections");
        }

        if self.avatar.enabled {
            url::Url::parse(&self.avatar.base_url).context("Invalid avatar base URL")?;

            if !(1..=2048).contains(&self.avatar.size) {
                anyhow::bail!("Avatar size must be between 1 and 2048");
            }
        }

        Ok(())
    }
}
