//! Configuration management for postdesk.
//!
//! Loads configuration from ${POSTDESK_HOME}/config.toml with sensible defaults.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Returns the default config template with comments.
///
/// Embedded from default_config.toml at compile time.
fn default_config_template() -> &'static str {
    include_str!("../default_config.toml")
}

pub mod paths {
    //! Path resolution for postdesk configuration and data files.
    //!
    //! POSTDESK_HOME resolution order:
    //! 1. POSTDESK_HOME environment variable (if set)
    //! 2. ~/.config/postdesk (default)
    //! 3. ./.postdesk when no home directory can be determined

    use std::path::PathBuf;

    /// Returns the postdesk home directory.
    pub fn postdesk_home() -> PathBuf {
        if let Ok(home) = std::env::var("POSTDESK_HOME") {
            return PathBuf::from(home);
        }

        dirs::home_dir().map_or_else(
            || PathBuf::from(".postdesk"),
            |h| h.join(".config").join("postdesk"),
        )
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        postdesk_home().join("config.toml")
    }

    /// Returns the path to the persisted client store (token, cookies, provider session).
    pub fn store_path() -> PathBuf {
        postdesk_home().join("store.json")
    }

    /// Returns the directory for rolling log files.
    pub fn logs_dir() -> PathBuf {
        postdesk_home().join("logs")
    }
}

/// Identity provider settings (Firebase REST + Google popup client).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Firebase Web API key
    pub api_key: Option<String>,
    /// Identity Toolkit base URL
    pub identity_url: String,
    /// Secure Token service base URL
    pub securetoken_url: String,
    /// Google OAuth client ID for federated sign-in
    pub google_client_id: Option<String>,
    /// Google OAuth client secret (desktop clients treat it as public)
    pub google_client_secret: Option<String>,
    /// Loopback port for the popup callback
    pub callback_port: u16,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            identity_url: "https://identitytoolkit.googleapis.com".to_string(),
            securetoken_url: "https://securetoken.googleapis.com".to_string(),
            google_client_id: None,
            google_client_secret: None,
            callback_port: 8085,
        }
    }
}

impl IdentityConfig {
    /// Returns the API key, preferring POSTDESK_FIREBASE_API_KEY over the file value.
    pub fn effective_api_key(&self) -> Option<String> {
        std::env::var("POSTDESK_FIREBASE_API_KEY")
            .ok()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .or_else(|| {
                self.api_key
                    .as_deref()
                    .map(str::trim)
                    .filter(|key| !key.is_empty())
                    .map(str::to_string)
            })
    }
}

/// Carousel timing and content.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CarouselConfig {
    /// Seconds between automatic advances
    pub interval_secs: u64,
    /// Transition lockout in milliseconds
    pub transition_ms: u64,
    /// Slide captions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub slides: Vec<String>,
}

impl Default for CarouselConfig {
    fn default() -> Self {
        Self {
            interval_secs: 5,
            transition_ms: 650,
            slides: Vec::new(),
        }
    }
}

impl CarouselConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    pub fn transition(&self) -> Duration {
        Duration::from_millis(self.transition_ms)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default filter directive when POSTDESK_LOG is unset
    pub level: String,
    /// Write daily log files under $POSTDESK_HOME/logs
    pub file: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: false,
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Site backend base URL
    pub base_url: String,

    #[serde(default)]
    pub identity: IdentityConfig,

    #[serde(default)]
    pub carousel: CarouselConfig,

    #[serde(default)]
    pub log: LogConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            identity: IdentityConfig::default(),
            carousel: CarouselConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Config {
    const DEFAULT_BASE_URL: &str = "http://localhost:8080";

    /// Loads configuration from the default config path.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Returns the backend base URL, preferring POSTDESK_BASE_URL.
    pub fn effective_base_url(&self) -> String {
        std::env::var("POSTDESK_BASE_URL")
            .ok()
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| self.base_url.clone())
            .trim_end_matches('/')
            .to_string()
    }

    /// Creates a default config file at the given path.
    /// Returns an error if the file already exists.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config file already exists at {}", path.display());
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let tmp_path = path.with_extension("toml.tmp");
        fs::write(&tmp_path, default_config_template())
            .with_context(|| format!("Failed to write config to {}", tmp_path.display()))?;
        fs::rename(&tmp_path, path).with_context(|| {
            format!(
                "Failed to move {} to {}",
                tmp_path.display(),
                path.display()
            )
        })
    }
}
