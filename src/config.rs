use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub schedule: ScheduleConfig,
    pub input: InputConfig,
    pub display: DisplayConfig,
}

/// Remote service location and the browser identity presented to it.
///
/// The defaults are placeholders: `base_url`, `referer` and `origin` point at
/// an `example.com` host, not at the real service. Set `api.base_url` (and
/// the widget's referer/origin) in the config file before running against a
/// live deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base path the profile, earnings and ping endpoints hang off.
    /// Placeholder by default.
    pub base_url: String,
    pub user_agent: String,
    pub referer: String,
    pub origin: String,
    pub accept_language: String,
}

/// Pauses between accounts and between cycles, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub account_delay_secs: u64,
    pub cycle_delay_secs: u64,
}

/// Input file locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// One bearer token per line.
    pub tokens_file: PathBuf,
    /// One proxy per line, `scheme://[user:password@]host:port`.
    pub proxies_file: PathBuf,
}

/// Dashboard configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Activity log lines kept under the table.
    pub log_lines: usize,
    /// Token characters shown before the mask.
    pub token_prefix_len: usize,
}

/// Default base URL. A stand-in host; the live service address must come
/// from the config file.
pub const PLACEHOLDER_BASE_URL: &str = "https://api.rewards-widget.example.com/api/v1";

impl ApiConfig {
    /// True while `base_url` is still the shipped placeholder.
    pub fn uses_placeholder_base_url(&self) -> bool {
        self.base_url.trim_end_matches('/') == PLACEHOLDER_BASE_URL
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: PLACEHOLDER_BASE_URL.to_string(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36"
                .to_string(),
            referer: "https://rewards-widget.example.com/".to_string(),
            origin: "https://rewards-widget.example.com".to_string(),
            accept_language: "en-US,en;q=0.9".to_string(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            account_delay_secs: 1,
            cycle_delay_secs: 30,
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            tokens_file: PathBuf::from("tokens.txt"),
            proxies_file: PathBuf::from("proxies.txt"),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            log_lines: 20,
            token_prefix_len: 8,
        }
    }
}

impl AppConfig {
    /// Load configuration from `path`, or from
    /// `~/.config/rewards-monitor/config.toml` when none is given.
    /// Returns `Default` if the file is missing or unparseable.
    pub fn load(path: Option<&Path>) -> Self {
        let config_path = path.map(Path::to_path_buf).unwrap_or_else(Self::config_path);
        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", config_path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to parse config at {}: {e}, using defaults",
                        config_path.display()
                    );
                    Self::default()
                }
            },
            Err(_) => {
                tracing::debug!(
                    "No config file at {}, using defaults",
                    config_path.display()
                );
                Self::default()
            }
        }
    }

    /// Directory for the rolling log files.
    pub fn log_dir() -> PathBuf {
        dirs::data_dir()
            .map(|d| d.join("rewards-monitor").join("logs"))
            .unwrap_or_else(|| PathBuf::from("logs"))
    }

    fn config_path() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("rewards-monitor").join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }
}
