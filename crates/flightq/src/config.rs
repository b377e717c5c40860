//! Layered configuration: built-in defaults, then the TOML file, then
//! `FLIGHTQ_` environment variables.

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::route::MAX_HIGHLIGHTED_FLIGHTS;

const CONFIG_FILE_NAME: &str = "config.toml";

const DATA_DIR_NAME: &str = "flightq";

const DATABASE_FILE_NAME: &str = "flights.db";

const ENV_PREFIX: &str = "FLIGHTQ_";

/// Top-level settings.
///
/// Later sources win: defaults, then `~/.config/flightq/config.toml`, then
/// environment variables such as `FLIGHTQ_API__ACCESS_KEY` (`__` separates
/// the section from the key).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database location and listing limits.
    pub storage: StorageConfig,
    /// Flight data API configuration.
    pub api: ApiConfig,
    /// Background update schedule.
    pub schedule: ScheduleConfig,
    /// Update worker behaviour.
    pub worker: WorkerConfig,
    /// Notification delivery.
    pub notifications: NotificationConfig,
}

/// Database settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file. `None` means `~/.local/share/flightq/flights.db`.
    pub database_path: Option<PathBuf>,
    /// Number of recent route searches listed by default.
    pub recent_routes_limit: usize,
}

/// Flight data API configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the aviationstack API.
    pub base_url: String,
    /// API access key.
    pub access_key: String,
    /// Result limit for route searches.
    pub route_search_limit: u32,
    /// Result limit for flight-number lookups.
    pub track_limit: u32,
    /// Connect and read timeout in seconds.
    pub timeout_secs: u64,
    /// Retries for transient failures.
    pub max_retries: u32,
    /// Delay between retries in seconds.
    pub retry_delay_secs: u64,
    /// Addresses used for the API host when system DNS fails.
    pub fallback_ips: Vec<String>,
}

/// Background update schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Hours between scheduled update cycles. Minimum 1.
    pub update_frequency_hours: u64,
    /// Delay before the first scheduled cycle, in minutes.
    pub initial_delay_minutes: u64,
    /// Backoff before retrying a failed cycle, in seconds. Doubles per retry.
    pub retry_backoff_secs: u64,
    /// Upper bound on the retry backoff, in seconds.
    pub max_backoff_secs: u64,
    /// Retries of a failed cycle before waiting for the next period.
    pub max_retries: u32,
}

/// Update worker behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Record a synthetic observation when no live data is available.
    pub synthetic_fallback: bool,
    /// Maximum highlighted flights per route.
    pub max_highlighted_flights: usize,
}

/// Notification delivery.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Webhook that receives update notifications as JSON.
    pub webhook_url: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            recent_routes_limit: 10,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.aviationstack.com/v1/".to_string(),
            access_key: String::new(),
            route_search_limit: 100,
            track_limit: 100,
            timeout_secs: 15,
            max_retries: 3,
            retry_delay_secs: 3,
            fallback_ips: vec!["35.167.208.187".to_string(), "54.213.58.231".to_string()],
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            update_frequency_hours: 24,
            initial_delay_minutes: 60,
            retry_backoff_secs: 30,
            max_backoff_secs: 5 * 60 * 60,
            max_retries: 3,
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            synthetic_fallback: true,
            max_highlighted_flights: MAX_HIGHLIGHTED_FLIGHTS,
        }
    }
}

impl Config {
    /// Load from the default file location.
    ///
    /// # Errors
    ///
    /// See [`Config::load_from`].
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load using `config_path` in place of the default file. A missing file
    /// is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be parsed or the merged result
    /// fails [`Config::validate`].
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file).nested())
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// `<config dir>/flightq/config.toml`.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// `<local data dir>/flightq`.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Check ranges and parse the URL and address settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigValidation`] naming the first bad setting.
    pub fn validate(&self) -> Result<()> {
        if self.schedule.update_frequency_hours == 0 {
            return Err(Error::config("update_frequency_hours must be at least 1"));
        }

        if self.schedule.retry_backoff_secs > self.schedule.max_backoff_secs {
            return Err(Error::config(format!(
                "retry_backoff_secs ({}) cannot be greater than max_backoff_secs ({})",
                self.schedule.retry_backoff_secs, self.schedule.max_backoff_secs
            )));
        }

        if self.api.timeout_secs == 0 {
            return Err(Error::config("timeout_secs must be greater than 0"));
        }

        if self.api.route_search_limit == 0 || self.api.track_limit == 0 {
            return Err(Error::config(
                "route_search_limit and track_limit must be greater than 0",
            ));
        }

        if self.worker.max_highlighted_flights == 0 {
            return Err(Error::config(
                "max_highlighted_flights must be greater than 0",
            ));
        }

        self.base_url()?;
        self.fallback_ips()?;

        if let Some(url) = &self.notifications.webhook_url {
            Url::parse(url)
                .map_err(|e| Error::config(format!("invalid webhook_url {url}: {e}")))?;
        }

        Ok(())
    }

    /// The configured database file, or the default one.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// The parsed API base URL, always ending in `/` so that endpoint paths
    /// join beneath it.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL does not parse.
    pub fn base_url(&self) -> Result<Url> {
        let raw = &self.api.base_url;
        let normalized = if raw.ends_with('/') {
            raw.clone()
        } else {
            format!("{raw}/")
        };
        Url::parse(&normalized).map_err(|e| Error::config(format!("invalid base_url {raw}: {e}")))
    }

    /// The parsed DNS fallback addresses.
    ///
    /// # Errors
    ///
    /// Returns an error if any entry is not an IP address.
    pub fn fallback_ips(&self) -> Result<Vec<IpAddr>> {
        self.api
            .fallback_ips
            .iter()
            .map(|ip| {
                ip.parse()
                    .map_err(|_| Error::config(format!("invalid fallback IP address: {ip}")))
            })
            .collect()
    }

    /// Per-request timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }

    /// Pause between API retries.
    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.api.retry_delay_secs)
    }

    /// Time between scheduled cycles.
    #[must_use]
    pub fn update_period(&self) -> Duration {
        Duration::from_secs(self.schedule.update_frequency_hours * 60 * 60)
    }

    /// Wait before the first scheduled cycle.
    #[must_use]
    pub fn initial_delay(&self) -> Duration {
        Duration::from_secs(self.schedule.initial_delay_minutes * 60)
    }

    /// Backoff before the first cycle retry.
    #[must_use]
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_secs(self.schedule.retry_backoff_secs)
    }

    /// Cap on the cycle retry backoff.
    #[must_use]
    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.schedule.max_backoff_secs)
    }
}
