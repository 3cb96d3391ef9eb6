use std::time::Duration;

use serde::Deserialize;

use crate::services::queue::QueueSettings;

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// TMDB API key
    pub tmdb_api_key: String,

    /// TMDB API base URL
    #[serde(default = "default_tmdb_api_url")]
    pub tmdb_api_url: String,

    /// Region used for watch-provider availability (ISO 3166-1)
    #[serde(default = "default_watch_region")]
    pub watch_region: String,

    /// Language for titles and overviews
    #[serde(default = "default_language")]
    pub language: String,

    /// Redis connection URL
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Upper bound on a single catalog request, in seconds
    #[serde(default = "default_page_timeout_secs")]
    pub page_timeout_secs: u64,

    #[serde(default = "default_low_water_mark")]
    pub low_water_mark: usize,

    #[serde(default = "default_target_batch_size")]
    pub target_batch_size: usize,

    #[serde(default = "default_max_pages_per_refill")]
    pub max_pages_per_refill: u32,

    /// Sessions untouched for this many seconds are evicted
    #[serde(default = "default_session_idle_secs")]
    pub session_idle_secs: u64,
}

fn default_tmdb_api_url() -> String {
    "https://api.themoviedb.org/3".to_string()
}

fn default_watch_region() -> String {
    "US".to_string()
}

fn default_language() -> String {
    "en-US".to_string()
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_page_timeout_secs() -> u64 {
    10
}

fn default_low_water_mark() -> usize {
    5
}

fn default_target_batch_size() -> usize {
    20
}

fn default_max_pages_per_refill() -> u32 {
    10
}

fn default_session_idle_secs() -> u64 {
    3600
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        envy::from_env::<Config>().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
    }

    /// Queue tuning derived from the configuration
    pub fn queue_settings(&self) -> QueueSettings {
        QueueSettings {
            low_water_mark: self.low_water_mark,
            target_batch_size: self.target_batch_size,
            max_pages_per_refill: self.max_pages_per_refill,
            page_timeout: Duration::from_secs(self.page_timeout_secs),
        }
    }

    pub fn session_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.session_idle_secs)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
