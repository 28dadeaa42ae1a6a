use std::env;
use std::time::Duration;

use chrono::Duration as ChronoDuration;

use crate::fetcher::FetcherSettings;
use crate::worker::ScheduleConfig;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Upstream jobs API URL. Fetches fail with a configuration error when unset.
    pub api_url: Option<String>,

    /// Upstream API key, also the HMAC secret. Surrounding quotes are stripped.
    pub api_key: Option<String>,

    /// Sent as the `Origin` header when set
    pub allowed_origin: Option<String>,

    /// Shared secret for the admin endpoints. When unset they all answer 403.
    pub cache_secret: Option<String>,

    pub schedule: ScheduleConfig,

    /// Path of the JSON cache file
    pub cache_file: String,

    /// Snapshots older than this are considered stale
    /// Default: 13 hours
    pub cache_max_age: ChronoDuration,

    /// Upstream request timeout
    /// Default: 30 seconds
    pub fetch_timeout: Duration,

    /// Maximum payload size for all requests (in bytes)
    /// Default: 10MB (10 * 1024 * 1024)
    pub max_payload_size: usize,

    pub bind_address: String,
    pub port: u16,

    /// Directory for the daily rolling log files
    pub log_dir: String,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Optional environment variables:
    /// - API_URL, API_KEY, ALLOWED_ORIGIN: upstream jobs API
    /// - CACHE_SECRET: admin shared secret
    /// - SCHEDULE_TIMES: comma-separated HH:MM run times (default: 13:00,21:00)
    /// - SCHEDULE_UTC_OFFSET: reference offset for the run times (default: +01:00)
    /// - CACHE_FILE: cache path (default: .job-cache.json)
    /// - CACHE_MAX_AGE_HOURS: freshness window (default: 13)
    /// - FETCH_TIMEOUT_SECS: upstream request timeout, 0 disables it (default: 30)
    /// - MAX_PAYLOAD_SIZE: Maximum request payload size in bytes (default: 10485760 = 10MB)
    /// - BIND_ADDRESS, PORT: listen address (default: 127.0.0.1:8080)
    /// - LOG_DIR: log directory (default: logs)
    pub fn from_env() -> Result<Self, String> {
        // Load .env file if it exists
        dotenv::dotenv().ok();

        Self::from_vars(|key| env::var(key).ok())
    }

    /// Build the configuration from any variable lookup
    pub fn from_vars<F>(var: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| var(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_key = non_empty("API_KEY")
            .map(|key| key.replace('"', ""))
            .filter(|key| !key.is_empty());

        let schedule = ScheduleConfig::parse(
            &non_empty("SCHEDULE_TIMES").unwrap_or_else(|| "13:00,21:00".to_string()),
            &non_empty("SCHEDULE_UTC_OFFSET").unwrap_or_else(|| "+01:00".to_string()),
        );

        let cache_max_age_hours: i64 = parse_number(&non_empty, "CACHE_MAX_AGE_HOURS", 13)?;
        let fetch_timeout_secs: u64 = parse_number(&non_empty, "FETCH_TIMEOUT_SECS", 30)?;

        Ok(Config {
            api_url: non_empty("API_URL"),
            api_key,
            allowed_origin: non_empty("ALLOWED_ORIGIN"),
            cache_secret: non_empty("CACHE_SECRET"),
            schedule,
            cache_file: non_empty("CACHE_FILE").unwrap_or_else(|| ".job-cache.json".to_string()),
            cache_max_age: ChronoDuration::hours(cache_max_age_hours),
            fetch_timeout: Duration::from_secs(fetch_timeout_secs),
            max_payload_size: parse_number(&non_empty, "MAX_PAYLOAD_SIZE", 10 * 1024 * 1024)?,
            bind_address: non_empty("BIND_ADDRESS").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parse_number(&non_empty, "PORT", 8080)?,
            log_dir: non_empty("LOG_DIR").unwrap_or_else(|| "logs".to_string()),
        })
    }

    pub fn fetcher_settings(&self) -> FetcherSettings {
        FetcherSettings {
            api_url: self.api_url.clone(),
            api_key: self.api_key.clone(),
            allowed_origin: self.allowed_origin.clone(),
            timeout: self.fetch_timeout,
        }
    }
}

fn parse_number<T, F>(var: &F, key: &str, default: T) -> Result<T, String>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(value) => value
            .parse()
            .map_err(|_| format!("{} must be a number, got {:?}", key, value)),
        None => Ok(default),
    }
}
