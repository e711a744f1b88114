//! Process configuration from `.env` and the environment

use std::path::PathBuf;
use std::time::Duration;

use crate::types::{BaseYearPolicy, HpiError, Result};

/// FRED observations endpoint
pub const FRED_BASE_URL: &str = "https://api.stlouisfed.org/fred/series/observations";

/// ONS CSV export of RPI all items (CHAW)
pub const ONS_RPI_URL: &str =
    "https://www.ons.gov.uk/generator?format=csv&uri=/economy/inflationandpriceindices/timeseries/chaw/mm23";

/// HTTP request timeout in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Series cache TTL in seconds (1 day)
const DEFAULT_CACHE_TTL_SECS: i64 = 86_400;

const DEFAULT_DB_PATH: &str = "landreg.db";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// SQLite transaction store
    pub database_path: PathBuf,
    pub fred_api_key: Option<String>,
    pub fred_base_url: String,
    pub ons_rpi_url: String,
    pub request_timeout: Duration,
    /// `None` uses `~/.hpitrack/series`
    pub cache_dir: Option<PathBuf>,
    /// Zero disables the disk cache
    pub cache_ttl_secs: i64,
    pub base_year: BaseYearPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DB_PATH),
            fred_api_key: None,
            fred_base_url: FRED_BASE_URL.to_string(),
            ons_rpi_url: ONS_RPI_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            cache_dir: None,
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            base_year: BaseYearPolicy::RangeEnd,
        }
    }
}

impl Config {
    /// Load `.env` (if present) then read the process environment
    pub fn from_env() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset or blank keys keep defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(path) = get("HPI_DB_PATH") {
            config.database_path = PathBuf::from(path);
        }
        config.fred_api_key = get("FRED_API_KEY");
        if let Some(url) = get("FRED_BASE_URL") {
            config.fred_base_url = url;
        }
        if let Some(url) = get("ONS_RPI_URL") {
            config.ons_rpi_url = url;
        }
        if let Some(secs) = get("HPI_HTTP_TIMEOUT_SECS") {
            let secs: u64 = parse_key("HPI_HTTP_TIMEOUT_SECS", &secs)?;
            if secs == 0 {
                return Err(HpiError::Config(
                    "HPI_HTTP_TIMEOUT_SECS must be positive".into(),
                ));
            }
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(dir) = get("HPI_CACHE_DIR") {
            config.cache_dir = Some(PathBuf::from(dir));
        }
        if let Some(ttl) = get("HPI_CACHE_TTL_SECS") {
            config.cache_ttl_secs = parse_key("HPI_CACHE_TTL_SECS", &ttl)?;
        }
        if let Some(year) = get("HPI_BASE_YEAR") {
            config.base_year = BaseYearPolicy::Fixed(parse_key("HPI_BASE_YEAR", &year)?);
        }

        Ok(config)
    }

    pub fn disk_cache_enabled(&self) -> bool {
        self.cache_ttl_secs > 0
    }
}

fn parse_key<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| HpiError::Config(format!("{} has an invalid value: {:?}", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, Config::default());
        assert!(config.fred_api_key.is_none());
        assert_eq!(config.base_year, BaseYearPolicy::RangeEnd);
    }

    #[test]
    fn test_reads_all_keys() {
        let config = Config::from_lookup(lookup(&[
            ("HPI_DB_PATH", "/data/ppd.db"),
            ("FRED_API_KEY", "abc123"),
            ("HPI_HTTP_TIMEOUT_SECS", "3"),
            ("HPI_CACHE_DIR", "/tmp/series"),
            ("HPI_CACHE_TTL_SECS", "0"),
            ("HPI_BASE_YEAR", "2015"),
        ]))
        .unwrap();

        assert_eq!(config.database_path, PathBuf::from("/data/ppd.db"));
        assert_eq!(config.fred_api_key.as_deref(), Some("abc123"));
        assert_eq!(config.request_timeout, Duration::from_secs(3));
        assert_eq!(config.cache_dir, Some(PathBuf::from("/tmp/series")));
        assert!(!config.disk_cache_enabled());
        assert_eq!(config.base_year, BaseYearPolicy::Fixed(2015));
    }

    #[test]
    fn test_blank_key_treated_as_unset() {
        let config = Config::from_lookup(lookup(&[("FRED_API_KEY", "  ")])).unwrap();
        assert!(config.fred_api_key.is_none());
    }

    #[test]
    fn test_invalid_number_is_config_error() {
        let err = Config::from_lookup(lookup(&[("HPI_BASE_YEAR", "last")])).unwrap_err();
        assert!(matches!(err, HpiError::Config(_)));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = Config::from_lookup(lookup(&[("HPI_HTTP_TIMEOUT_SECS", "0")])).unwrap_err();
        assert!(err.to_string().contains("HPI_HTTP_TIMEOUT_SECS"));
    }
}
