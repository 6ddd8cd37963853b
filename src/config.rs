use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::AppError;
use crate::models::knowledge_base::IndexingParams;

pub const DEFAULT_API_URL: &str = "https://api.stack-ai.com";
const DB_FILE_NAME: &str = "drivepick.db";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_url: String,
    pub access_token: Option<String>,
    pub org_id: Option<String>,
    pub db_path: PathBuf,
    pub request_timeout_secs: u64,
    pub dedupe_interval: Duration,
    pub cache_ttl: Duration,
    pub log_filter: String,
    pub indexing_params: IndexingParams,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            access_token: None,
            org_id: None,
            db_path: default_db_path(),
            request_timeout_secs: 30,
            dedupe_interval: Duration::from_millis(5000),
            cache_ttl: Duration::from_millis(30_000),
            log_filter: "info".to_string(),
            indexing_params: IndexingParams::default(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from any key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let request_timeout_secs = match get("DRIVEPICK_REQUEST_TIMEOUT_SECS") {
            Some(raw) => parse_number("DRIVEPICK_REQUEST_TIMEOUT_SECS", &raw)?,
            None => defaults.request_timeout_secs,
        };
        let dedupe_interval = match get("DRIVEPICK_DEDUPE_MS") {
            Some(raw) => Duration::from_millis(parse_number("DRIVEPICK_DEDUPE_MS", &raw)?),
            None => defaults.dedupe_interval,
        };
        let cache_ttl = match get("DRIVEPICK_CACHE_TTL_MS") {
            Some(raw) => Duration::from_millis(parse_number("DRIVEPICK_CACHE_TTL_MS", &raw)?),
            None => defaults.cache_ttl,
        };

        Ok(Self {
            api_url: get("DRIVEPICK_API_URL").unwrap_or(defaults.api_url),
            access_token: get("DRIVEPICK_ACCESS_TOKEN"),
            org_id: get("DRIVEPICK_ORG_ID"),
            db_path: get("DRIVEPICK_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            request_timeout_secs,
            dedupe_interval,
            cache_ttl,
            log_filter: get("DRIVEPICK_LOG").unwrap_or(defaults.log_filter),
            indexing_params: defaults.indexing_params,
        })
    }
}

fn parse_number<T>(key: &str, raw: &str) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|err| AppError::Config(format!("invalid {key}: {err}")))
}

fn default_db_path() -> PathBuf {
    directories::ProjectDirs::from("com", "drivepick", "drivepick")
        .map(|dirs| dirs.data_dir().join(DB_FILE_NAME))
        .unwrap_or_else(|| PathBuf::from(DB_FILE_NAME))
}
