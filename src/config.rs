use std::{env, path::PathBuf, time::Duration};

use anyhow::{Context, Result, bail};

const DEFAULT_API_URL: &str = "http://localhost:5000";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_SESSION_STORE_PATH: &str = "data/session.json";
const DEFAULT_SUBJECTS_ENDPOINT: &str = "/subjects";
const DEFAULT_API_TIMEOUT_SECS: u64 = 15;
const DEFAULT_SESSION_TTL_DAYS: i64 = 7;

/// Runtime settings, read once from the environment at startup.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api_url: String,
    pub port: u16,
    pub session_store_path: PathBuf,
    pub subjects_endpoint: String,
    pub form_schema_path: Option<PathBuf>,
    pub api_timeout: Duration,
    pub session_ttl_days: i64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            port: DEFAULT_PORT,
            session_store_path: PathBuf::from(DEFAULT_SESSION_STORE_PATH),
            subjects_endpoint: DEFAULT_SUBJECTS_ENDPOINT.to_string(),
            form_schema_path: None,
            api_timeout: Duration::from_secs(DEFAULT_API_TIMEOUT_SECS),
            session_ttl_days: DEFAULT_SESSION_TTL_DAYS,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let api_url = lookup("CAPTURE_API_URL")
            .map(|url| normalize_base_url(&url))
            .unwrap_or(defaults.api_url);
        if !api_url.starts_with("http://") && !api_url.starts_with("https://") {
            bail!("CAPTURE_API_URL must be an http(s) URL, got {api_url}");
        }

        let port = match lookup("PORT") {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("PORT is not a valid port number: {raw}"))?,
            None => defaults.port,
        };

        let session_store_path = lookup("SESSION_STORE_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.session_store_path);

        let subjects_endpoint = lookup("SUBJECTS_ENDPOINT")
            .map(|path| normalize_endpoint(&path))
            .unwrap_or(defaults.subjects_endpoint);

        let form_schema_path = lookup("FORM_SCHEMA_PATH")
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from);

        let api_timeout = match lookup("API_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(
                raw.trim()
                    .parse()
                    .with_context(|| format!("API_TIMEOUT_SECS is not a number: {raw}"))?,
            ),
            None => defaults.api_timeout,
        };

        let session_ttl_days = match lookup("SESSION_TTL_DAYS") {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("SESSION_TTL_DAYS is not a number: {raw}"))?,
            None => defaults.session_ttl_days,
        };

        Ok(Self {
            api_url,
            port,
            session_store_path,
            subjects_endpoint,
            form_schema_path,
            api_timeout,
            session_ttl_days,
        })
    }
}

fn normalize_base_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}

fn normalize_endpoint(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}
