//! Application configuration loaded from environment variables.
//!
//! A `.env` file in the working directory is honored for local development.
//! The `EXPO_PUBLIC_*` names used by the mobile build are accepted as
//! fallbacks so one `.env` can serve both.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_API_URL: &str = "http://localhost:8000/api";
const DEFAULT_REDIRECT_URL: &str = "exp://localhost:8081";
const DEFAULT_STORE_PATH: &str = ".foodmagic/storage.json";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// FoodMagic backend base URL (without trailing slash)
    pub api_url: String,
    /// Supabase project URL
    pub supabase_url: String,
    /// Supabase anon (public) key
    pub supabase_anon_key: String,
    /// Where the OAuth flow redirects after Google sign-in
    pub redirect_url: String,
    /// Local persisted store file
    pub store_path: PathBuf,
    /// Timeout applied to every remote request
    pub request_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let timeout_secs = match env::var("FOODMAGIC_REQUEST_TIMEOUT_SECS") {
            Ok(raw) => parse_timeout_secs(&raw)?,
            Err(_) => DEFAULT_REQUEST_TIMEOUT_SECS,
        };

        Ok(Self {
            api_url: trim_base_url(
                &env::var("FOODMAGIC_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
            ),
            supabase_url: trim_base_url(
                &var_with_fallback("SUPABASE_URL", "EXPO_PUBLIC_SUPABASE_URL")
                    .ok_or(ConfigError::Missing("SUPABASE_URL"))?,
            ),
            supabase_anon_key: var_with_fallback(
                "SUPABASE_ANON_KEY",
                "EXPO_PUBLIC_SUPABASE_ANON_KEY",
            )
            .map(|v| v.trim().to_string())
            .ok_or(ConfigError::Missing("SUPABASE_ANON_KEY"))?,
            redirect_url: var_with_fallback("REDIRECT_URL", "EXPO_PUBLIC_REDIRECT_URL")
                .unwrap_or_else(|| DEFAULT_REDIRECT_URL.to_string()),
            store_path: env::var("FOODMAGIC_STORE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_STORE_PATH)),
            request_timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            api_url: "http://127.0.0.1:8000/api".to_string(),
            supabase_url: "http://127.0.0.1:54321".to_string(),
            supabase_anon_key: "test_anon_key".to_string(),
            redirect_url: DEFAULT_REDIRECT_URL.to_string(),
            store_path: PathBuf::from("target/test-storage.json"),
            request_timeout: Duration::from_secs(5),
        }
    }
}

/// Read `primary`, falling back to `fallback`; blank values count as unset.
pub fn var_with_fallback(primary: &str, fallback: &str) -> Option<String> {
    env::var(primary)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .or_else(|| env::var(fallback).ok().filter(|v| !v.trim().is_empty()))
}

fn trim_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

fn parse_timeout_secs(raw: &str) -> Result<u64, ConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(0) | Err(_) => Err(ConfigError::Invalid {
            name: "FOODMAGIC_REQUEST_TIMEOUT_SECS",
            value: raw.to_string(),
        }),
        Ok(secs) => Ok(secs),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}
