use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::scrapers::{BrowserSettings, SiteProfile};

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub site: SiteProfile,
    pub browser: BrowserSettings,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = BrowserSettings::default();

        let mut site = SiteProfile::magicbricks();
        if let Some(prefix) = lookup("LISTING_URL_PREFIX") {
            site = site.with_url_prefix(prefix);
        }

        Ok(Self {
            database_url: lookup("DATABASE_URL")
                .unwrap_or_else(|| "sqlite://properties.db?mode=rwc".to_string()),
            port: parse_or(&lookup, "PORT", 8000)?,
            site,
            browser: BrowserSettings {
                headless: parse_or(&lookup, "CHROME_HEADLESS", defaults.headless)?,
                window_size: defaults.window_size,
                navigation_timeout: Duration::from_secs(parse_or(
                    &lookup,
                    "NAVIGATION_TIMEOUT_SECS",
                    defaults.navigation_timeout.as_secs(),
                )?),
                content_timeout: Duration::from_secs(parse_or(
                    &lookup,
                    "CONTENT_TIMEOUT_SECS",
                    defaults.content_timeout.as_secs(),
                )?),
                network_idle: Duration::from_millis(parse_or(
                    &lookup,
                    "NETWORK_IDLE_MS",
                    defaults.network_idle.as_millis() as u64,
                )?),
            },
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} must be a valid value, got {:?}", key, raw)),
        None => Ok(default),
    }
}
