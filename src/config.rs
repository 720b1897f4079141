use serde::Deserialize;
use std::time::Duration;

/// Hard ceiling for `MAX_RESULTS_CAP`, whatever the environment says.
pub const MAX_RESULTS_CEILING: usize = 500;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    pub google_maps_api_key: String,
    pub places_base_url: String,
    pub places_language_code: String,
    pub places_region_code: Option<String>,
    pub places_max_pages: usize,
    pub default_max_results: usize,
    pub max_results_cap: usize,
    pub http_timeout_secs: u64,
    pub scrape_timeout_secs: u64,
    pub session_ttl_secs: u64,
    /// Most sessions kept at once. Least recently used ones are evicted first.
    pub session_capacity: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let max_results_cap = parse_env("MAX_RESULTS_CAP", 200usize)?;
        if max_results_cap == 0 {
            anyhow::bail!("MAX_RESULTS_CAP must be at least 1");
        }
        let max_results_cap = max_results_cap.min(MAX_RESULTS_CEILING);

        let default_max_results = parse_env("DEFAULT_MAX_RESULTS", 20usize)?;
        if default_max_results == 0 {
            anyhow::bail!("DEFAULT_MAX_RESULTS must be at least 1");
        }

        let config = Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            google_maps_api_key: std::env::var("GOOGLE_MAPS_API_KEY")
                .map_err(|_| anyhow::anyhow!("GOOGLE_MAPS_API_KEY environment variable required"))
                .and_then(|key| {
                    if key.trim().is_empty() {
                        anyhow::bail!("GOOGLE_MAPS_API_KEY cannot be empty");
                    }
                    Ok(key)
                })?,
            places_base_url: std::env::var("PLACES_BASE_URL")
                .unwrap_or_else(|_| "https://places.googleapis.com/v1".to_string())
                .trim_end_matches('/')
                .to_string(),
            places_language_code: std::env::var("PLACES_LANGUAGE_CODE")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "en".to_string()),
            places_region_code: match std::env::var("PLACES_REGION_CODE") {
                Ok(code) if code.trim().is_empty() => None,
                Ok(code) => Some(code),
                Err(_) => Some("US".to_string()),
            },
            places_max_pages: parse_env("PLACES_MAX_PAGES", 3usize)?.max(1),
            default_max_results: default_max_results.min(max_results_cap),
            max_results_cap,
            http_timeout_secs: parse_env("HTTP_TIMEOUT_SECS", 30u64)?,
            scrape_timeout_secs: parse_env("SCRAPE_TIMEOUT_SECS", 120u64)?,
            session_ttl_secs: parse_env("SESSION_TTL_SECS", 3600u64)?,
            session_capacity: parse_env("SESSION_CAPACITY", 100_000u64)?,
        };
        config.validate()?;

        // Never log the API key
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Places Base URL: {}", config.places_base_url);
        tracing::debug!(
            "Result limits: default {}, cap {}",
            config.default_max_results,
            config.max_results_cap
        );
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }

    /// Rejects settings the service cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.places_base_url.starts_with("http://")
            && !self.places_base_url.starts_with("https://")
        {
            anyhow::bail!("PLACES_BASE_URL must start with http:// or https://");
        }
        if self.http_timeout_secs == 0 {
            anyhow::bail!("HTTP_TIMEOUT_SECS must be at least 1");
        }
        if self.scrape_timeout_secs == 0 {
            anyhow::bail!("SCRAPE_TIMEOUT_SECS must be at least 1");
        }
        // A session idling out mid-scrape would lose its Busy guard
        if self.session_ttl_secs <= self.scrape_timeout_secs {
            anyhow::bail!("SESSION_TTL_SECS must be greater than SCRAPE_TIMEOUT_SECS");
        }
        if self.session_capacity == 0 {
            anyhow::bail!("SESSION_CAPACITY must be at least 1");
        }
        Ok(())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn scrape_timeout(&self) -> Duration {
        Duration::from_secs(self.scrape_timeout_secs)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 5000,
            google_maps_api_key: String::new(),
            places_base_url: "https://places.googleapis.com/v1".to_string(),
            places_language_code: "en".to_string(),
            places_region_code: Some("US".to_string()),
            places_max_pages: 3,
            default_max_results: 20,
            max_results_cap: 200,
            http_timeout_secs: 30,
            scrape_timeout_secs: 120,
            session_ttl_secs: 3600,
            session_capacity: 100_000,
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> anyhow::Result<T> {
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{} must be a non-negative integer", name)),
        _ => Ok(default),
    }
}
