//! Runtime settings resolved from the environment.
//!
//! Everything has a sane default so the service boots with no configuration
//! at all; `.env` is honored in development via `dotenvy` (loaded in `main`).

use std::time::Duration;

pub const ENV_BASE_URL: &str = "DIGEST_BASE_URL";
pub const ENV_BIND_ADDR: &str = "DIGEST_BIND_ADDR";
pub const ENV_CACHE_TTL_SECS: &str = "DIGEST_CACHE_TTL_SECS";
pub const ENV_FETCH_TIMEOUT_SECS: &str = "DIGEST_FETCH_TIMEOUT_SECS";
pub const ENV_FETCH_CONCURRENCY: &str = "DIGEST_FETCH_CONCURRENCY";

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8788";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_FETCH_CONCURRENCY: usize = 8;

/// User-Agent sent with every outbound feed fetch.
pub const FEED_USER_AGENT: &str = "Mozilla/5.0 (compatible; PoliticalDigest/1.0)";

/// Relative catalog locations under the configured base URL.
pub const FEEDS_CATALOG_PATH: &str = "/feeds.json";
pub const SOURCES_CATALOG_PATH: &str = "/data/democratic-sources.json";

#[derive(Debug, Clone)]
pub struct Settings {
    /// Origin serving `feeds.json` and `data/democratic-sources.json`.
    pub base_url: String,
    pub bind_addr: String,
    pub cache_ttl: Duration,
    pub fetch_timeout: Duration,
    pub fetch_concurrency: usize,
}

impl Settings {
    pub fn from_env() -> Self {
        Self {
            base_url: trimmed_env(ENV_BASE_URL).unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            bind_addr: trimmed_env(ENV_BIND_ADDR).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            cache_ttl: Duration::from_secs(
                parse_u64_env(ENV_CACHE_TTL_SECS, DEFAULT_CACHE_TTL_SECS, 1, 86_400),
            ),
            fetch_timeout: Duration::from_secs(parse_u64_env(
                ENV_FETCH_TIMEOUT_SECS,
                DEFAULT_FETCH_TIMEOUT_SECS,
                1,
                60,
            )),
            fetch_concurrency: parse_u64_env(
                ENV_FETCH_CONCURRENCY,
                DEFAULT_FETCH_CONCURRENCY as u64,
                1,
                64,
            ) as usize,
        }
    }

    pub fn cache_ttl_secs(&self) -> u64 {
        self.cache_ttl.as_secs()
    }

    pub fn feeds_catalog_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), FEEDS_CATALOG_PATH)
    }

    pub fn sources_catalog_url(&self) -> String {
        format!(
            "{}{}",
            self.base_url.trim_end_matches('/'),
            SOURCES_CATALOG_PATH
        )
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            fetch_concurrency: DEFAULT_FETCH_CONCURRENCY,
        }
    }
}

fn trimmed_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse an integer env var, clamped to `[min, max]`; unset or unparseable
/// values fall back to `default`.
fn parse_u64_env(name: &str, default: u64, min: u64, max: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .unwrap_or(default)
        .clamp(min, max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_applied_without_env() {
        let s = Settings::default();
        assert_eq!(s.cache_ttl_secs(), 300);
        assert_eq!(s.fetch_concurrency, 8);
        assert_eq!(s.fetch_timeout, Duration::from_secs(10));
    }

    #[test]
    fn catalog_urls_tolerate_trailing_slash() {
        let mut s = Settings::default();
        s.base_url = "https://digest.example.org/".to_string();
        assert_eq!(
            s.feeds_catalog_url(),
            "https://digest.example.org/feeds.json"
        );
        assert_eq!(
            s.sources_catalog_url(),
            "https://digest.example.org/data/democratic-sources.json"
        );
    }

    #[test]
    fn parse_clamps_out_of_range_values() {
        std::env::set_var("DIGEST_TEST_CLAMP", "9999");
        assert_eq!(parse_u64_env("DIGEST_TEST_CLAMP", 10, 1, 60), 60);
        std::env::set_var("DIGEST_TEST_CLAMP", "not-a-number");
        assert_eq!(parse_u64_env("DIGEST_TEST_CLAMP", 10, 1, 60), 10);
        std::env::remove_var("DIGEST_TEST_CLAMP");
    }
}
