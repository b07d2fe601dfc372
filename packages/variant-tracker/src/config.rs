use anyhow::{anyhow, Context, Result};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::markers::DEFAULT_MARKER_ATTRIBUTE;
use crate::monitor::AnalysisDiffMode;
use crate::summarizer::openai::DEFAULT_MODEL;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://vwo_ab_tests.db";

/// Storefronts watched when no seeds are configured.
pub const DEFAULT_SEEDS: &[&str] = &[
    "https://www.bragg.com/",
    "https://www.anker.com/",
    "https://www.tonal.com/",
    "https://www.rugsusa.com/",
    "https://www.humnutrition.com/",
    "https://flyingtiger.com/",
    "https://vessi.com/",
    "https://wineracksamerica.com/",
    "https://onecountry.com/",
];

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: Option<String>,
    pub seed_urls: Vec<String>,
    pub crawl_depth: usize,
    pub monitor_interval: Duration,
    pub fetch_timeout: Duration,
    pub summary_timeout: Option<Duration>,
    pub marker_attribute: String,
    pub analysis_diff: AnalysisDiffMode,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<L>(lookup: L) -> Result<Self>
    where
        L: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let seed_urls = match var("SEED_URLS") {
            Some(raw) => parse_seeds(&raw),
            None => DEFAULT_SEEDS.iter().map(|s| s.to_string()).collect(),
        };
        if seed_urls.is_empty() {
            return Err(anyhow!("SEED_URLS must name at least one URL"));
        }

        Ok(Self {
            database_url: var("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            // Older deployments set the misspelled OPENAPI_KEY
            openai_api_key: var("OPENAI_API_KEY").or_else(|| var("OPENAPI_KEY")),
            openai_model: var("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            openai_base_url: var("OPENAI_BASE_URL"),
            seed_urls,
            crawl_depth: parse_or(var("CRAWL_DEPTH"), 1)
                .context("CRAWL_DEPTH must be a non-negative integer")?,
            monitor_interval: Duration::from_secs(
                parse_or(var("MONITOR_INTERVAL_SECS"), 60)
                    .context("MONITOR_INTERVAL_SECS must be a number of seconds")?,
            ),
            fetch_timeout: Duration::from_secs(
                parse_or(var("FETCH_TIMEOUT_SECS"), 10)
                    .context("FETCH_TIMEOUT_SECS must be a number of seconds")?,
            ),
            summary_timeout: var("SUMMARY_TIMEOUT_SECS")
                .map(|raw| raw.trim().parse().map(Duration::from_secs))
                .transpose()
                .context("SUMMARY_TIMEOUT_SECS must be a number of seconds")?,
            marker_attribute: var("MARKER_ATTRIBUTE")
                .unwrap_or_else(|| DEFAULT_MARKER_ATTRIBUTE.to_string()),
            analysis_diff: match var("ANALYSIS_DIFF_MODE") {
                Some(raw) => raw
                    .parse()
                    .map_err(|e: String| anyhow!(e))
                    .context("ANALYSIS_DIFF_MODE is invalid")?,
                None => AnalysisDiffMode::default(),
            },
        })
    }
}

fn parse_seeds(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_or<T: FromStr>(raw: Option<String>, default: T) -> Result<T, T::Err> {
    match raw {
        Some(raw) => raw.trim().parse(),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();

        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.openai_api_key, None);
        assert_eq!(config.openai_model, "gpt-4o-mini");
        assert_eq!(config.seed_urls.len(), DEFAULT_SEEDS.len());
        assert_eq!(config.crawl_depth, 1);
        assert_eq!(config.monitor_interval, Duration::from_secs(60));
        assert_eq!(config.fetch_timeout, Duration::from_secs(10));
        assert_eq!(config.summary_timeout, None);
        assert_eq!(config.marker_attribute, "data-vwo");
        assert_eq!(config.analysis_diff, AnalysisDiffMode::MirrorAnalysis);
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("SEED_URLS", " https://a.com/ , ,https://b.com/"),
            ("CRAWL_DEPTH", "3"),
            ("MONITOR_INTERVAL_SECS", "5"),
            ("SUMMARY_TIMEOUT_SECS", "30"),
            ("ANALYSIS_DIFF_MODE", "delta"),
        ])
        .unwrap();

        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.seed_urls, vec!["https://a.com/", "https://b.com/"]);
        assert_eq!(config.crawl_depth, 3);
        assert_eq!(config.monitor_interval, Duration::from_secs(5));
        assert_eq!(config.summary_timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.analysis_diff, AnalysisDiffMode::AnalysisDelta);
    }

    #[test]
    fn test_api_key_fallback() {
        let config = load(&[("OPENAPI_KEY", "sk-legacy")]).unwrap();
        assert_eq!(config.openai_api_key.as_deref(), Some("sk-legacy"));

        let config = load(&[("OPENAI_API_KEY", "sk-new"), ("OPENAPI_KEY", "sk-legacy")]).unwrap();
        assert_eq!(config.openai_api_key.as_deref(), Some("sk-new"));
    }

    #[test]
    fn test_invalid_values_are_errors() {
        assert!(load(&[("CRAWL_DEPTH", "-1")]).is_err());
        assert!(load(&[("MONITOR_INTERVAL_SECS", "soon")]).is_err());
        assert!(load(&[("ANALYSIS_DIFF_MODE", "both")]).is_err());
        assert!(load(&[("SEED_URLS", " , ")]).is_err());
    }
}
