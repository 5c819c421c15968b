//! Configuration loaded from environment variables.
//!
//! Every setting has a default so the service starts with no environment at
//! all. Values that fail to parse fall back to the default.

use std::env;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::fraud::{DEFAULT_BURST_THRESHOLD, DEFAULT_BURST_WINDOW_HOURS, DetectorConfig};
use crate::insight::{
    ChatInsightClient, DEFAULT_INSIGHT_API_BASE, DEFAULT_INSIGHT_MODEL, DisabledInsight,
    InsightProvider,
};
use crate::job::{DEFAULT_RECENT_LOG_LIMIT, JobSettings};

/// Default port if not specified via environment variable.
const DEFAULT_PORT: u16 = 3000;

/// Default database path if not specified via environment variable.
const DEFAULT_DB_PATH: &str = "sqlite:ai_manager.db?mode=rwc";

/// Default upper bound for the insight request.
const DEFAULT_INSIGHT_TIMEOUT_SECS: u64 = 30;

/// Longest accepted burst window, ten years.
const MAX_BURST_WINDOW_HOURS: i64 = 24 * 365 * 10;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub job: JobSettings,
    pub insight: InsightConfig,
}

#[derive(Debug, Clone)]
pub struct InsightConfig {
    /// Insights are disabled when unset.
    pub api_key: Option<String>,
    pub api_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let burst_threshold: usize =
            parse_or(lookup("AI_MANAGER_BURST_THRESHOLD"), DEFAULT_BURST_THRESHOLD);
        let burst_window_hours: i64 =
            parse_or(lookup("AI_MANAGER_BURST_WINDOW_HOURS"), DEFAULT_BURST_WINDOW_HOURS);

        Self {
            port: parse_or(lookup("AI_MANAGER_PORT"), DEFAULT_PORT),
            database_url: lookup("AI_MANAGER_DATABASE_URL")
                .unwrap_or_else(|| DEFAULT_DB_PATH.to_string()),
            job: JobSettings {
                detector: DetectorConfig {
                    burst_threshold,
                    burst_window: burst_window(burst_window_hours),
                    relog_flagged: parse_or(lookup("AI_MANAGER_RELOG_FLAGGED"), false),
                },
                recent_log_limit: parse_or(
                    lookup("AI_MANAGER_RECENT_LOG_LIMIT"),
                    DEFAULT_RECENT_LOG_LIMIT,
                ),
            },
            insight: InsightConfig {
                api_key: lookup("AI_INSIGHT_API_KEY").filter(|k| !k.trim().is_empty()),
                api_url: lookup("AI_INSIGHT_API_URL")
                    .unwrap_or_else(|| DEFAULT_INSIGHT_API_BASE.to_string()),
                model: lookup("AI_INSIGHT_MODEL")
                    .unwrap_or_else(|| DEFAULT_INSIGHT_MODEL.to_string()),
                timeout: Duration::from_secs(parse_or(
                    lookup("AI_INSIGHT_TIMEOUT_SECS"),
                    DEFAULT_INSIGHT_TIMEOUT_SECS,
                )),
            },
        }
    }
}

impl InsightConfig {
    /// The chat client when an API key is configured, otherwise a no-op provider.
    pub fn build_provider(&self) -> anyhow::Result<Arc<dyn InsightProvider>> {
        let Some(key) = &self.api_key else {
            return Ok(Arc::new(DisabledInsight));
        };

        let client = if self.api_url == DEFAULT_INSIGHT_API_BASE {
            ChatInsightClient::new(key, &self.model, self.timeout)?
        } else {
            ChatInsightClient::with_base_url(&self.api_url, key, &self.model, self.timeout)?
        };
        Ok(Arc::new(client))
    }

    pub fn is_enabled(&self) -> bool {
        self.api_key.is_some()
    }
}

/// Out-of-range windows fall back to the default.
fn burst_window(hours: i64) -> chrono::Duration {
    let hours = if (1..=MAX_BURST_WINDOW_HOURS).contains(&hours) {
        hours
    } else {
        DEFAULT_BURST_WINDOW_HOURS
    };
    chrono::Duration::try_hours(hours)
        .unwrap_or_else(|| chrono::Duration::hours(DEFAULT_BURST_WINDOW_HOURS))
}

fn parse_or<T: FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}
