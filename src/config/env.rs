//! Environment variable configuration
//!
//! Provides environment variable overrides for configuration.

use std::env;

use super::AppConfig;

/// Environment variable prefix
const ENV_PREFIX: &str = "PROTOBENCH";

/// Overrides read from `PROTOBENCH_*` variables
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EnvConfig {
    /// PROTOBENCH_HTTPS_URL
    pub https_url: Option<String>,
    /// PROTOBENCH_HTTP_URL
    pub http_url: Option<String>,
    /// PROTOBENCH_MAX_TIME (seconds)
    pub max_time: Option<f64>,
    /// PROTOBENCH_TIMEOUT_MS
    pub timeout_ms: Option<u64>,
    /// PROTOBENCH_TARGET_RME
    pub target_rme: Option<f64>,
    /// PROTOBENCH_STRATEGIES (comma-separated)
    pub strategies: Option<Vec<String>>,
    /// PROTOBENCH_ACCEPT_INVALID_CERTS
    pub accept_invalid_certs: Option<bool>,
    /// PROTOBENCH_FORMAT
    pub format: Option<String>,
    /// PROTOBENCH_CONFIG
    pub config_file: Option<String>,
    /// PROTOBENCH_LOG (tracing filter directive)
    pub log: Option<String>,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self::load_from(|name| env::var(name).ok())
    }

    /// Load using `lookup` to resolve full variable names
    pub fn load_from(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| lookup(&format!("{ENV_PREFIX}_{name}"));

        Self {
            https_url: get("HTTPS_URL"),
            http_url: get("HTTP_URL"),
            max_time: get("MAX_TIME").and_then(|v| v.parse().ok()),
            timeout_ms: get("TIMEOUT_MS").and_then(|v| v.parse().ok()),
            target_rme: get("TARGET_RME").and_then(|v| v.parse().ok()),
            strategies: get("STRATEGIES").map(|v| split_list(&v)),
            accept_invalid_certs: get("ACCEPT_INVALID_CERTS").map(|v| parse_bool(&v)),
            format: get("FORMAT"),
            config_file: get("CONFIG"),
            log: get("LOG"),
        }
    }

    /// Check if any environment variables are set
    pub fn has_any(&self) -> bool {
        *self != Self::default()
    }

    /// Overlay the set variables onto `config`
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(url) = &self.https_url {
            config.targets.https_url = url.clone();
        }
        if let Some(url) = &self.http_url {
            config.targets.http_url = url.clone();
        }
        if let Some(secs) = self.max_time {
            config.runner.max_time_secs = secs;
        }
        if let Some(ms) = self.timeout_ms {
            config.runner.iteration_timeout_ms = ms;
        }
        if let Some(rme) = self.target_rme {
            config.runner.target_rme = rme;
        }
        if let Some(strategies) = &self.strategies {
            config.strategies = Some(strategies.clone());
        }
        if let Some(accept) = self.accept_invalid_certs {
            config.tls.accept_invalid_certs = accept;
        }
        if let Some(format) = &self.format {
            config.format = format.clone();
        }
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.to_lowercase().as_str(),
        "1" | "true" | "yes" | "on" | "enabled"
    )
}
