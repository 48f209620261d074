//! Configuration module
//!
//! Defaults, overlaid by a config file, then environment variables, then
//! command-line flags.

mod env;
mod file;

pub use env::EnvConfig;
use file::{find_config_file, is_yaml_file};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::benchmark::{ReportFormat, RunnerConfig, Targets};
use crate::http::Endpoint;

/// Application configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Benchmark targets
    pub targets: TargetConfig,

    /// TLS posture
    pub tls: TlsConfig,

    /// Sampling settings
    pub runner: RunnerConfig,

    /// Only run these strategies (all when unset)
    pub strategies: Option<Vec<String>>,

    /// Report format (text, json, json-pretty)
    pub format: String,

    /// Connection establishment timeout in milliseconds
    pub connect_timeout_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            targets: TargetConfig::default(),
            tls: TlsConfig::default(),
            runner: RunnerConfig::default(),
            strategies: None,
            format: "text".to_string(),
            connect_timeout_ms: 10_000,
        }
    }
}

impl AppConfig {
    /// Load configuration from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = if is_yaml_file(path) {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?
        } else {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?
        };

        Ok(config)
    }

    /// Load from `path`, or from the first default location that exists
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => match find_config_file() {
                Some(found) => {
                    tracing::debug!("Using config file {}", found.display());
                    Self::load(found)
                }
                None => Ok(Self::default()),
            },
        }
    }

    /// Serialize as YAML
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize config")
    }

    pub fn report_format(&self) -> Result<ReportFormat> {
        ReportFormat::from_str(&self.format)
            .with_context(|| format!("Unknown report format: {}", self.format))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Parsed targets
    pub fn targets(&self) -> Result<Targets> {
        let https = Endpoint::parse(&self.targets.https_url)?;
        let http = Endpoint::parse(&self.targets.http_url)?;
        Ok(Targets { https, http })
    }

    /// Check the configuration before a run
    pub fn validate(&self) -> Result<()> {
        self.runner.validate().context("Invalid runner settings")?;
        self.targets()?;
        self.report_format()?;

        if self.connect_timeout_ms == 0 {
            bail!("connect_timeout_ms must be positive");
        }
        if let Some(strategies) = &self.strategies {
            if strategies.is_empty() {
                bail!("strategies filter is empty");
            }
        }
        Ok(())
    }
}

/// Benchmark target URLs
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Target for TLS strategies
    pub https_url: String,

    /// Target for the cleartext strategy
    pub http_url: String,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            https_url: "https://localhost:8081/".to_string(),
            http_url: "http://localhost:8080/".to_string(),
        }
    }
}

/// TLS settings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    /// Accept self-signed certificates on the benchmark targets
    pub accept_invalid_certs: bool,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            accept_invalid_certs: true,
        }
    }
}
