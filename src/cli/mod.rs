//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::AppConfig;

/// HTTP/1.1 vs HTTP/2 client strategy benchmark
#[derive(Parser, Debug)]
#[command(name = "protobench")]
#[command(version = "0.1.0")]
#[command(about = "Compare request throughput of HTTP/1.1 and HTTP/2 client strategies")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file (YAML or JSON)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the benchmark suite
    Run(RunArgs),

    /// List available strategies
    List(ListArgs),

    /// Inspect the merged configuration
    Config(ConfigArgs),
}

/// Arguments for run command
#[derive(Parser, Debug, Default)]
pub struct RunArgs {
    /// Target for TLS strategies
    #[arg(long)]
    pub https_url: Option<String>,

    /// Target for the cleartext strategy
    #[arg(long)]
    pub http_url: Option<String>,

    /// Only run these strategies (comma-separated names)
    #[arg(long, value_delimiter = ',')]
    pub only: Option<Vec<String>>,

    /// Time budget per strategy in seconds
    #[arg(long)]
    pub max_time: Option<f64>,

    /// Minimum samples before convergence is checked
    #[arg(long)]
    pub min_samples: Option<usize>,

    /// Stop once relative margin of error (%) drops to this value
    #[arg(long)]
    pub target_rme: Option<f64>,

    /// Per-iteration timeout in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Unmeasured warm-up iterations
    #[arg(long)]
    pub warmup: Option<u32>,

    /// Retries for a failed iteration
    #[arg(long)]
    pub retries: Option<u32>,

    /// Stop after this many measured iterations
    #[arg(long)]
    pub max_iterations: Option<u64>,

    /// Output format (text, json, json-pretty)
    #[arg(short, long)]
    pub format: Option<String>,

    /// Save the report to file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Verify server certificates
    #[arg(long)]
    pub strict_tls: bool,
}

impl RunArgs {
    /// Overlay the flags that were given onto `config`
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(url) = &self.https_url {
            config.targets.https_url = url.clone();
        }
        if let Some(url) = &self.http_url {
            config.targets.http_url = url.clone();
        }
        if let Some(only) = &self.only {
            config.strategies = Some(only.iter().map(|s| s.trim().to_string()).collect());
        }
        if let Some(secs) = self.max_time {
            config.runner.max_time_secs = secs;
        }
        if let Some(min) = self.min_samples {
            config.runner.min_samples = min;
        }
        if let Some(rme) = self.target_rme {
            config.runner.target_rme = rme;
        }
        if let Some(ms) = self.timeout_ms {
            config.runner.iteration_timeout_ms = ms;
        }
        if let Some(warmup) = self.warmup {
            config.runner.warmup_iterations = warmup;
        }
        if let Some(retries) = self.retries {
            config.runner.retries = retries;
        }
        if self.max_iterations.is_some() {
            config.runner.max_iterations = self.max_iterations;
        }
        if let Some(format) = &self.format {
            config.format = format.clone();
        }
        if self.strict_tls {
            config.tls.accept_invalid_certs = false;
        }
    }
}

/// Arguments for list command
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Show strategy kind and protocols
    #[arg(short, long)]
    pub detailed: bool,
}

/// Arguments for config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the merged configuration as YAML
    Show,
}
