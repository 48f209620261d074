//! protobench - HTTP/1.1 vs HTTP/2 client strategy benchmark
//!
//! Drives the same GET request through several client strategies (fresh
//! connections, pooled keep-alive, persistent HTTP/2 sessions, ALPN
//! negotiation) and reports statistically sampled throughput for each.
//!
//! ## Usage
//!
//! ```bash
//! # Benchmark every strategy against the default local targets
//! protobench run
//!
//! # Pick strategies and targets
//! protobench run --only "http2 - pooled,https" --https-url https://10.0.0.5:8443/
//!
//! # Machine-readable report
//! protobench run --format json-pretty --output report.json
//!
//! # List strategies
//! protobench list --detailed
//! ```

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{debug, info};

mod benchmark;
mod cli;
mod config;
mod http;
mod utils;

use benchmark::{build_catalog, select, BenchmarkRunner, BenchmarkSuite, ResultReporter, CATALOG};
use cli::Args;
use config::{AppConfig, EnvConfig};
use utils::{init_logger, LogLevel};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let env = EnvConfig::load();

    init_logger(LogLevel::from_verbose(args.verbose), env.log.as_deref());

    match args.command {
        cli::Command::Run(run_args) => {
            let config = load_config(args.config.as_deref(), &env)?;
            run_benchmark(config, run_args).await?;
        }
        cli::Command::List(list_args) => {
            list_strategies(list_args);
        }
        cli::Command::Config(config_args) => match config_args.action {
            cli::ConfigAction::Show => {
                let config = load_config(args.config.as_deref(), &env)?;
                print!("{}", config.to_yaml()?);
            }
        },
    }

    Ok(())
}

/// File (explicit, or the first default location), then environment
fn load_config(path: Option<&std::path::Path>, env: &EnvConfig) -> Result<AppConfig> {
    let env_path = env.config_file.as_deref().map(std::path::Path::new);
    let mut config = AppConfig::load_or_default(path.or(env_path))?;

    if env.has_any() {
        debug!("Applying PROTOBENCH_* environment overrides");
    }
    env.apply(&mut config);
    Ok(config)
}

async fn run_benchmark(mut config: AppConfig, args: cli::RunArgs) -> Result<()> {
    args.apply(&mut config);
    config.validate()?;

    let format = config.report_format()?;
    let targets = config.targets()?;
    let entries = select(config.strategies.as_deref())?;

    info!(
        "Benchmarking {} strategies against {} and {}",
        entries.len(),
        targets.https.url(),
        targets.http.url()
    );
    if config.tls.accept_invalid_certs {
        debug!("Certificate verification disabled for benchmark targets");
    }

    let catalog = build_catalog(
        &targets,
        &entries,
        config.tls.accept_invalid_certs,
        config.connect_timeout(),
    )
    .await?;

    let mut suite = BenchmarkSuite::new(BenchmarkRunner::new(config.runner.clone()));
    for strategy in catalog.strategies {
        suite.add(strategy)?;
    }
    for session in catalog.run_sessions {
        suite.share_session(session);
    }
    if suite.is_empty() {
        bail!("No strategies selected");
    }

    let report = suite.run().await;
    let rendered = ResultReporter::render(&report, format).context("Failed to render report")?;
    println!("{rendered}");

    if let Some(path) = args.output {
        std::fs::write(&path, &rendered)
            .with_context(|| format!("Failed to write report: {}", path.display()))?;
        info!("Report saved to {}", path.display());
    }

    Ok(())
}

fn list_strategies(args: cli::ListArgs) {
    println!("\nStrategies ({} total, run in this order)\n", CATALOG.len());

    for (i, entry) in CATALOG.iter().enumerate() {
        if args.detailed {
            println!(
                "  {}. {:32} {:28} [{}] {}",
                i + 1,
                entry.name,
                entry.kind.to_string(),
                entry.protocols,
                entry.scheme.as_str()
            );
        } else {
            println!("  {}. {}", i + 1, entry.name);
        }
    }
    println!();
}
