//! Benchmark report generation
//!
//! Ranks finalized strategy results and renders them as text or JSON.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::Ordering;

use super::runner::{Outcome, StrategyResult};

/// Width the strategy name column is padded to
const NAME_WIDTH: usize = 38;

/// Report output format
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReportFormat {
    /// One aligned line per strategy
    Text,
    /// JSON format
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

impl ReportFormat {
    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "table" => Some(Self::Text),
            "json" => Some(Self::Json),
            "json-pretty" => Some(Self::JsonPretty),
            _ => None,
        }
    }
}

/// Results of one run, in registration order
#[derive(Clone, Debug, Serialize)]
pub struct BenchmarkReport {
    pub generated_at: DateTime<Utc>,
    pub results: Vec<StrategyResult>,
}

/// Results ordered fastest first, failed strategies last
#[derive(Debug)]
pub struct RankedSummary<'a> {
    pub entries: Vec<&'a StrategyResult>,
    pub fastest: Option<&'a str>,
}

impl BenchmarkReport {
    pub fn new(results: Vec<StrategyResult>) -> Self {
        debug_assert!(
            results
                .iter()
                .enumerate()
                .all(|(i, r)| results[..i].iter().all(|o| o.name != r.name)),
            "strategy names must be unique"
        );

        Self {
            generated_at: Utc::now(),
            results,
        }
    }

    /// Rank by throughput, descending; ties go to the lexically smaller
    /// name. Failed strategies follow in registration order.
    pub fn ranked(&self) -> RankedSummary<'_> {
        let mut completed: Vec<&StrategyResult> =
            self.results.iter().filter(|r| !r.is_failed()).collect();
        completed.sort_by(|a, b| compare(a, b));

        let fastest = completed.first().map(|r| r.name.as_str());
        let mut entries = completed;
        entries.extend(self.results.iter().filter(|r| r.is_failed()));

        RankedSummary { entries, fastest }
    }
}

fn compare(a: &StrategyResult, b: &StrategyResult) -> Ordering {
    let ops = |r: &StrategyResult| r.throughput().map_or(0.0, |t| t.ops_per_sec);
    ops(b)
        .total_cmp(&ops(a))
        .then_with(|| a.name.cmp(&b.name))
}

/// Renders reports for display
pub struct ResultReporter;

impl ResultReporter {
    pub fn render(report: &BenchmarkReport, format: ReportFormat) -> serde_json::Result<String> {
        match format {
            ReportFormat::Text => Ok(Self::text(report)),
            ReportFormat::Json => serde_json::to_string(&Self::json(report)),
            ReportFormat::JsonPretty => serde_json::to_string_pretty(&Self::json(report)),
        }
    }

    fn text(report: &BenchmarkReport) -> String {
        let ranked = report.ranked();
        let mut output = String::new();

        for result in &ranked.entries {
            output.push_str(&Self::line(result));
            output.push('\n');
        }

        match ranked.fastest {
            Some(name) => output.push_str(&format!("Fastest is {name}")),
            None => output.push_str("Fastest is n/a"),
        }
        output
    }

    /// One aligned line for a strategy
    fn line(result: &StrategyResult) -> String {
        let label = format!("{} ", result.name);
        match &result.outcome {
            Outcome::Completed { throughput: t, .. } => format!(
                "{:<width$}x {} ops/sec ±{:.2}% ({} run{} sampled)",
                label,
                format_ops(t.ops_per_sec),
                t.rme,
                t.samples,
                if t.samples == 1 { "" } else { "s" },
                width = NAME_WIDTH
            ),
            Outcome::Failed { reason } => {
                format!("{:<width$}x FAILED: {}", label, reason, width = NAME_WIDTH)
            }
        }
    }

    fn json(report: &BenchmarkReport) -> JsonReport<'_> {
        let ranked = report.ranked();
        JsonReport {
            generated_at: report.generated_at,
            fastest: ranked.fastest,
            ranking: ranked.entries.iter().map(|r| r.name.as_str()).collect(),
            results: &report.results,
        }
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    generated_at: DateTime<Utc>,
    fastest: Option<&'a str>,
    ranking: Vec<&'a str>,
    results: &'a [StrategyResult],
}

/// Two decimals below 100 ops/sec, otherwise whole numbers with thousands
/// separators
fn format_ops(ops: f64) -> String {
    if ops < 100.0 {
        return format!("{ops:.2}");
    }

    let digits = format!("{:.0}", ops);
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    grouped
}
