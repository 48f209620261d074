//! Throughput statistics
//!
//! Batches of timed iterations become samples; the spread of the sample
//! periods gives the relative margin of error the runner converges on.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::signal::Completion;

/// Two-sided 95% Student t critical values, indexed by degrees of freedom - 1
const T_TABLE: [f64; 30] = [
    12.706, 4.303, 3.182, 2.776, 2.571, 2.447, 2.365, 2.306, 2.262, 2.228, 2.201, 2.179, 2.16,
    2.145, 2.131, 2.12, 2.11, 2.101, 2.093, 2.086, 2.08, 2.074, 2.069, 2.064, 2.06, 2.056, 2.052,
    2.048, 2.045, 2.042,
];

/// Critical value used past the end of the table
const T_INFINITY: f64 = 1.96;

fn t_critical(degrees_of_freedom: usize) -> f64 {
    match degrees_of_freedom {
        0 => f64::INFINITY,
        df if df <= T_TABLE.len() => T_TABLE[df - 1],
        _ => T_INFINITY,
    }
}

/// One measured batch of successful iterations
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sample {
    pub elapsed: Duration,
    pub iterations: u64,
}

impl Sample {
    pub fn new(elapsed: Duration, iterations: u64) -> Self {
        Self {
            elapsed,
            iterations,
        }
    }

    /// Seconds per iteration
    pub fn period(&self) -> f64 {
        self.elapsed.as_secs_f64() / self.iterations as f64
    }
}

/// Spread of sample periods
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SampleStats {
    /// Mean seconds per iteration
    pub mean: f64,
    pub variance: f64,
    pub std_dev: f64,
    /// Standard error of the mean
    pub sem: f64,
    /// Margin of error at 95% confidence
    pub moe: f64,
    /// Margin of error as a percentage of the mean
    pub rme: f64,
    pub count: usize,
}

impl SampleStats {
    pub fn from_samples(samples: &[Sample]) -> Self {
        let periods: Vec<f64> = samples
            .iter()
            .filter(|s| s.iterations > 0)
            .map(Sample::period)
            .collect();
        let count = periods.len();

        if count == 0 {
            return Self {
                rme: f64::INFINITY,
                ..Default::default()
            };
        }

        let mean = periods.iter().sum::<f64>() / count as f64;
        if count < 2 {
            return Self {
                mean,
                rme: f64::INFINITY,
                count,
                ..Default::default()
            };
        }

        let variance =
            periods.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / (count - 1) as f64;
        let std_dev = variance.sqrt();
        let sem = std_dev / (count as f64).sqrt();
        let moe = sem * t_critical(count - 1);
        let rme = if mean > 0.0 {
            moe / mean * 100.0
        } else {
            f64::INFINITY
        };

        Self {
            mean,
            variance,
            std_dev,
            sem,
            moe,
            rme,
            count,
        }
    }
}

/// Latency percentiles in milliseconds
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Percentiles {
    pub p50: f64,
    pub p90: f64,
    pub p99: f64,
}

impl Percentiles {
    /// Calculate from latencies sorted ascending
    pub fn from_sorted(sorted: &[f64]) -> Self {
        Self {
            p50: percentile(sorted, 50.0),
            p90: percentile(sorted, 90.0),
            p99: percentile(sorted, 99.0),
        }
    }
}

/// Linear interpolation between the closest ranks
fn percentile(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        len => {
            let idx = (p / 100.0) * (len - 1) as f64;
            let lower = idx.floor() as usize;
            let upper = (idx.ceil() as usize).min(len - 1);
            let fraction = idx - lower as f64;
            sorted[lower] * (1.0 - fraction) + sorted[upper] * fraction
        }
    }
}

/// Per-iteration latency in milliseconds
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub percentiles: Percentiles,
    /// Number of latencies measured
    pub count: usize,
}

impl LatencyStats {
    pub fn from_samples(latencies_ms: &[f64]) -> Self {
        if latencies_ms.is_empty() {
            return Self::default();
        }

        let mut sorted = latencies_ms.to_vec();
        sorted.sort_by(f64::total_cmp);

        Self {
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            mean: sorted.iter().sum::<f64>() / sorted.len() as f64,
            percentiles: Percentiles::from_sorted(&sorted),
            count: sorted.len(),
        }
    }
}

/// Finalized throughput estimate for one strategy
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Throughput {
    /// Completed iterations per second of sampling time
    pub ops_per_sec: f64,
    /// Mean seconds per iteration across samples
    pub mean_period: f64,
    pub variance: f64,
    pub std_dev: f64,
    /// Standard error of the mean period
    pub sem: f64,
    /// Margin of error of the mean period at 95% confidence, seconds
    pub moe: f64,
    /// Relative margin of error, percent
    pub rme: f64,
    /// Number of samples (batches)
    pub samples: usize,
    /// Completed iterations across all samples
    pub iterations: u64,
    /// Failed iterations, excluded from everything above
    pub failed_iterations: u64,
    /// Summed duration of the completed iterations, seconds
    pub elapsed_secs: f64,
    pub latency: LatencyStats,
    /// Body bytes drained by the completed iterations
    pub body_bytes: u64,
    /// Protocol of the last completed response
    pub protocol: Option<String>,
}

/// Accumulates timed iterations into samples during the sampling phase
#[derive(Debug, Default)]
pub struct SampleCollector {
    samples: Vec<Sample>,
    latencies_ms: Vec<f64>,
    batch_elapsed: Duration,
    batch_iterations: u64,
    failed: u64,
    body_bytes: u64,
    protocol: Option<String>,
}

impl SampleCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self, elapsed: Duration, completion: &Completion) {
        self.batch_elapsed += elapsed;
        self.batch_iterations += 1;
        self.latencies_ms.push(elapsed.as_secs_f64() * 1000.0);
        self.body_bytes += completion.body_bytes;
        if completion.protocol.is_some() {
            self.protocol.clone_from(&completion.protocol);
        }
    }

    pub fn record_failure(&mut self) {
        self.failed += 1;
    }

    /// Close the current batch. Batches without a success leave no sample.
    pub fn finish_batch(&mut self) -> Option<Sample> {
        if self.batch_iterations == 0 {
            return None;
        }

        let sample = Sample::new(self.batch_elapsed, self.batch_iterations);
        self.samples.push(sample);
        self.batch_elapsed = Duration::ZERO;
        self.batch_iterations = 0;
        Some(sample)
    }

    pub fn stats(&self) -> SampleStats {
        SampleStats::from_samples(&self.samples)
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Completed iterations in closed samples
    pub fn iterations(&self) -> u64 {
        self.samples.iter().map(|s| s.iterations).sum()
    }

    pub fn failed(&self) -> u64 {
        self.failed
    }

    /// Summed elapsed time of closed samples
    pub fn elapsed(&self) -> Duration {
        self.samples.iter().map(|s| s.elapsed).sum()
    }

    /// Turn the collected samples into a throughput estimate.
    ///
    /// `None` when nothing completed in measurable time.
    pub fn finalize(mut self) -> Option<Throughput> {
        self.finish_batch();

        let iterations = self.iterations();
        let elapsed = self.elapsed();
        if iterations == 0 || elapsed.is_zero() {
            return None;
        }

        let stats = self.stats();
        Some(Throughput {
            ops_per_sec: iterations as f64 / elapsed.as_secs_f64(),
            mean_period: stats.mean,
            variance: stats.variance,
            std_dev: stats.std_dev,
            sem: stats.sem,
            moe: stats.moe,
            rme: stats.rme,
            samples: stats.count,
            iterations,
            failed_iterations: self.failed,
            elapsed_secs: elapsed.as_secs_f64(),
            latency: LatencyStats::from_samples(&self.latencies_ms),
            body_bytes: self.body_bytes,
            protocol: self.protocol,
        })
    }
}
