//! Aggregation of per-sample results into a run report.

use amqload_client::Sample;
use std::fmt;
use std::time::Duration;

/// Summary of a completed run.
#[derive(Debug, Clone)]
pub struct Report {
    /// Total samples recorded, including failures.
    pub total: u64,
    /// Samples that failed.
    pub failed: u64,
    /// Payload bytes moved by successful samples.
    pub bytes: u64,
    /// Wall-clock duration of the whole run.
    pub wall: Duration,
    /// Latencies of successful samples, sorted ascending.
    latencies: Vec<Duration>,
}

impl Report {
    /// Aggregate samples collected over `wall` time.
    #[must_use]
    pub fn from_samples(samples: &[Sample], wall: Duration) -> Self {
        let mut latencies: Vec<Duration> =
            samples.iter().filter(|s| s.is_ok()).map(|s| s.elapsed).collect();
        latencies.sort_unstable();

        Self {
            total: samples.len() as u64,
            failed: samples.iter().filter(|s| !s.is_ok()).count() as u64,
            bytes: samples.iter().filter(|s| s.is_ok()).map(|s| s.bytes).sum(),
            wall,
            latencies,
        }
    }

    /// Successful samples per second over the wall-clock duration.
    #[must_use]
    pub fn throughput(&self) -> f64 {
        let secs = self.wall.as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        (self.total - self.failed) as f64 / secs
    }

    /// Latency at the given percentile (0.0..=100.0) among successful
    /// samples, or `None` when every sample failed.
    #[must_use]
    pub fn latency_percentile(&self, percentile: f64) -> Option<Duration> {
        if self.latencies.is_empty() {
            return None;
        }
        let rank = (percentile / 100.0 * (self.latencies.len() - 1) as f64).round() as usize;
        self.latencies.get(rank.min(self.latencies.len() - 1)).copied()
    }

    /// Mean latency of successful samples.
    #[must_use]
    pub fn latency_mean(&self) -> Option<Duration> {
        if self.latencies.is_empty() {
            return None;
        }
        let total: Duration = self.latencies.iter().sum();
        Some(total / self.latencies.len() as u32)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "samples:    {} ({} failed)", self.total, self.failed)?;
        writeln!(f, "duration:   {:.2}s", self.wall.as_secs_f64())?;
        writeln!(f, "throughput: {:.1} samples/s, {} bytes moved", self.throughput(), self.bytes)?;
        match (self.latency_mean(), self.latencies.first(), self.latencies.last()) {
            (Some(mean), Some(min), Some(max)) => {
                writeln!(
                    f,
                    "latency:    min {:?}, mean {:?}, p50 {:?}, p95 {:?}, p99 {:?}, max {:?}",
                    min,
                    mean,
                    self.latency_percentile(50.0).unwrap_or_default(),
                    self.latency_percentile(95.0).unwrap_or_default(),
                    self.latency_percentile(99.0).unwrap_or_default(),
                    max,
                )
            }
            _ => writeln!(f, "latency:    no successful samples"),
        }
    }
}
