//! Round-trip latency accounting.
//!
//! Samples are buffered for the whole session so the final summary can
//! report exact percentiles. Checkpoints are purely observational: they are
//! logged as they happen and kept for the summary, nothing else reacts to
//! them.

use chrono::{DateTime, Utc};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::info;

/// One matched request/acknowledgment pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencySample {
    pub order_id: u64,
    pub sent_at: Instant,
    pub acked_at: Instant,
}

impl LatencySample {
    pub fn latency(&self) -> Duration {
        self.acked_at.saturating_duration_since(self.sent_at)
    }
}

/// Progress snapshot taken every `interval` completed orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    pub completed: u64,
    pub last_latency: Duration,
    pub elapsed: Duration,
}

/// Aggregated session statistics.
#[derive(Debug, Clone)]
pub struct Summary {
    pub started_at: DateTime<Utc>,
    pub count: u64,
    pub min: Option<Duration>,
    pub max: Option<Duration>,
    pub mean: Option<Duration>,
    pub p50: Option<Duration>,
    pub p90: Option<Duration>,
    pub p99: Option<Duration>,
    pub elapsed: Duration,
    pub checkpoints: Vec<Checkpoint>,
}

impl Summary {
    /// Completed orders per second of wall time.
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.count as f64 / secs
        } else {
            0.0
        }
    }
}

/// Collects samples and emits periodic checkpoints.
#[derive(Debug)]
pub struct LatencyReporter {
    started: Instant,
    started_at: DateTime<Utc>,
    /// Checkpoint every N samples (0 = never)
    interval: u64,
    samples: Vec<LatencySample>,
    total: Duration,
    min: Option<Duration>,
    max: Option<Duration>,
    checkpoints: Vec<Checkpoint>,
}

impl LatencyReporter {
    /// Start a reporter; elapsed time is measured from now.
    pub fn new(interval: u64, expected: usize) -> Self {
        Self {
            started: Instant::now(),
            started_at: Utc::now(),
            interval,
            samples: Vec::with_capacity(expected),
            total: Duration::ZERO,
            min: None,
            max: None,
            checkpoints: Vec::new(),
        }
    }

    /// Record a sample, returning the checkpoint it completed, if any.
    pub fn record(&mut self, sample: LatencySample) -> Option<Checkpoint> {
        let latency = sample.latency();
        self.total += latency;
        self.min = Some(self.min.map_or(latency, |m| m.min(latency)));
        self.max = Some(self.max.map_or(latency, |m| m.max(latency)));
        self.samples.push(sample);

        let completed = self.samples.len() as u64;
        if self.interval == 0 || completed % self.interval != 0 {
            return None;
        }

        let checkpoint = Checkpoint {
            completed,
            last_latency: latency,
            elapsed: sample.acked_at.saturating_duration_since(self.started),
        };
        info!(
            completed,
            last_rtt_us = latency.as_secs_f64() * 1e6,
            elapsed_s = checkpoint.elapsed.as_secs_f64(),
            "Checkpoint"
        );
        self.checkpoints.push(checkpoint);
        Some(checkpoint)
    }

    /// Number of samples recorded so far.
    pub fn count(&self) -> u64 {
        self.samples.len() as u64
    }

    /// Aggregate everything recorded so far.
    pub fn summary(&self) -> Summary {
        let count = self.count();

        let mut sorted: Vec<Duration> = self.samples.iter().map(LatencySample::latency).collect();
        sorted.sort_unstable();

        let mean = if count > 0 {
            // Average in nanoseconds to keep sub-microsecond precision
            Some(Duration::from_nanos(
                (self.total.as_nanos() / count as u128) as u64,
            ))
        } else {
            None
        };

        Summary {
            started_at: self.started_at,
            count,
            min: self.min,
            max: self.max,
            mean,
            p50: percentile(&sorted, 50.0),
            p90: percentile(&sorted, 90.0),
            p99: percentile(&sorted, 99.0),
            elapsed: self.started.elapsed(),
            checkpoints: self.checkpoints.clone(),
        }
    }

    /// Consume the reporter, returning the summary and the buffered samples.
    pub fn finish(self) -> (Summary, Vec<LatencySample>) {
        let summary = self.summary();
        (summary, self.samples)
    }
}

/// Nearest-rank percentile over an ascending slice.
fn percentile(sorted: &[Duration], pct: f64) -> Option<Duration> {
    if sorted.is_empty() {
        return None;
    }
    let rank = (pct * sorted.len() as f64 / 100.0).ceil() as usize;
    let idx = rank.clamp(1, sorted.len()) - 1;
    Some(sorted[idx])
}

fn micros(d: Option<Duration>) -> String {
    match d {
        Some(d) => format!("{:.1}us", d.as_secs_f64() * 1e6),
        None => "-".to_string(),
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "done {} orders in {:.2}s ({:.0} orders/s), started {}",
            self.count,
            self.elapsed.as_secs_f64(),
            self.throughput(),
            self.started_at.format("%Y-%m-%d %H:%M:%S UTC")
        )?;
        write!(
            f,
            "rtt min {} mean {} p50 {} p90 {} p99 {} max {}",
            micros(self.min),
            micros(self.mean),
            micros(self.p50),
            micros(self.p90),
            micros(self.p99),
            micros(self.max)
        )?;
        for cp in &self.checkpoints {
            write!(
                f,
                "\n  sent {}, last RTT {:.1}us, elapsed {:.2}s",
                cp.completed,
                cp.last_latency.as_secs_f64() * 1e6,
                cp.elapsed.as_secs_f64()
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(reporter: &LatencyReporter, order_id: u64, micros: u64) -> LatencySample {
        let sent_at = reporter.started;
        LatencySample {
            order_id,
            sent_at,
            acked_at: sent_at + Duration::from_micros(micros),
        }
    }

    #[test]
    fn test_empty_summary() {
        let reporter = LatencyReporter::new(10, 0);
        let summary = reporter.summary();
        assert_eq!(summary.count, 0);
        assert!(summary.min.is_none());
        assert!(summary.mean.is_none());
        assert!(summary.p99.is_none());
        assert!(summary.checkpoints.is_empty());
        // Rendering an empty summary must not panic
        assert!(summary.to_string().contains("done 0 orders"));
    }

    #[test]
    fn test_min_max_mean() {
        let mut reporter = LatencyReporter::new(0, 3);
        for (id, us) in [(1, 30), (2, 10), (3, 20)] {
            let s = sample(&reporter, id, us);
            assert!(reporter.record(s).is_none());
        }

        let summary = reporter.summary();
        assert_eq!(summary.count, 3);
        assert_eq!(summary.min, Some(Duration::from_micros(10)));
        assert_eq!(summary.max, Some(Duration::from_micros(30)));
        assert_eq!(summary.mean, Some(Duration::from_micros(20)));
        assert_eq!(summary.p50, Some(Duration::from_micros(20)));
    }

    #[test]
    fn test_checkpoints_every_interval() {
        let mut reporter = LatencyReporter::new(2, 5);
        let mut emitted = Vec::new();
        for id in 1..=5 {
            let s = sample(&reporter, id, id * 100);
            if let Some(cp) = reporter.record(s) {
                emitted.push(cp);
            }
        }

        assert_eq!(emitted.len(), 2);
        assert_eq!(emitted[0].completed, 2);
        assert_eq!(emitted[0].last_latency, Duration::from_micros(200));
        assert_eq!(emitted[1].completed, 4);
        assert_eq!(emitted[1].last_latency, Duration::from_micros(400));
        assert_eq!(reporter.summary().checkpoints, emitted);
    }

    #[test]
    fn test_percentiles() {
        let mut reporter = LatencyReporter::new(0, 100);
        // Record 100..=1 so ordering of arrival doesn't matter
        for us in (1..=100u64).rev() {
            let s = sample(&reporter, 101 - us, us);
            reporter.record(s);
        }

        let summary = reporter.summary();
        assert_eq!(summary.p50, Some(Duration::from_micros(50)));
        assert_eq!(summary.p90, Some(Duration::from_micros(90)));
        assert_eq!(summary.p99, Some(Duration::from_micros(99)));
        assert_eq!(summary.max, Some(Duration::from_micros(100)));
    }

    #[test]
    fn test_finish_keeps_samples_in_order() {
        let mut reporter = LatencyReporter::new(0, 3);
        for id in 1..=3 {
            let s = sample(&reporter, id, 5);
            reporter.record(s);
        }
        let (summary, samples) = reporter.finish();
        assert_eq!(summary.count, 3);
        let ids: Vec<u64> = samples.iter().map(|s| s.order_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }
}
