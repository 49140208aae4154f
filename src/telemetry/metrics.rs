// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! In-process metrics for sessions and transports.
//!
//! Lightweight counters and latency histograms, no exporter. Callers that
//! want to ship them elsewhere read a [`MetricsSnapshot`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;

/// Global metrics instance.
pub static GLOBAL_METRICS: Lazy<Metrics> = Lazy::new(Metrics::new);

/// Name under which generation latency is recorded.
pub const GENERATION_OPERATION: &str = "session.generation";

/// How a generation ended, for counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenerationOutcome {
    Completed,
    Aborted,
    Failed,
}

/// Central metrics collection.
#[derive(Debug)]
pub struct Metrics {
    /// Latency by operation name.
    operations: RwLock<HashMap<String, OperationMetrics>>,

    generations: GenerationCounters,

    /// Tool calls dispatched to callers.
    tool_calls: AtomicU64,

    /// Tool calls dropped for unparseable arguments.
    tool_argument_failures: AtomicU64,

    tokens: TokenMetrics,

    start_time: Instant,
}

impl Metrics {
    /// Create a new metrics collector.
    pub fn new() -> Self {
        Self {
            operations: RwLock::new(HashMap::new()),
            generations: GenerationCounters::default(),
            tool_calls: AtomicU64::new(0),
            tool_argument_failures: AtomicU64::new(0),
            tokens: TokenMetrics::default(),
            start_time: Instant::now(),
        }
    }

    /// Record a generic operation.
    pub fn record_operation(&self, name: &str, duration: Duration) {
        let mut ops = self.operations.write().unwrap_or_else(|e| e.into_inner());
        ops.entry(name.to_string())
            .or_insert_with(OperationMetrics::new)
            .record(duration);
    }

    /// Record the end of a generation and its wall time.
    pub fn record_generation(&self, outcome: GenerationOutcome, duration: Duration) {
        self.generations.increment(outcome);
        self.record_operation(GENERATION_OPERATION, duration);
    }

    pub fn record_tool_calls(&self, count: u64) {
        self.tool_calls.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_tool_argument_failures(&self, count: u64) {
        self.tool_argument_failures.fetch_add(count, Ordering::Relaxed);
    }

    /// Record token usage.
    pub fn record_tokens(&self, input: u64, output: u64) {
        self.tokens.input.fetch_add(input, Ordering::Relaxed);
        self.tokens.output.fetch_add(output, Ordering::Relaxed);
    }

    /// Get metrics for a specific operation.
    pub fn operation_metrics(&self, name: &str) -> Option<OperationMetrics> {
        self.operations
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
    }

    pub fn generation_counts(&self) -> GenerationCounts {
        self.generations.load()
    }

    /// Get total token counts (input, output).
    pub fn token_counts(&self) -> (u64, u64) {
        (
            self.tokens.input.load(Ordering::Relaxed),
            self.tokens.output.load(Ordering::Relaxed),
        )
    }

    /// Get uptime since metrics were initialized.
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Take a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let (input_tokens, output_tokens) = self.token_counts();
        MetricsSnapshot {
            operations: self
                .operations
                .read()
                .unwrap_or_else(|e| e.into_inner())
                .clone(),
            generations: self.generations.load(),
            tool_calls: self.tool_calls.load(Ordering::Relaxed),
            tool_argument_failures: self.tool_argument_failures.load(Ordering::Relaxed),
            input_tokens,
            output_tokens,
            uptime: self.uptime(),
        }
    }

    /// Reset all metrics.
    pub fn reset(&self) {
        self.operations
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
        self.generations.reset();
        self.tool_calls.store(0, Ordering::Relaxed);
        self.tool_argument_failures.store(0, Ordering::Relaxed);
        self.tokens.input.store(0, Ordering::Relaxed);
        self.tokens.output.store(0, Ordering::Relaxed);
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Default)]
struct GenerationCounters {
    completed: AtomicU64,
    aborted: AtomicU64,
    failed: AtomicU64,
}

impl GenerationCounters {
    fn counter(&self, outcome: GenerationOutcome) -> &AtomicU64 {
        match outcome {
            GenerationOutcome::Completed => &self.completed,
            GenerationOutcome::Aborted => &self.aborted,
            GenerationOutcome::Failed => &self.failed,
        }
    }

    fn increment(&self, outcome: GenerationOutcome) {
        self.counter(outcome).fetch_add(1, Ordering::Relaxed);
    }

    fn load(&self) -> GenerationCounts {
        GenerationCounts {
            completed: self.completed.load(Ordering::Relaxed),
            aborted: self.aborted.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }

    fn reset(&self) {
        for outcome in [
            GenerationOutcome::Completed,
            GenerationOutcome::Aborted,
            GenerationOutcome::Failed,
        ] {
            self.counter(outcome).store(0, Ordering::Relaxed);
        }
    }
}

/// Generation counts by outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenerationCounts {
    pub completed: u64,
    pub aborted: u64,
    pub failed: u64,
}

impl GenerationCounts {
    pub fn total(&self) -> u64 {
        self.completed + self.aborted + self.failed
    }
}

#[derive(Debug, Default)]
struct TokenMetrics {
    input: AtomicU64,
    output: AtomicU64,
}

/// Generic operation metrics with histogram.
#[derive(Debug, Clone)]
pub struct OperationMetrics {
    /// Number of operations.
    pub count: u64,

    /// Total duration.
    pub total_duration: Duration,

    /// Minimum duration.
    pub min_duration: Duration,

    /// Maximum duration.
    pub max_duration: Duration,

    /// Histogram buckets for latency distribution.
    pub histogram: Histogram,
}

impl OperationMetrics {
    pub fn new() -> Self {
        Self {
            count: 0,
            total_duration: Duration::ZERO,
            min_duration: Duration::MAX,
            max_duration: Duration::ZERO,
            histogram: Histogram::default(),
        }
    }

    pub fn record(&mut self, duration: Duration) {
        self.count += 1;
        self.total_duration += duration;
        self.min_duration = self.min_duration.min(duration);
        self.max_duration = self.max_duration.max(duration);
        self.histogram.record(duration);
    }

    pub fn avg_duration(&self) -> Duration {
        if self.count == 0 {
            Duration::ZERO
        } else {
            self.total_duration / self.count as u32
        }
    }
}

impl Default for OperationMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed-bucket latency histogram.
///
/// Streaming generations run for seconds, so the default buckets reach
/// further than a request/response histogram would.
#[derive(Debug, Clone)]
pub struct Histogram {
    /// Upper bucket bounds in milliseconds; one overflow bucket follows.
    bounds_ms: Vec<u64>,
    counts: Vec<u64>,
}

impl Histogram {
    /// Create a histogram with custom bucket bounds (in milliseconds).
    pub fn with_bounds(bounds_ms: Vec<u64>) -> Self {
        let counts = vec![0; bounds_ms.len() + 1];
        Self { bounds_ms, counts }
    }

    pub fn record(&mut self, duration: Duration) {
        let millis = duration.as_millis() as u64;
        let idx = self
            .bounds_ms
            .iter()
            .position(|&b| millis <= b)
            .unwrap_or(self.bounds_ms.len());
        self.counts[idx] += 1;
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    pub fn bounds_ms(&self) -> &[u64] {
        &self.bounds_ms
    }

    /// Approximate percentile as the upper bound of the bucket it falls in.
    pub fn percentile(&self, p: f64) -> Duration {
        let total: u64 = self.counts.iter().sum();
        if total == 0 {
            return Duration::ZERO;
        }

        let target = (total as f64 * p / 100.0).ceil() as u64;
        let mut cumulative = 0u64;
        for (i, &count) in self.counts.iter().enumerate() {
            cumulative += count;
            if cumulative >= target {
                let millis = match self.bounds_ms.get(i) {
                    Some(&bound) => bound,
                    None => self.bounds_ms.last().copied().unwrap_or(0) * 2,
                };
                return Duration::from_millis(millis);
            }
        }
        Duration::ZERO
    }

    pub fn p50(&self) -> Duration {
        self.percentile(50.0)
    }

    pub fn p99(&self) -> Duration {
        self.percentile(99.0)
    }
}

impl Default for Histogram {
    fn default() -> Self {
        // 10ms .. 2min
        Self::with_bounds(vec![10, 100, 500, 1_000, 5_000, 15_000, 30_000, 120_000])
    }
}

/// A snapshot of all metrics at a point in time.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub operations: HashMap<String, OperationMetrics>,
    pub generations: GenerationCounts,
    pub tool_calls: u64,
    pub tool_argument_failures: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub uptime: Duration,
}

impl MetricsSnapshot {
    /// Format as a human-readable report.
    pub fn format_report(&self) -> String {
        let mut report = String::new();

        report.push_str("=== Metrics Report ===\n\n");
        report.push_str(&format!("Uptime: {:.2?}\n", self.uptime));
        report.push_str(&format!(
            "Generations: {} completed, {} aborted, {} failed\n",
            self.generations.completed, self.generations.aborted, self.generations.failed
        ));
        report.push_str(&format!(
            "Tool calls: {} dispatched, {} rejected\n",
            self.tool_calls, self.tool_argument_failures
        ));
        report.push_str(&format!(
            "Tokens: {} input, {} output\n",
            self.input_tokens, self.output_tokens
        ));

        if !self.operations.is_empty() {
            report.push_str("\nOperation Metrics:\n");
            let mut names: Vec<&String> = self.operations.keys().collect();
            names.sort();
            for name in names {
                let metrics = &self.operations[name];
                report.push_str(&format!(
                    "  {}: {} ops, avg {:.2?}, p99 {:.2?}\n",
                    name,
                    metrics.count,
                    metrics.avg_duration(),
                    metrics.histogram.p99()
                ));
            }
        }

        report
    }
}

/// Convenience function to record an operation to global metrics.
pub fn record_operation(name: &str, duration: Duration) {
    GLOBAL_METRICS.record_operation(name, duration);
}

/// Convenience function to record token usage to global metrics.
pub fn record_tokens(input: u64, output: u64) {
    GLOBAL_METRICS.record_tokens(input, output);
}
