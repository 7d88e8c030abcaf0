//! Metrics collection and export module

use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use std::time::Instant;

/// Global metrics registry
pub struct Metrics {
    registry: Registry,

    // Submission counters
    pub units_submitted: IntCounter,
    pub units_rejected: IntCounterVec,
    pub units_finalized: IntCounter,
    pub units_failed: IntCounter,
    pub units_timed_out: IntCounter,
    pub units_rebuilt: IntCounter,

    // Config push
    pub config_chunks_written: IntCounter,
    pub config_pushes_committed: IntCounter,

    // Gauges
    pub outstanding_watches: IntGauge,

    // Histograms
    pub confirmation_latency: Histogram,
}

impl Metrics {
    /// Create new metrics instance
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let units_submitted = IntCounter::with_opts(Opts::new(
            "units_submitted_total",
            "Signed units accepted by the node",
        ))?;

        let units_rejected = IntCounterVec::new(
            Opts::new("units_rejected_total", "Signed units rejected at submission"),
            &["category"],
        )?;

        let units_finalized = IntCounter::with_opts(Opts::new(
            "units_finalized_total",
            "Units that reached the requested commitment",
        ))?;

        let units_failed = IntCounter::with_opts(Opts::new(
            "units_failed_total",
            "Units whose on-chain execution failed",
        ))?;

        let units_timed_out = IntCounter::with_opts(Opts::new(
            "units_timed_out_total",
            "Confirmation waits that hit their deadline",
        ))?;

        let units_rebuilt = IntCounter::with_opts(Opts::new(
            "units_rebuilt_total",
            "Units rebuilt with a fresh blockhash after an expiry rejection",
        ))?;

        let config_chunks_written = IntCounter::with_opts(Opts::new(
            "config_chunks_written_total",
            "Configuration chunks finalized in the staging buffer",
        ))?;

        let config_pushes_committed = IntCounter::with_opts(Opts::new(
            "config_pushes_committed_total",
            "Configuration pushes that reached Commit",
        ))?;

        let outstanding_watches = IntGauge::with_opts(Opts::new(
            "outstanding_watches",
            "Confirmation watches not yet resolved",
        ))?;

        let confirmation_latency = Histogram::with_opts(
            HistogramOpts::new(
                "confirmation_latency_seconds",
                "Time from submission to resolved confirmation",
            )
            .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 20.0, 30.0, 60.0]),
        )?;

        registry.register(Box::new(units_submitted.clone()))?;
        registry.register(Box::new(units_rejected.clone()))?;
        registry.register(Box::new(units_finalized.clone()))?;
        registry.register(Box::new(units_failed.clone()))?;
        registry.register(Box::new(units_timed_out.clone()))?;
        registry.register(Box::new(units_rebuilt.clone()))?;
        registry.register(Box::new(config_chunks_written.clone()))?;
        registry.register(Box::new(config_pushes_committed.clone()))?;
        registry.register(Box::new(outstanding_watches.clone()))?;
        registry.register(Box::new(confirmation_latency.clone()))?;

        Ok(Self {
            registry,
            units_submitted,
            units_rejected,
            units_finalized,
            units_failed,
            units_timed_out,
            units_rebuilt,
            config_chunks_written,
            config_pushes_committed,
            outstanding_watches,
            confirmation_latency,
        })
    }

    /// Get the registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render the registry in the Prometheus text format
    pub fn render(&self) -> String {
        use prometheus::Encoder;

        let mut buffer = Vec::new();
        let encoder = prometheus::TextEncoder::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buffer) {
            tracing::debug!(error = %e, "Failed to encode metrics");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

/// Global metrics instance
pub fn metrics() -> &'static Metrics {
    static METRICS: once_cell::sync::Lazy<Metrics> =
        once_cell::sync::Lazy::new(|| Metrics::new().expect("Failed to initialize metrics"));
    &METRICS
}

/// Timer helper for measuring operation duration
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn observe_duration(&self, histogram: &Histogram) {
        histogram.observe(self.elapsed_secs());
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_register_and_render() {
        let m = Metrics::new().unwrap();
        m.units_submitted.inc();
        m.units_rejected.with_label_values(&["blockhash"]).inc();
        m.outstanding_watches.set(3);

        let text = m.render();
        assert!(text.contains("units_submitted_total 1"));
        assert!(text.contains("units_rejected_total{category=\"blockhash\"} 1"));
        assert!(text.contains("outstanding_watches 3"));
    }

    #[test]
    fn test_global_metrics_is_shared() {
        let a = metrics() as *const Metrics;
        let b = metrics() as *const Metrics;
        assert_eq!(a, b);
    }
}
