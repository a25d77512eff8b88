//! Metrics collection for observability

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec_with_registry, register_counter_with_registry,
    register_histogram_with_registry, Counter, CounterVec, Histogram, HistogramOpts, Opts,
    Registry,
};
use tracing::warn;

/// Global metrics collector, `None` if registration failed at startup
static METRICS: Lazy<Option<Metrics>> = Lazy::new(|| match Metrics::new() {
    Ok(metrics) => Some(metrics),
    Err(e) => {
        warn!("Failed to initialize metrics: {}", e);
        None
    }
});

/// Access the global metrics collector
pub fn global() -> Option<&'static Metrics> {
    METRICS.as_ref()
}

/// Metrics collector
pub struct Metrics {
    registry: Registry,

    // Scan metrics
    pub scans: CounterVec,
    pub cache_lookups: CounterVec,

    // Optimization metrics
    pub optimizations: CounterVec,
    pub secondary_compressions: Counter,
    pub optimized_tokens: Histogram,

    // Scoring metrics
    pub scoring_duration: Histogram,
}

impl Metrics {
    /// Create a new metrics collector with its own registry
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let scans = register_counter_vec_with_registry!(
            Opts::new("context_scans_total", "Total project scans"),
            &["outcome"],
            registry
        )?;

        let cache_lookups = register_counter_vec_with_registry!(
            Opts::new("context_cache_lookups_total", "Snapshot cache lookups"),
            &["result"],
            registry
        )?;

        let optimizations = register_counter_vec_with_registry!(
            Opts::new("context_optimizations_total", "Optimizations by technique"),
            &["technique"],
            registry
        )?;

        let secondary_compressions = register_counter_with_registry!(
            Opts::new(
                "context_secondary_compressions_total",
                "Secondary compression passes applied"
            ),
            registry
        )?;

        let optimized_tokens = register_histogram_with_registry!(
            HistogramOpts::new("context_optimized_tokens", "Estimated tokens per optimized result")
                .buckets(vec![100.0, 250.0, 500.0, 1000.0, 2000.0, 4000.0, 8000.0, 16000.0]),
            registry
        )?;

        let scoring_duration = register_histogram_with_registry!(
            "context_scoring_duration_seconds",
            "Time spent scoring a project's files",
            registry
        )?;

        Ok(Self {
            registry,
            scans,
            cache_lookups,
            optimizations,
            secondary_compressions,
            optimized_tokens,
            scoring_duration,
        })
    }

    /// Get the metrics registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Record a scan outcome (`fresh`, `cached`, `failed`)
    pub fn record_scan(&self, outcome: &str) {
        self.scans.with_label_values(&[outcome]).inc();
    }

    /// Record a cache lookup (`hit`, `miss`, `stale`)
    pub fn record_cache_lookup(&self, result: &str) {
        self.cache_lookups.with_label_values(&[result]).inc();
    }

    /// Record an applied technique and the size of its output
    pub fn record_optimization(&self, technique: &str, tokens: usize, secondary: bool) {
        self.optimizations.with_label_values(&[technique]).inc();
        self.optimized_tokens.observe(tokens as f64);
        if secondary {
            self.secondary_compressions.inc();
        }
    }

    /// Export metrics in Prometheus text format
    pub fn export_prometheus(&self) -> String {
        use prometheus::Encoder;

        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();

        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            warn!("Failed to encode metrics: {}", e);
        }

        String::from_utf8(buffer).unwrap_or_default()
    }
}
