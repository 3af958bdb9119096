//! Metrics collection for prioritization passes

use prometheus::{
    register_counter_vec_with_registry, register_counter_with_registry,
    register_histogram_with_registry, Counter, CounterVec, Encoder, Histogram, Opts, Registry,
    TextEncoder,
};

use crate::context::models::{BudgetCategory, SelectionResult};

/// Prometheus metrics for one prioritizer, on a registry it owns
pub struct PrioritizationMetrics {
    registry: Registry,

    // Scoring
    pub items_scored: Counter,
    pub estimation_failures: Counter,

    // Selection
    pub items_selected: CounterVec,
    pub items_skipped: CounterVec,
    pub tokens_used: Histogram,

    // Compression fallback
    pub items_compressed: CounterVec,
    pub compression_overages: Counter,
}

impl PrioritizationMetrics {
    /// Create a new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let items_scored = register_counter_with_registry!(
            Opts::new("digest_items_scored_total", "Total content items scored"),
            registry
        )?;

        let estimation_failures = register_counter_with_registry!(
            Opts::new(
                "digest_estimation_failures_total",
                "Total passes aborted by token estimation failures"
            ),
            registry
        )?;

        let items_selected = register_counter_vec_with_registry!(
            Opts::new("digest_items_selected_total", "Total items selected whole"),
            &["category"],
            registry
        )?;

        let items_skipped = register_counter_vec_with_registry!(
            Opts::new(
                "digest_items_skipped_total",
                "Total items that did not fit their category budget"
            ),
            &["category"],
            registry
        )?;

        let tokens_used = register_histogram_with_registry!(
            "digest_tokens_used",
            "Tokens used per prioritization pass",
            vec![256.0, 1_024.0, 4_096.0, 16_384.0, 65_536.0, 262_144.0],
            registry
        )?;

        let items_compressed = register_counter_vec_with_registry!(
            Opts::new(
                "digest_items_compressed_total",
                "Total skipped items rescued by compression"
            ),
            &["category"],
            registry
        )?;

        let compression_overages = register_counter_with_registry!(
            Opts::new(
                "digest_compression_overages_total",
                "Total compressions left above target by an indivisible unit"
            ),
            registry
        )?;

        Ok(Self {
            registry,
            items_scored,
            estimation_failures,
            items_selected,
            items_skipped,
            tokens_used,
            items_compressed,
            compression_overages,
        })
    }

    /// Get the metrics registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_scored(&self, count: usize) {
        self.items_scored.inc_by(count as f64);
    }

    pub fn record_estimation_failure(&self) {
        self.estimation_failures.inc();
    }

    /// Record the outcome of a selection pass
    pub fn record_selection(&self, result: &SelectionResult) {
        for (category, items) in &result.by_category {
            self.items_selected
                .with_label_values(&[category.as_str()])
                .inc_by(items.len() as f64);
        }
        for item in &result.skipped {
            self.items_skipped
                .with_label_values(&[item.budget_category().as_str()])
                .inc();
        }
    }

    pub fn record_compressed(&self, category: BudgetCategory) {
        self.items_compressed
            .with_label_values(&[category.as_str()])
            .inc();
    }

    pub fn record_overage(&self) {
        self.compression_overages.inc();
    }

    pub fn record_tokens_used(&self, tokens: usize) {
        self.tokens_used.observe(tokens as f64);
    }

    /// Export metrics in Prometheus text format
    pub fn gather_text(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();

        let mut buffer = Vec::new();
        if encoder.encode(&metric_families, &mut buffer).is_err() {
            return String::new();
        }

        String::from_utf8(buffer).unwrap_or_default()
    }
}
