// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for zonemux.
//!
//! All metrics carry the namespace prefix `zonemux_` and live in [`METRICS_REGISTRY`].
//!
//! # Metrics Categories
//!
//! - **Submission Metrics** - change batches and individual record changes sent to providers
//! - **Data Quality Metrics** - records dropped instead of failing the pass
//! - **Performance Metrics** - duration of reconciliation passes
//!
//! # Example
//!
//! ```rust,no_run
//! use zonemux::metrics::{gather_metrics, record_dropped};
//!
//! record_dropped("no_matching_zone");
//! let text = gather_metrics().unwrap_or_default();
//! ```

use crate::plan::batch::ZoneChange;
use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::sync::LazyLock;
use std::time::Duration;

// ============================================================================
// Metric Name Constants
// ============================================================================

/// Namespace prefix for all zonemux metrics
const METRICS_NAMESPACE: &str = "zonemux";

// ============================================================================
// Global Metrics Registry
// ============================================================================

/// Global Prometheus metrics registry
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Submission Metrics
// ============================================================================

/// Change batches accepted by a provider
///
/// Labels:
/// - `provider`: Provider name (`google`, `rfc2136`, `inmemory`)
/// - `zone`: Zone id the batch was submitted to
pub static BATCHES_SUBMITTED_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_batches_submitted_total"),
        "Total number of change batches accepted by a provider",
    );
    let counter = CounterVec::new(opts, &["provider", "zone"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Individual record changes accepted by a provider
///
/// Labels:
/// - `provider`: Provider name
/// - `kind`: `addition` or `deletion`
pub static CHANGES_SUBMITTED_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_changes_submitted_total"),
        "Total number of record additions and deletions accepted by a provider",
    );
    let counter = CounterVec::new(opts, &["provider", "kind"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Data Quality Metrics
// ============================================================================

/// Records skipped during a pass
///
/// Labels:
/// - `reason`: `no_matching_zone`, `batch_size_exceeded`, `malformed_record`,
///   `unsupported_type`
pub static RECORDS_DROPPED_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_records_dropped_total"),
        "Total number of records skipped instead of failing the pass",
    );
    let counter = CounterVec::new(opts, &["reason"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Performance Metrics
// ============================================================================

/// Duration of reconciliation passes in seconds
///
/// Labels:
/// - `provider`: Provider name
/// - `outcome`: `success` or `error`
pub static RECONCILE_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_reconcile_duration_seconds"),
        "Duration of reconciliation passes in seconds",
    )
    .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]);
    let histogram = HistogramVec::new(opts, &["provider", "outcome"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

// ============================================================================
// Helper Functions
// ============================================================================

/// Record a skipped record
///
/// # Arguments
/// * `reason` - Why the record was skipped (e.g., `no_matching_zone`)
pub fn record_dropped(reason: &str) {
    RECORDS_DROPPED_TOTAL.with_label_values(&[reason]).inc();
}

/// Record a change batch accepted by a provider
///
/// # Arguments
/// * `provider` - Provider name
/// * `zone` - Zone id the batch was submitted to
/// * `batch` - The submitted batch
pub fn record_batch_submitted(provider: &str, zone: &str, batch: &ZoneChange) {
    BATCHES_SUBMITTED_TOTAL
        .with_label_values(&[provider, zone])
        .inc();
    #[allow(clippy::cast_precision_loss)]
    {
        CHANGES_SUBMITTED_TOTAL
            .with_label_values(&[provider, "addition"])
            .inc_by(batch.additions.len() as f64);
        CHANGES_SUBMITTED_TOTAL
            .with_label_values(&[provider, "deletion"])
            .inc_by(batch.deletions.len() as f64);
    }
}

/// Record the duration of a reconciliation pass
///
/// # Arguments
/// * `provider` - Provider name
/// * `success` - Whether the pass completed without error
/// * `duration` - Duration of the pass
pub fn record_reconcile(provider: &str, success: bool, duration: Duration) {
    let outcome = if success { "success" } else { "error" };
    RECONCILE_DURATION_SECONDS
        .with_label_values(&[provider, outcome])
        .observe(duration.as_secs_f64());
}

/// Gather and encode all metrics in Prometheus text format
///
/// # Errors
/// Returns error if encoding fails
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod metrics_tests;
