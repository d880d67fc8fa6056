// Private module declaration
mod server;

use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry};

use crate::domain::order::ErrorKind;

// Re-export for public API
pub use server::start_metrics_server;

// ============================================================================
// Metrics Module - Prometheus metrics for the order engine
// ============================================================================
//
// Provides metrics for:
// - Order placement (throughput, latency, failures by error kind)
// - Stock compensation (partial-reservation rollbacks, failed releases)
// - Cancellations
// - Best-effort notifications that were dropped
//
// All metrics are registered with Prometheus and can be scraped via /metrics
// ============================================================================

/// Central metrics registry for the order engine
pub struct Metrics {
    registry: Registry,

    // Placement
    pub orders_placed: IntCounter,
    pub order_failures: IntCounterVec,
    pub placement_duration: Histogram,

    // Stock compensation
    pub stock_rollbacks: IntCounter,
    pub stock_release_failures: IntCounter,

    // Lifecycle
    pub orders_cancelled: IntCounter,

    // Notifications
    pub notifications_failed: IntCounter,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let orders_placed = IntCounter::new("orders_placed_total", "Total orders placed")?;
        registry.register(Box::new(orders_placed.clone()))?;

        let order_failures = IntCounterVec::new(
            Opts::new("order_failures_total", "Order operations that failed, by error kind"),
            &["kind"],
        )?;
        registry.register(Box::new(order_failures.clone()))?;

        let placement_duration = Histogram::with_opts(
            HistogramOpts::new(
                "order_placement_duration_seconds",
                "Time from request to persisted order",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        )?;
        registry.register(Box::new(placement_duration.clone()))?;

        let stock_rollbacks = IntCounter::new(
            "stock_rollbacks_total",
            "Partial reservations rolled back after a late stock failure",
        )?;
        registry.register(Box::new(stock_rollbacks.clone()))?;

        let stock_release_failures = IntCounter::new(
            "stock_release_failures_total",
            "Line items whose stock could not be released",
        )?;
        registry.register(Box::new(stock_release_failures.clone()))?;

        let orders_cancelled = IntCounter::new("orders_cancelled_total", "Total orders cancelled")?;
        registry.register(Box::new(orders_cancelled.clone()))?;

        let notifications_failed = IntCounter::new(
            "notifications_failed_total",
            "Order-created notifications that were dropped",
        )?;
        registry.register(Box::new(notifications_failed.clone()))?;

        Ok(Self {
            registry,
            orders_placed,
            order_failures,
            placement_duration,
            stock_rollbacks,
            stock_release_failures,
            orders_cancelled,
            notifications_failed,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Helper to record a finished placement attempt
    pub fn record_placement(&self, duration_secs: f64, outcome: Result<(), ErrorKind>) {
        match outcome {
            Ok(()) => self.orders_placed.inc(),
            Err(kind) => self.record_failure(kind),
        }
        self.placement_duration.observe(duration_secs);
    }

    pub fn record_failure(&self, kind: ErrorKind) {
        self.order_failures.with_label_values(&[kind.as_str()]).inc();
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("Failed to create metrics")
    }
}
