// Prometheus Metrics for the Credit Ledger Gateway
// Tracks: throughput, latency, transaction and statement outcomes

use prometheus::{
    Registry, IntCounter, IntCounterVec, Histogram, IntGauge, Opts, HistogramOpts,
    register_int_counter_with_registry, register_int_counter_vec_with_registry,
    register_histogram_with_registry, register_int_gauge_with_registry, TextEncoder, Encoder,
};

pub struct Metrics {
    pub registry: Registry,

    // Request metrics
    pub http_requests_total: IntCounter,
    pub http_request_duration_seconds: Histogram,
    pub http_requests_in_flight: IntGauge,

    // Ledger operation metrics (label: outcome)
    pub transactions_total: IntCounterVec,
    pub statements_total: IntCounterVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let http_requests_total = register_int_counter_with_registry!(
            Opts::new("ledger_http_requests_total", "Total HTTP requests processed"),
            registry
        )?;

        let http_request_duration_seconds = register_histogram_with_registry!(
            HistogramOpts::new(
                "ledger_http_request_duration_seconds",
                "HTTP request duration in seconds"
            ).buckets(vec![0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]),
            registry
        )?;

        let http_requests_in_flight = register_int_gauge_with_registry!(
            Opts::new("ledger_http_requests_in_flight", "Current HTTP requests being processed"),
            registry
        )?;

        let transactions_total = register_int_counter_vec_with_registry!(
            Opts::new("ledger_transactions_total", "Transactions submitted, by outcome"),
            &["outcome"],
            registry
        )?;

        let statements_total = register_int_counter_vec_with_registry!(
            Opts::new("ledger_statements_total", "Statements requested, by outcome"),
            &["outcome"],
            registry
        )?;

        Ok(Self {
            registry,
            http_requests_total,
            http_request_duration_seconds,
            http_requests_in_flight,
            transactions_total,
            statements_total,
        })
    }

    /// Export all metrics in Prometheus text format
    pub fn export(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    /// Mark a request in flight until the returned guard is dropped
    pub fn in_flight(&self) -> InFlightGuard {
        self.http_requests_in_flight.inc();
        InFlightGuard(self.http_requests_in_flight.clone())
    }

    /// Count a transaction outcome (`ok` or the error kind)
    pub fn track_transaction<T>(&self, result: &ledger_core::Result<T>) {
        self.transactions_total
            .with_label_values(&[outcome(result)])
            .inc();
    }

    /// Count a statement outcome
    pub fn track_statement<T>(&self, result: &ledger_core::Result<T>) {
        self.statements_total
            .with_label_values(&[outcome(result)])
            .inc();
    }
}

/// Decrements the in-flight gauge on drop, including when the request is cancelled
pub struct InFlightGuard(IntGauge);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.dec();
    }
}

fn outcome<T>(result: &ledger_core::Result<T>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(e) => e.kind(),
    }
}
