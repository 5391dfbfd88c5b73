//! Prometheus metrics for the burn forwarder
//!
//! Registered in the default registry; [`gather_text`] renders them in the
//! text exposition format.

use alloy::primitives::U256;
use lazy_static::lazy_static;
use prometheus::proto::MetricFamily;
use prometheus::{
    register_counter, register_counter_vec, register_histogram_vec, register_int_counter, Counter,
    CounterVec, Encoder, HistogramVec, IntCounter, TextEncoder,
};
use tracing::warn;

use crate::types::Stage;

lazy_static! {
    pub static ref RUNS: CounterVec = register_counter_vec!(
        "forwarder_runs_total",
        "Total number of transfer runs by outcome",
        &["outcome"]
    ).unwrap();

    pub static ref STAGE_FAILURES: CounterVec = register_counter_vec!(
        "forwarder_stage_failures_total",
        "Total number of failed runs by stage and error kind",
        &["stage", "kind"]
    ).unwrap();

    pub static ref APPROVALS_SUBMITTED: IntCounter = register_int_counter!(
        "forwarder_approvals_submitted_total",
        "Total number of allowance approvals submitted"
    ).unwrap();

    pub static ref CONFIRMATION_WAIT: HistogramVec = register_histogram_vec!(
        "forwarder_confirmation_wait_seconds",
        "Time spent waiting for transaction confirmation",
        &["tx"],
        vec![0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]
    ).unwrap();

    pub static ref VOLUME_BURNED: Counter = register_counter!(
        "forwarder_volume_burned_total",
        "Total amount burned by confirmed transfers (in base units)"
    ).unwrap();
}

/// Record a finished run (`success` or `failure`)
pub fn record_run(outcome: &str) {
    RUNS.with_label_values(&[outcome]).inc();
}

/// Record the stage and kind of a failed run
pub fn record_stage_failure(stage: Stage, kind: &str) {
    STAGE_FAILURES
        .with_label_values(&[stage.as_str(), kind])
        .inc();
}

/// Record an approval submitted
pub fn record_approval_submitted() {
    APPROVALS_SUBMITTED.inc();
}

/// Record how long a confirmation wait took
pub fn record_confirmation_wait(tx: &str, seconds: f64) {
    CONFIRMATION_WAIT.with_label_values(&[tx]).observe(seconds);
}

/// Record volume burned
pub fn record_volume(amount: U256) {
    let amount = u128::try_from(amount).unwrap_or(u128::MAX) as f64;
    VOLUME_BURNED.inc_by(amount);
}

/// Render all registered metrics in the Prometheus text format
pub fn gather_text() -> String {
    encode_text(&prometheus::gather())
}

/// Encode metric families; an encoder failure yields an empty string
fn encode_text(metric_families: &[MetricFamily]) -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(metric_families, &mut buffer) {
        warn!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    match String::from_utf8(buffer) {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "Encoded metrics are not UTF-8");
            String::new()
        }
    }
}
