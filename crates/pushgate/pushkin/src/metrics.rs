//! Prometheus metrics for outbound provider calls.

use std::time::Duration;

use color_eyre::eyre::WrapErr as _;
use lazy_static::lazy_static;
use prometheus::{CounterVec, Encoder as _, Histogram, HistogramOpts, Opts, Registry, TextEncoder};

const PREFIX: &str = "pushgate";

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    pub static ref GCM_REQUEST_DURATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            format!("{PREFIX}_gcm_request_duration_seconds"),
            "Time taken to send HTTP request to GCM"
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0])
    ).expect("Failed to create gcm_request_duration_seconds metric");

    pub static ref GCM_STATUS_CODES_TOTAL: CounterVec = CounterVec::new(
        Opts::new(
            format!("{PREFIX}_gcm_status_codes_total"),
            "Number of HTTP response status codes received from GCM"
        ),
        &["pushkin", "code"]
    ).expect("Failed to create gcm_status_codes_total metric");
}

/// Register every metric with [`REGISTRY`]. Safe to call more than once.
pub fn init_metrics() {
    let _ = REGISTRY.register(Box::new(GCM_REQUEST_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(GCM_STATUS_CODES_TOTAL.clone()));
}

/// Record one provider call. `status` is `None` when no response arrived.
pub fn record_gcm_request(pushkin: &str, status: Option<u16>, duration: Duration) {
    GCM_REQUEST_DURATION_SECONDS.observe(duration.as_secs_f64());

    if let Some(status) = status {
        GCM_STATUS_CODES_TOTAL
            .with_label_values(&[pushkin, &status.to_string()])
            .inc();
    }
}

/// Render the registry in the Prometheus text format.
pub fn encode_metrics() -> color_eyre::eyre::Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&REGISTRY.gather(), &mut buffer)
        .wrap_err("failed to encode metrics")?;

    String::from_utf8(buffer).wrap_err("metrics are not valid UTF-8")
}
