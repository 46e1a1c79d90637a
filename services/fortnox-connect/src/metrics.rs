//! Prometheus metrics exposition
//!
//! Installs the global recorder that the client crates write to:
//!
//! - `fortnox_requests_total` (counter): labels `method`, `status`
//! - `fortnox_request_duration_seconds` (histogram): label `method`
//! - `fortnox_token_refresh_total` (counter): label `outcome`
//! - `fortnox_auth_retries_total` (counter)
//!
//! and the service's own:
//!
//! - `fortnox_connect_authorizations_total` (counter): label `outcome`

use anyhow::Context;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

const REQUEST_DURATION_BUCKETS: &[f64] = &[
    0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
];

fn builder() -> anyhow::Result<PrometheusBuilder> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("fortnox_request_duration_seconds".to_string()),
            REQUEST_DURATION_BUCKETS,
        )
        .context("failed to set histogram buckets")
}

/// Install the Prometheus recorder and return a handle for rendering metrics.
///
/// `fortnox_request_duration_seconds` gets explicit buckets so it renders as
/// a histogram rather than a summary.
pub fn install_recorder() -> anyhow::Result<PrometheusHandle> {
    builder()?
        .install_recorder()
        .context("failed to install Prometheus recorder")
}

/// Record the result of an authorization callback.
pub fn record_authorization(outcome: &'static str) {
    metrics::counter!("fortnox_connect_authorizations_total", "outcome" => outcome).increment(1);
}
