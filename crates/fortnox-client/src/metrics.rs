//! Request metrics
//!
//! Recorded through the `metrics` facade; they are no-ops until the
//! application installs a recorder (the connect service installs Prometheus).
//!
//! - `fortnox_requests_total` (counter): labels `method`, `status`
//! - `fortnox_request_duration_seconds` (histogram): label `method`
//! - `fortnox_auth_retries_total` (counter): 401/403 recoveries attempted
//!
//! Token refresh outcomes are counted by `fortnox-auth` as
//! `fortnox_token_refresh_total{outcome}`.

/// One HTTP exchange with the API. `status` is `None` for transport failures.
pub fn record_response(method: &str, status: Option<u16>) {
    let status = status.map_or_else(|| "error".to_string(), |s| s.to_string());
    metrics::counter!("fortnox_requests_total", "method" => method.to_string(), "status" => status)
        .increment(1);
}

/// Wall-clock time of a logical request, retries included.
pub fn record_duration(method: &str, duration_secs: f64) {
    metrics::histogram!("fortnox_request_duration_seconds", "method" => method.to_string())
        .record(duration_secs);
}

pub fn record_auth_retry() {
    metrics::counter!("fortnox_auth_retries_total").increment(1);
}
