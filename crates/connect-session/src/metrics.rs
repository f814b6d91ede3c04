//! Resolver metrics
//!
//! Recorded through the `metrics` facade; the embedding service decides
//! whether a recorder is installed.
//!
//! - `connect_code_exchanges_total` (counter): labels `source`, `outcome`
//! - `connect_invalidations_total` (counter): label `reason`
//! - `connect_api_errors_total` (counter): label `error_type`

/// Record an authorization code exchange. `source` is `signed_request` or
/// `redirect`.
pub fn record_code_exchange(source: &'static str, success: bool) {
    let outcome = if success { "success" } else { "failure" };
    metrics::counter!("connect_code_exchanges_total", "source" => source, "outcome" => outcome)
        .increment(1);
}

/// Record a clear-all of the persisted session.
pub fn record_invalidation(reason: &'static str) {
    metrics::counter!("connect_invalidations_total", "reason" => reason).increment(1);
}

/// Record an API call that ended in a provider or transport error.
pub fn record_api_error(error_type: &str) {
    metrics::counter!("connect_api_errors_total", "error_type" => error_type.to_string())
        .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle, PrometheusRecorder};

    fn isolated_recorder() -> (PrometheusRecorder, PrometheusHandle) {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        (recorder, handle)
    }

    #[test]
    fn record_functions_do_not_panic_without_recorder() {
        record_code_exchange("redirect", true);
        record_invalidation("logout");
        record_api_error("OAuthException");
    }

    #[test]
    fn code_exchanges_carry_source_and_outcome() {
        let (recorder, handle) = isolated_recorder();
        let _guard = metrics::set_default_local_recorder(&recorder);

        record_code_exchange("redirect", true);
        record_code_exchange("signed_request", false);

        let output = handle.render();
        assert!(output.contains("connect_code_exchanges_total"));
        assert!(output.contains("source=\"redirect\""));
        assert!(output.contains("outcome=\"success\""));
        assert!(output.contains("source=\"signed_request\""));
        assert!(output.contains("outcome=\"failure\""));
    }

    #[test]
    fn invalidations_and_api_errors_are_labelled() {
        let (recorder, handle) = isolated_recorder();
        let _guard = metrics::set_default_local_recorder(&recorder);

        record_invalidation("token_error");
        record_api_error("TransportException");

        let output = handle.render();
        assert!(output.contains("connect_invalidations_total{reason=\"token_error\"} 1"));
        assert!(output.contains("connect_api_errors_total{error_type=\"TransportException\"} 1"));
    }
}
