use crate::models::EventSource;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

static METRICS_HANDLE: OnceLock<Option<PrometheusHandle>> = OnceLock::new();

/// Install the Prometheus recorder. Safe to call more than once per process.
pub fn init_metrics() {
    METRICS_HANDLE.get_or_init(|| match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "Prometheus recorder not installed");
            None
        }
    });
}

pub fn get_metrics() -> String {
    METRICS_HANDLE
        .get()
        .and_then(Option::as_ref)
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized\n".to_string())
}

pub fn record_intent_created(currency: &str) {
    metrics::counter!("payment_intents_created_total", "currency" => currency.to_string())
        .increment(1);
}

pub fn record_intent_failure(reason: &'static str) {
    metrics::counter!("payment_intent_failures_total", "reason" => reason).increment(1);
}

pub fn record_reconciliation(source: EventSource, outcome: &'static str) {
    metrics::counter!(
        "payment_reconciliations_total",
        "source" => source.as_str(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_expired() {
    metrics::counter!("payment_expired_total").increment(1);
}
