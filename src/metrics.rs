use axum::{routing::get, Router};
use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use tracing::warn;

use crate::filter::Decision;

#[derive(Clone)]
pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the process-wide Prometheus recorder (first call wins).
    /// Returns `None` if some other recorder is already installed.
    pub fn init() -> Option<Self> {
        static HANDLE: OnceCell<Option<PrometheusHandle>> = OnceCell::new();
        let handle = HANDLE.get_or_init(|| match PrometheusBuilder::new().install_recorder() {
            Ok(h) => Some(h),
            Err(e) => {
                warn!(target: "chatgate", error = ?e, "prometheus recorder not installed");
                None
            }
        });
        ensure_metrics_described();
        handle.clone().map(|handle| Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router<S>(&self) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("chatgate_messages_total", "Chat messages judged by the filter.");
        describe_counter!("chatgate_admitted_total", "Messages admitted for display.");
        describe_counter!(
            "chatgate_blocked_total",
            "Messages blocked, labelled by the gate that stopped them."
        );
        describe_gauge!("chatgate_mps", "Messages per second over the trailing 5s window.");
        describe_gauge!("chatgate_filter_active", "1 while MPS is at or above the threshold.");
    });
}

pub fn record_decision(d: &Decision) {
    counter!("chatgate_messages_total").increment(1);
    match d.blocked_by {
        None => counter!("chatgate_admitted_total").increment(1),
        Some(reason) => counter!("chatgate_blocked_total", "reason" => reason.as_str()).increment(1),
    }
    gauge!("chatgate_mps").set(d.messages_per_second);
    gauge!("chatgate_filter_active").set(if d.filter_active { 1.0 } else { 0.0 });
}
