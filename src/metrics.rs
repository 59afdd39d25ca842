use axum::{routing::get, Router};
use metrics::{describe_counter, describe_histogram, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use tracing::warn;

static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder (once per process) and describe the
    /// engine's series. Later calls reuse the first handle.
    pub fn init() -> Self {
        let handle = HANDLE
            .get_or_init(|| match PrometheusBuilder::new().install_recorder() {
                Ok(h) => {
                    describe();
                    h
                }
                Err(e) => {
                    // Another recorder owns the process; render an empty, detached one.
                    warn!(target: "metrics", error = %e, "prometheus recorder not installed");
                    PrometheusBuilder::new().build_recorder().handle()
                }
            })
            .clone();
        gauge!("sentiment_build_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);
        Self { handle }
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
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

fn describe() {
    describe_counter!("sentiment_requests_total", "Validated analyze requests by method");
    describe_counter!(
        "sentiment_backend_calls_total",
        "Backend invocations by backend and outcome"
    );
    describe_histogram!(
        "sentiment_backend_latency_ms",
        metrics::Unit::Milliseconds,
        "Backend call latency"
    );
    describe_counter!("sentiment_degraded_total", "Results produced by a fallback path");
    describe_counter!("sentiment_cache_hits_total", "Result cache hits");
    describe_counter!("sentiment_cache_misses_total", "Result cache misses");
    describe_histogram!(
        "sentiment_rate_limit_wait_ms",
        metrics::Unit::Milliseconds,
        "Time spent waiting for a backend's rate-limit slot"
    );
}
