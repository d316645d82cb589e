use axum::{routing::get, Router};
use metrics::{describe_counter, describe_histogram, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Initialize the Prometheus recorder and expose a static gauge with the
    /// configured cache TTL.
    pub fn init(cache_ttl_secs: u64) -> Self {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .expect("prometheus: install recorder");

        describe_series();
        gauge!("digest_cache_ttl_secs").set(cache_ttl_secs as f64);

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

/// One-time metrics registration (so series show up on /metrics).
fn describe_series() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "aggregate_requests_total",
            "Aggregation requests received (cache hits included)."
        );
        describe_counter!(
            "aggregate_cache_hits_total",
            "Aggregation requests answered from the result cache."
        );
        describe_counter!("cache_hits_total", "Result-cache lookups that hit.");
        describe_counter!("cache_misses_total", "Result-cache lookups that missed.");
        describe_counter!(
            "feed_fetch_errors_total",
            "Outbound feed/catalog fetches that failed or returned non-success."
        );
        describe_counter!(
            "feed_articles_parsed_total",
            "Articles extracted from fetched feeds."
        );
        describe_counter!(
            "catalog_load_errors_total",
            "Catalog loads that degraded to an empty catalog."
        );
        describe_histogram!("feed_parse_ms", "Feed parse time in milliseconds.");
    });
}
