//! Metric names, one-time descriptions and an optional Prometheus recorder.
//!
//! The library only talks to the `metrics` facade. Binaries that want an
//! exposition install a recorder via `Metrics::init()`.

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

pub const REQUESTS_TOTAL: &str = "recommend_requests_total";
pub const ITEMS_SCORED_TOTAL: &str = "recommend_items_scored_total";
pub const ITEMS_SKIPPED_TOTAL: &str = "recommend_items_skipped_total";
pub const ENGINE_FAILURES_TOTAL: &str = "recommend_engine_failures_total";
pub const FUZZY_FALLBACK_TOTAL: &str = "recommend_fuzzy_fallback_total";
pub const DURATION_MS: &str = "recommend_duration_ms";

/// One-time metrics registration (so series carry help text once recorded).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(REQUESTS_TOTAL, "Ranking requests received, by domain.");
        describe_counter!(
            ITEMS_SCORED_TOTAL,
            "Items that made it through fuzzy scoring."
        );
        describe_counter!(
            ITEMS_SKIPPED_TOTAL,
            "Items dropped during scoring, by skip reason."
        );
        describe_counter!(
            ENGINE_FAILURES_TOTAL,
            "Requests that failed as a whole and returned no results."
        );
        describe_counter!(
            FUZZY_FALLBACK_TOTAL,
            "Fuzzy evaluations where no rule fired and the midpoint was used."
        );
        describe_histogram!(DURATION_MS, "Ranking request duration in milliseconds.");
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder for this process.
    pub fn init() -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| anyhow::anyhow!("prometheus: install recorder: {e}"))?;
        ensure_metrics_described();
        Ok(Self { handle })
    }

    /// Prometheus exposition text.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}
