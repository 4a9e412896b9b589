use metrics::{counter, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and register every metric this crate
/// emits. The returned handle renders the scrape payload.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    // Pre-register counters so they appear even before the first increment.
    counter!("odds_updates_applied").absolute(0);
    counter!("odds_updates_dropped").absolute(0);
    counter!("odds_reconnect_attempts").absolute(0);
    counter!("bets_placed").absolute(0);
    counter!("bet_placement_failures").absolute(0);
    counter!("bets_settled").absolute(0);
    counter!("settlement_failures").absolute(0);

    gauge!("odds_stream_connected").set(0.0);

    Ok(handle)
}
