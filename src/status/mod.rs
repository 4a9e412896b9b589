//! Read-only HTTP view of a running odds tail: health, metrics, live odds.

pub mod handlers;
pub mod router;

use metrics_exporter_prometheus::PrometheusHandle;

use crate::odds::OddsStream;

pub use router::create_router;

#[derive(Clone)]
pub struct StatusState {
    pub stream: OddsStream,
    pub metrics_handle: Option<PrometheusHandle>,
}
