use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;

use betflow::api::{ApiClient, BetApi};
use betflow::config::{AppConfig, OddsTransport};
use betflow::odds::{ConnectionStatus, OddsSource, OddsStream, PollingOddsSource, WsOddsSource};
use betflow::status::{create_router, StatusState};
use betflow::store::PreferencesStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    // tokio-tungstenite and reqwest both pull in rustls; pick the provider once.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let config = AppConfig::from_env()?;
    let event_id = config
        .event_id
        .clone()
        .context("EVENT_ID must be set to the event whose odds should be tailed")?;

    let metrics_handle = if config.metrics_enabled {
        Some(betflow::metrics::init_metrics()?)
    } else {
        None
    };

    let mut preferences = match &config.preferences_path {
        Some(path) => PreferencesStore::load(path)?,
        None => PreferencesStore::in_memory(),
    };

    let http = reqwest::Client::builder()
        .timeout(config.request_timeout())
        .build()?;
    let api: Arc<dyn BetApi> = Arc::new(ApiClient::new(http, config.api_url.clone()));

    tracing::info!(event_id = %event_id, api = %config.api_url, "Fetching event...");
    let event = api.get_event(&event_id).await?;
    tracing::info!(
        event_id = %event.id,
        name = %event.name,
        status = %event.status,
        outcomes = event.outcomes.len(),
        "Event loaded"
    );

    let source: Arc<dyn OddsSource> = match config.odds_transport {
        OddsTransport::Ws => Arc::new(WsOddsSource::new(config.odds_ws_url.clone())),
        OddsTransport::Poll => Arc::new(PollingOddsSource::new(api.clone(), config.poll_interval())),
    };

    let stream = OddsStream::attach(
        event.id.clone(),
        event.outcomes,
        source,
        config.reconnect_policy(),
        config.recent_updates_capacity,
    )
    .await;

    if let Some(addr) = &config.status_addr {
        let app = create_router(StatusState {
            stream: stream.clone(),
            metrics_handle: metrics_handle.clone(),
        });
        let listener = TcpListener::bind(addr).await?;
        tracing::info!(addr = %addr, "Status endpoint listening");
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(error = %e, "Status endpoint stopped");
            }
        });
    }

    let mut status_rx = stream.status_changes();
    let mut snapshot_rx = stream.subscribe();
    let mut logged: u64 = 0;
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("Shutdown requested");
                break;
            }
            changed = status_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let status = *status_rx.borrow_and_update();
                preferences.set_ws_connected(status == ConnectionStatus::Connected);
                match status {
                    ConnectionStatus::Connected => preferences.set_global_error(None),
                    ConnectionStatus::Error => {
                        preferences.set_global_error(Some("Live odds unavailable".into()));
                        tracing::error!(event_id = %event_id, "Odds stream gave up reconnecting");
                        break;
                    }
                    _ => {}
                }
                tracing::info!(event_id = %event_id, status = %status, "Odds stream status");
            }
            changed = snapshot_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                // The watch only keeps the newest snapshot, so catch up on
                // everything pushed since the last one we logged.
                let snapshot = snapshot_rx.borrow_and_update().clone();
                let (updates, missed) = snapshot.recent_updates.since(logged);
                if missed > 0 {
                    tracing::warn!(event_id = %event_id, missed, "Odds updates evicted from history before logging");
                }
                for update in updates {
                    tracing::info!(
                        event_id = %update.event_id,
                        outcome_id = %update.outcome_id,
                        odds = %update.new_odds,
                        at = %update.timestamp,
                        "Odds update"
                    );
                }
                logged = snapshot.recent_updates.total_pushed();
            }
        }
    }

    stream.detach().await;
    if let Some(handle) = metrics_handle {
        tracing::debug!(metrics = %handle.render(), "Final metrics");
    }
    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(EnvFilter::from_default_env());
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}
