use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;

use crate::api::ApiEnvelope;
use crate::models::{OddsUpdate, Outcome};
use crate::odds::ConnectionStatus;

use super::StatusState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OddsView {
    pub event_id: String,
    pub status: String,
    pub outcomes: Vec<Outcome>,
    pub last_update_at: Option<DateTime<Utc>>,
}

pub async fn health_check(State(state): State<StatusState>) -> impl IntoResponse {
    let status = state.stream.status();

    if status == ConnectionStatus::Connected {
        (StatusCode::OK, Json(json!({ "status": "healthy", "odds": status.to_string() })))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "degraded", "odds": status.to_string() })),
        )
    }
}

pub async fn render_metrics(State(state): State<StatusState>) -> Response {
    match &state.metrics_handle {
        Some(handle) => ([(CONTENT_TYPE, "text/plain; version=0.0.4")], handle.render()).into_response(),
        None => (StatusCode::NOT_FOUND, "metrics disabled").into_response(),
    }
}

pub async fn odds(State(state): State<StatusState>) -> Json<ApiEnvelope<OddsView>> {
    let snapshot = state.stream.snapshot();
    Json(ApiEnvelope::ok(OddsView {
        event_id: snapshot.event_id,
        status: state.stream.status().to_string(),
        outcomes: snapshot.outcomes,
        last_update_at: snapshot.last_update_at,
    }))
}

/// Newest first.
pub async fn recent_updates(State(state): State<StatusState>) -> Json<ApiEnvelope<Vec<OddsUpdate>>> {
    Json(ApiEnvelope::ok(state.stream.recent_updates()))
}
