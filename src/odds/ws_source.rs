use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::interval;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use crate::errors::TransportError;
use crate::models::OddsUpdate;

use super::source::{FeedItem, OddsFeed, OddsSource, FEED_BUFFER};

const PING_INTERVAL: Duration = Duration::from_secs(25);

/// Push transport: one WebSocket per subscription.
#[derive(Debug, Clone)]
pub struct WsOddsSource {
    url: String,
}

impl WsOddsSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// Envelope used by the push server: `{"type": "...", "payload": ...}`.
#[derive(Debug, Deserialize)]
struct WsEnvelope {
    #[serde(rename = "type")]
    msg_type: String,
    #[serde(default)]
    payload: serde_json::Value,
}

/// Channel name the server expects in a subscribe message.
pub fn event_channel(event_id: &str) -> String {
    format!("event:{event_id}")
}

fn subscribe_message(event_id: &str) -> String {
    json!({
        "type": "subscribe",
        "payload": { "channel": event_channel(event_id) },
    })
    .to_string()
}

#[async_trait]
impl OddsSource for WsOddsSource {
    async fn connect(&self, event_id: &str) -> Result<OddsFeed, TransportError> {
        let (ws_stream, _response) = connect_async(self.url.as_str())
            .await
            .map_err(|e| TransportError::WebSocket(e.to_string()))?;

        let (mut write, mut read) = ws_stream.split();

        write
            .send(Message::Text(subscribe_message(event_id).into()))
            .await
            .map_err(|e| TransportError::WebSocket(e.to_string()))?;
        tracing::info!(url = %self.url, event_id, "Subscribed to odds channel");

        let (tx, rx) = mpsc::channel(FEED_BUFFER);
        let event_id = event_id.to_string();

        tokio::spawn(async move {
            let mut ping_timer = interval(PING_INTERVAL);
            ping_timer.tick().await; // consume the first immediate tick

            loop {
                tokio::select! {
                    msg = read.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                for item in parse_frame(text.as_str()) {
                                    if tx.send(item).await.is_err() {
                                        return;
                                    }
                                }
                            }
                            Some(Ok(Message::Ping(data))) => {
                                if let Err(e) = write.send(Message::Pong(data)).await {
                                    tracing::warn!(error = %e, "Failed to send pong");
                                    break;
                                }
                            }
                            Some(Ok(Message::Close(_))) => {
                                tracing::warn!(event_id = %event_id, "Odds server sent close frame");
                                break;
                            }
                            Some(Ok(_)) => {} // Binary, Pong, Frame: ignore
                            Some(Err(e)) => {
                                tracing::error!(error = %e, "Odds WebSocket read error");
                                break;
                            }
                            None => {
                                tracing::warn!(event_id = %event_id, "Odds WebSocket stream ended");
                                break;
                            }
                        }
                    }
                    _ = ping_timer.tick() => {
                        if let Err(e) = write.send(Message::Ping(vec![].into())).await {
                            tracing::warn!(error = %e, "Failed to send ping");
                            break;
                        }
                    }
                    _ = tx.closed() => {
                        // Subscriber went away; unsubscribe politely and stop.
                        let _ = write.send(Message::Close(None)).await;
                        return;
                    }
                }
            }
        });

        Ok(rx)
    }
}

/// Decode one text frame. Accepts:
/// - `{"type":"odds_update","payload":{...}}` or a payload array
/// - a bare update object or array of updates
///
/// Other message types (settlements, balance, acks) are skipped.
pub fn parse_frame(text: &str) -> Vec<FeedItem> {
    let value: serde_json::Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(_) => return vec![FeedItem::Malformed(text.to_string())],
    };

    if value.get("type").is_some() {
        let envelope: WsEnvelope = match serde_json::from_value(value) {
            Ok(e) => e,
            Err(_) => return vec![FeedItem::Malformed(text.to_string())],
        };
        return match envelope.msg_type.as_str() {
            "odds_update" => decode_updates(envelope.payload, text),
            "error" => {
                tracing::warn!(payload = %envelope.payload, "Odds server reported an error");
                Vec::new()
            }
            other => {
                tracing::trace!(msg_type = other, "Non-odds message received");
                Vec::new()
            }
        };
    }

    decode_updates(value, text)
}

fn decode_updates(value: serde_json::Value, raw: &str) -> Vec<FeedItem> {
    match value {
        serde_json::Value::Array(items) => items
            .into_iter()
            .map(|item| match serde_json::from_value::<OddsUpdate>(item) {
                Ok(update) => FeedItem::Update(update),
                Err(_) => FeedItem::Malformed(raw.to_string()),
            })
            .collect(),
        other => match serde_json::from_value::<OddsUpdate>(other) {
            Ok(update) => vec![FeedItem::Update(update)],
            Err(_) => vec![FeedItem::Malformed(raw.to_string())],
        },
    }
}
