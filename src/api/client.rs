use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::errors::TransportError;
use crate::models::{Bet, BettingEvent, SettlementResult};

use super::types::{ApiEnvelope, BalanceResponse, PlaceBetRequest};
use super::{BetApi, OracleVerdict, SettlementOracle};

/// HTTP client for the Bet API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(http: Client, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, TransportError> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self.http.get(&url).send().await?;
        Self::decode(resp).await
    }

    async fn post<B: serde::Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, TransportError> {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self.http.post(&url);
        if let Some(body) = body {
            req = req.json(body);
        }
        let resp = req.send().await?;
        Self::decode(resp).await
    }

    /// Non-2xx responses still carry an envelope when the server produced
    /// one; prefer its message over the bare status.
    async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, TransportError> {
        let status = resp.status();
        let bytes = resp.bytes().await?;

        match serde_json::from_slice::<ApiEnvelope<T>>(&bytes) {
            Ok(envelope) => envelope.into_result(),
            Err(_) if !status.is_success() => {
                Err(TransportError::Rejected(format!("API error: {}", status.as_u16())))
            }
            Err(e) => Err(TransportError::Unexpected(e.to_string())),
        }
    }
}

#[async_trait]
impl BetApi for ApiClient {
    async fn list_events(&self) -> Result<Vec<BettingEvent>, TransportError> {
        self.get("/events").await
    }

    async fn get_event(&self, event_id: &str) -> Result<BettingEvent, TransportError> {
        self.get(&format!("/events/{event_id}")).await
    }

    async fn list_bets(&self) -> Result<Vec<Bet>, TransportError> {
        self.get("/bets").await
    }

    async fn place_bet(&self, request: &PlaceBetRequest) -> Result<Bet, TransportError> {
        self.post("/bets", Some(request)).await
    }

    async fn settle_bet(&self, bet_id: Uuid) -> Result<SettlementResult, TransportError> {
        self.post::<(), _>(&format!("/bets/{bet_id}/settle"), None).await
    }

    async fn wallet_balance(&self, address: &str) -> Result<Decimal, TransportError> {
        let resp: BalanceResponse = self.get(&format!("/wallet/{address}/balance")).await?;
        Ok(resp.balance)
    }
}

/// The backend's settle endpoint doubles as the oracle. Only its verdict and
/// proof are trusted; payout is recomputed by the resolver.
#[async_trait]
impl SettlementOracle for ApiClient {
    async fn resolve(&self, bet: &Bet) -> Result<OracleVerdict, TransportError> {
        let result = self.settle_bet(bet.id).await?;
        if result.bet_id != bet.id {
            return Err(TransportError::Unexpected(format!(
                "settlement for {} returned result for {}",
                bet.id, result.bet_id
            )));
        }
        Ok(OracleVerdict {
            outcome: result.status,
            proof_reference: result.proof_reference,
        })
    }
}
