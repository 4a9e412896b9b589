use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::TransportError;

/// Uniform response envelope returned by every Bet API endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    #[serde(default = "Option::default")]
    pub data: Option<T>,
    #[serde(default)]
    pub error: Option<String>,
}

impl<T> ApiEnvelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }

    /// `success=false` becomes [`TransportError::Rejected`] carrying the
    /// server's message verbatim.
    pub fn into_result(self) -> Result<T, TransportError> {
        if !self.success {
            return Err(TransportError::Rejected(
                self.error.unwrap_or_else(|| "Request failed".into()),
            ));
        }
        self.data
            .ok_or_else(|| TransportError::Unexpected("successful response without data".into()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceBetRequest {
    pub event_id: String,
    pub outcome_id: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub balance: Decimal,
}
