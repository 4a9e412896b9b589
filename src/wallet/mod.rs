use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::api::BetApi;
use crate::errors::TransportError;
use crate::models::WalletState;

/// External wallet provider (browser extension, hardware signer, ...).
/// Errors carry a human-readable message.
#[async_trait]
pub trait WalletCapability: Send + Sync {
    /// Prompt for a connection and return the account address.
    async fn connect(&self) -> Result<String, TransportError>;

    async fn disconnect(&self) -> Result<(), TransportError>;

    async fn sign_transaction(&self, tx: &[u8]) -> Result<Vec<u8>, TransportError>;
}

/// A connected (or not) wallet plus its last known balance.
pub struct WalletSession {
    wallet: Arc<dyn WalletCapability>,
    api: Arc<dyn BetApi>,
    state: WalletState,
    error: Option<String>,
}

impl WalletSession {
    pub fn new(wallet: Arc<dyn WalletCapability>, api: Arc<dyn BetApi>) -> Self {
        Self {
            wallet,
            api,
            state: WalletState::default(),
            error: None,
        }
    }

    pub fn state(&self) -> &WalletState {
        &self.state
    }

    pub fn address(&self) -> Option<&str> {
        self.state.address.as_deref()
    }

    pub fn is_connected(&self) -> bool {
        self.state.connected
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Connect and fetch the balance. A failed balance fetch leaves the
    /// session connected with the error recorded.
    pub async fn connect(&mut self) -> Result<String, TransportError> {
        let address = match self.wallet.connect().await {
            Ok(address) => address,
            Err(e) => {
                tracing::warn!(error = %e, "Wallet connection failed");
                self.error = Some(e.to_string());
                return Err(e);
            }
        };

        self.state.connected = true;
        self.state.address = Some(address.clone());
        self.error = None;
        tracing::info!(address = %address, "Wallet connected");

        if let Err(e) = self.refresh_balance().await {
            tracing::warn!(error = %e, "Balance refresh after connect failed");
        }
        Ok(address)
    }

    /// Local state is reset even when the provider reports an error.
    pub async fn disconnect(&mut self) -> Result<(), TransportError> {
        let result = self.wallet.disconnect().await;
        self.state = WalletState::default();
        self.error = result.as_ref().err().map(|e| e.to_string());
        tracing::info!("Wallet disconnected");
        result
    }

    pub async fn refresh_balance(&mut self) -> Result<Decimal, TransportError> {
        let Some(address) = self.state.address.clone() else {
            return Err(TransportError::Wallet("wallet not connected".into()));
        };

        match self.api.wallet_balance(&address).await {
            Ok(balance) => {
                self.state.balance = balance;
                self.error = None;
                tracing::debug!(address = %address, balance = %balance, "Wallet balance refreshed");
                Ok(balance)
            }
            Err(e) => {
                self.error = Some(e.to_string());
                Err(e)
            }
        }
    }

    pub async fn sign_transaction(&self, tx: &[u8]) -> Result<Vec<u8>, TransportError> {
        if !self.state.connected {
            return Err(TransportError::Wallet("wallet not connected".into()));
        }
        self.wallet.sign_transaction(tx).await
    }
}
