use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletState {
    pub connected: bool,
    pub address: Option<String>,
    pub balance: Decimal,
    /// Unconfirmed funds, not yet spendable.
    pub pending_balance: Decimal,
}

impl WalletState {
    /// Spendable balance: confirmed balance minus anything still pending.
    pub fn available(&self) -> Decimal {
        self.balance.saturating_sub(self.pending_balance).max(Decimal::ZERO)
    }
}
