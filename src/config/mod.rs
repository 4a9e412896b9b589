use rust_decimal::Decimal;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::flow::{BettingFlow, BettingLimits};
use crate::odds::ReconnectPolicy;

const DEFAULT_API_URL: &str = "http://localhost:3001";
const DEFAULT_WS_URL: &str = "ws://localhost:3001";

/// Which transport feeds the odds stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OddsTransport {
    Ws,
    Poll,
}

impl FromStr for OddsTransport {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ws" | "websocket" => Ok(OddsTransport::Ws),
            "poll" | "polling" => Ok(OddsTransport::Poll),
            other => Err(anyhow::anyhow!("ODDS_TRANSPORT must be 'ws' or 'poll', got '{other}'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Collaborators
    pub api_url: String,
    pub odds_ws_url: String,
    pub odds_transport: OddsTransport,
    pub odds_poll_interval_ms: u64,
    pub event_id: Option<String>,

    // Betting limits
    pub min_stake: Decimal,
    pub max_stake: Decimal,
    pub max_bets_per_event: usize,

    // Reconnection
    pub reconnect_base_ms: u64,
    pub reconnect_max_ms: u64,
    pub reconnect_max_attempts: u32,

    pub request_timeout_secs: u64,
    pub recent_updates_capacity: usize,
    pub duplicate_window_secs: u64,
    pub preferences_path: Option<PathBuf>,
    pub metrics_enabled: bool,
    /// Bind address for the status endpoint; disabled when unset.
    pub status_addr: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let limits = BettingLimits::default();
        Self {
            api_url: DEFAULT_API_URL.into(),
            odds_ws_url: DEFAULT_WS_URL.into(),
            odds_transport: OddsTransport::Ws,
            odds_poll_interval_ms: 5_000,
            event_id: None,
            min_stake: limits.min_stake,
            max_stake: limits.max_stake,
            max_bets_per_event: limits.max_bets_per_event,
            reconnect_base_ms: 1_000,
            reconnect_max_ms: 30_000,
            reconnect_max_attempts: 5,
            request_timeout_secs: 15,
            recent_updates_capacity: 50,
            duplicate_window_secs: 10,
            preferences_path: None,
            metrics_enabled: false,
            status_addr: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let config = Self {
            api_url: env::var("BET_API_URL").unwrap_or(defaults.api_url),
            odds_ws_url: env::var("ODDS_WS_URL").unwrap_or(defaults.odds_ws_url),
            odds_transport: env::var("ODDS_TRANSPORT")
                .unwrap_or_else(|_| "ws".into())
                .parse()?,
            odds_poll_interval_ms: env::var("ODDS_POLL_INTERVAL_MS")
                .unwrap_or_else(|_| "5000".into())
                .parse()?,
            event_id: env::var("EVENT_ID").ok().filter(|s| !s.trim().is_empty()),

            min_stake: env::var("MIN_STAKE")
                .unwrap_or_else(|_| "1".into())
                .parse()?,
            max_stake: env::var("MAX_STAKE")
                .unwrap_or_else(|_| "10000".into())
                .parse()?,
            max_bets_per_event: env::var("MAX_BETS_PER_EVENT")
                .unwrap_or_else(|_| "5".into())
                .parse()?,

            reconnect_base_ms: env::var("RECONNECT_BASE_MS")
                .unwrap_or_else(|_| "1000".into())
                .parse()?,
            reconnect_max_ms: env::var("RECONNECT_MAX_MS")
                .unwrap_or_else(|_| "30000".into())
                .parse()?,
            reconnect_max_attempts: env::var("RECONNECT_MAX_ATTEMPTS")
                .unwrap_or_else(|_| "5".into())
                .parse()?,

            request_timeout_secs: env::var("REQUEST_TIMEOUT_SECS")
                .unwrap_or_else(|_| "15".into())
                .parse()?,
            recent_updates_capacity: env::var("RECENT_UPDATES_CAPACITY")
                .unwrap_or_else(|_| "50".into())
                .parse()?,
            duplicate_window_secs: env::var("DUPLICATE_WINDOW_SECS")
                .unwrap_or_else(|_| "10".into())
                .parse()?,
            preferences_path: env::var("PREFERENCES_PATH").ok().map(PathBuf::from),
            metrics_enabled: env::var("METRICS_ENABLED")
                .unwrap_or_else(|_| "false".into())
                .parse()
                .unwrap_or(false),
            status_addr: env::var("STATUS_ADDR").ok().filter(|s| !s.trim().is_empty()),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.min_stake <= Decimal::ZERO {
            anyhow::bail!("MIN_STAKE must be positive");
        }
        if self.max_stake < self.min_stake {
            anyhow::bail!("MAX_STAKE ({}) is below MIN_STAKE ({})", self.max_stake, self.min_stake);
        }
        if self.max_bets_per_event == 0 {
            anyhow::bail!("MAX_BETS_PER_EVENT must be at least 1");
        }
        Ok(())
    }

    pub fn betting_limits(&self) -> BettingLimits {
        BettingLimits {
            min_stake: self.min_stake,
            max_stake: self.max_stake,
            max_bets_per_event: self.max_bets_per_event,
        }
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            base_delay: Duration::from_millis(self.reconnect_base_ms),
            max_delay: Duration::from_millis(self.reconnect_max_ms),
            max_attempts: self.reconnect_max_attempts,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.odds_poll_interval_ms)
    }

    pub fn duplicate_window(&self) -> Duration {
        Duration::from_secs(self.duplicate_window_secs)
    }

    /// A fresh betting flow with the configured limits and duplicate window.
    pub fn betting_flow(&self, user_balance: Decimal) -> BettingFlow {
        BettingFlow::with_duplicate_window(self.betting_limits(), user_balance, self.duplicate_window())
    }
}
