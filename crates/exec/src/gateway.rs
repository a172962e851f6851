//! External collaborator boundaries: execution gateway and market data.
//!
//! The engine talks to the brokerage and the data feed only through
//! these traits; the in-repo implementation is the paper gateway.

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use zero_dte_core::error::{EngineError, Result};
use zero_dte_core::options::{MarketQuote, OptionsChain};

/// Paper vs live execution. Opaque to the engine: it rides on the
/// ticket and only the gateway interprets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    Paper,
    Live,
}

impl std::str::FromStr for ExecutionMode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "paper" => Ok(Self::Paper),
            "live" => Ok(Self::Live),
            other => Err(EngineError::Configuration(format!(
                "unknown execution mode {other:?} (expected \"paper\" or \"live\")"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketKind {
    Market,
    Limit { price: Decimal },
}

/// What the engine hands the gateway: one instruction per leg set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderTicket {
    /// Engine-side order id, for log correlation.
    pub order_id: Uuid,
    pub ticker: String,
    /// Contract code of the (primary) leg.
    pub code: String,
    pub side: TicketSide,
    pub quantity: u32,
    pub kind: TicketKind,
    pub mode: ExecutionMode,
}

/// Result of a cancel request. A fill that races the cancel wins.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CancelOutcome {
    Cancelled,
    AlreadyFilled { fill_price: Decimal },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GatewayStatus {
    Working,
    Filled { price: Decimal },
    Cancelled,
}

/// Brokerage execution boundary.
#[async_trait]
pub trait ExecutionGateway: Send + Sync {
    /// Submit a ticket; returns the gateway's order id.
    async fn submit(&self, ticket: &OrderTicket) -> Result<String>;

    /// Best-effort cancel. `AlreadyFilled` means the fill won the race.
    async fn cancel(&self, gateway_id: &str) -> Result<CancelOutcome>;

    async fn query_status(&self, gateway_id: &str) -> Result<GatewayStatus>;
}

/// Price and chain retrieval boundary.
#[async_trait]
pub trait MarketData: Send + Sync {
    async fn quote(&self, ticker: &str) -> Result<MarketQuote>;

    /// Mark price for a single option contract.
    async fn option_quote(&self, code: &str) -> Result<MarketQuote>;

    async fn chain(&self, ticker: &str, expiry: NaiveDate) -> Result<OptionsChain>;
}
