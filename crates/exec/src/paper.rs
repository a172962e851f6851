//! In-process simulated gateway and market data.
//!
//! Makes zero external calls; fills are simulated locally, so it is
//! impossible to execute real trades through this gateway. Used for
//! the paper run mode and for tests, which can inject transient
//! failures and control fill timing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use tracing::debug;

use zero_dte_core::error::{EngineError, Result};
use zero_dte_core::options::{MarketQuote, OptionsChain};

use crate::gateway::{
    CancelOutcome, ExecutionGateway, GatewayStatus, MarketData, OrderTicket, TicketKind,
};
use crate::lock_or_recover;

struct PaperOrder {
    ticket: OrderTicket,
    status: GatewayStatus,
}

struct Inner {
    seq: u64,
    orders: HashMap<String, PaperOrder>,
    /// Mark prices by contract code; market orders fill here.
    prices: HashMap<String, Decimal>,
}

/// Simulated execution gateway.
pub struct PaperGateway {
    inner: Mutex<Inner>,
    /// Fill orders as soon as they are accepted. Turned off by tests
    /// that need to control the fill moment.
    auto_fill: bool,
    fail_submits: AtomicU32,
}

impl PaperGateway {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                seq: 0,
                orders: HashMap::new(),
                prices: HashMap::new(),
            }),
            auto_fill: true,
            fail_submits: AtomicU32::new(0),
        }
    }

    /// Gateway that leaves orders working until `fill` is called.
    #[must_use]
    pub fn manual() -> Self {
        Self {
            auto_fill: false,
            ..Self::new()
        }
    }

    /// Make the next `n` submits fail as if the gateway were unreachable.
    pub fn inject_submit_failures(&self, n: u32) {
        self.fail_submits.store(n, Ordering::SeqCst);
    }

    /// Set the mark price market orders fill at for `code`.
    pub fn set_price(&self, code: &str, price: Decimal) {
        let mut inner = lock_or_recover(&self.inner);
        inner.prices.insert(code.to_string(), price);
    }

    /// Fill a working order at the given price (manual mode).
    pub fn fill(&self, gateway_id: &str, price: Decimal) {
        let mut inner = lock_or_recover(&self.inner);
        if let Some(order) = inner.orders.get_mut(gateway_id) {
            if order.status == GatewayStatus::Working {
                order.status = GatewayStatus::Filled { price };
            }
        }
    }

    fn fill_price(inner: &Inner, ticket: &OrderTicket) -> Result<Decimal> {
        match ticket.kind {
            TicketKind::Limit { price } => Ok(price),
            TicketKind::Market => inner.prices.get(&ticket.code).copied().ok_or_else(|| {
                EngineError::gateway(format!("no paper price for {}", ticket.code))
            }),
        }
    }
}

impl Default for PaperGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExecutionGateway for PaperGateway {
    async fn submit(&self, ticket: &OrderTicket) -> Result<String> {
        if self.fail_submits.load(Ordering::SeqCst) > 0 {
            self.fail_submits.fetch_sub(1, Ordering::SeqCst);
            return Err(EngineError::gateway("paper gateway unreachable (injected)"));
        }

        let mut inner = lock_or_recover(&self.inner);
        inner.seq += 1;
        let gateway_id = format!("paper-{}", inner.seq);

        let status = if self.auto_fill {
            GatewayStatus::Filled {
                price: Self::fill_price(&inner, ticket)?,
            }
        } else {
            GatewayStatus::Working
        };

        debug!(
            %gateway_id,
            order_id = %ticket.order_id,
            code = %ticket.code,
            quantity = ticket.quantity,
            "Paper order accepted"
        );
        inner.orders.insert(
            gateway_id.clone(),
            PaperOrder {
                ticket: ticket.clone(),
                status,
            },
        );
        Ok(gateway_id)
    }

    async fn cancel(&self, gateway_id: &str) -> Result<CancelOutcome> {
        let mut inner = lock_or_recover(&self.inner);
        let order = inner
            .orders
            .get_mut(gateway_id)
            .ok_or_else(|| EngineError::gateway(format!("unknown gateway order {gateway_id}")))?;
        match order.status {
            GatewayStatus::Filled { price } => {
                debug!(
                    %gateway_id,
                    code = %order.ticket.code,
                    %price,
                    "Cancel refused, order already filled"
                );
                Ok(CancelOutcome::AlreadyFilled { fill_price: price })
            }
            GatewayStatus::Working | GatewayStatus::Cancelled => {
                order.status = GatewayStatus::Cancelled;
                debug!(%gateway_id, code = %order.ticket.code, "Paper order cancelled");
                Ok(CancelOutcome::Cancelled)
            }
        }
    }

    async fn query_status(&self, gateway_id: &str) -> Result<GatewayStatus> {
        let inner = lock_or_recover(&self.inner);
        inner
            .orders
            .get(gateway_id)
            .map(|o| o.status)
            .ok_or_else(|| EngineError::gateway(format!("unknown gateway order {gateway_id}")))
    }
}

/// Simulated market data: whatever the test or demo loaded into it.
pub struct PaperMarketData {
    inner: Mutex<PaperMarket>,
}

struct PaperMarket {
    quotes: HashMap<String, Decimal>,
    option_quotes: HashMap<String, Decimal>,
    chains: HashMap<String, OptionsChain>,
}

impl PaperMarketData {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(PaperMarket {
                quotes: HashMap::new(),
                option_quotes: HashMap::new(),
                chains: HashMap::new(),
            }),
        }
    }

    pub fn set_quote(&self, ticker: &str, price: Decimal) {
        let mut inner = lock_or_recover(&self.inner);
        inner.quotes.insert(ticker.to_string(), price);
    }

    pub fn set_option_quote(&self, code: &str, price: Decimal) {
        let mut inner = lock_or_recover(&self.inner);
        inner.option_quotes.insert(code.to_string(), price);
    }

    pub fn set_chain(&self, chain: OptionsChain) {
        let mut inner = lock_or_recover(&self.inner);
        inner.chains.insert(chain.underlying.clone(), chain);
    }
}

impl Default for PaperMarketData {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketData for PaperMarketData {
    async fn quote(&self, ticker: &str) -> Result<MarketQuote> {
        let inner = lock_or_recover(&self.inner);
        inner
            .quotes
            .get(ticker)
            .map(|price| MarketQuote {
                ticker: ticker.to_string(),
                price: *price,
                timestamp: Utc::now(),
            })
            .ok_or_else(|| EngineError::gateway(format!("no paper quote for {ticker}")))
    }

    async fn option_quote(&self, code: &str) -> Result<MarketQuote> {
        let inner = lock_or_recover(&self.inner);
        inner
            .option_quotes
            .get(code)
            .map(|price| MarketQuote {
                ticker: code.to_string(),
                price: *price,
                timestamp: Utc::now(),
            })
            .ok_or_else(|| EngineError::gateway(format!("no paper quote for {code}")))
    }

    async fn chain(&self, ticker: &str, _expiry: NaiveDate) -> Result<OptionsChain> {
        let inner = lock_or_recover(&self.inner);
        inner
            .chains
            .get(ticker)
            .cloned()
            .ok_or_else(|| EngineError::gateway(format!("no paper chain for {ticker}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{ExecutionMode, TicketSide};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn ticket(kind: TicketKind) -> OrderTicket {
        OrderTicket {
            order_id: Uuid::new_v4(),
            ticker: "SPX".to_string(),
            code: "SPXW5900C".to_string(),
            side: TicketSide::Buy,
            quantity: 1,
            kind,
            mode: ExecutionMode::Paper,
        }
    }

    #[tokio::test]
    async fn auto_fill_fills_limit_orders_at_the_limit() {
        let gateway = PaperGateway::new();
        let id = gateway
            .submit(&ticket(TicketKind::Limit { price: dec!(2.50) }))
            .await
            .unwrap();
        assert_eq!(
            gateway.query_status(&id).await.unwrap(),
            GatewayStatus::Filled { price: dec!(2.50) }
        );
    }

    #[tokio::test]
    async fn market_orders_fill_at_the_mark() {
        let gateway = PaperGateway::new();
        gateway.set_price("SPXW5900C", dec!(3.10));
        let id = gateway.submit(&ticket(TicketKind::Market)).await.unwrap();
        assert_eq!(
            gateway.query_status(&id).await.unwrap(),
            GatewayStatus::Filled { price: dec!(3.10) }
        );
    }

    #[tokio::test]
    async fn market_order_without_a_mark_is_rejected() {
        let gateway = PaperGateway::new();
        assert!(gateway.submit(&ticket(TicketKind::Market)).await.is_err());
    }

    #[tokio::test]
    async fn cancel_of_a_filled_order_reports_already_filled() {
        let gateway = PaperGateway::new();
        let id = gateway
            .submit(&ticket(TicketKind::Limit { price: dec!(2.50) }))
            .await
            .unwrap();
        assert_eq!(
            gateway.cancel(&id).await.unwrap(),
            CancelOutcome::AlreadyFilled {
                fill_price: dec!(2.50)
            }
        );
    }

    #[tokio::test]
    async fn manual_mode_holds_orders_until_filled() {
        let gateway = PaperGateway::manual();
        let id = gateway
            .submit(&ticket(TicketKind::Limit { price: dec!(2.50) }))
            .await
            .unwrap();
        assert_eq!(gateway.query_status(&id).await.unwrap(), GatewayStatus::Working);
        assert_eq!(gateway.cancel(&id).await.unwrap(), CancelOutcome::Cancelled);
    }

    #[tokio::test]
    async fn injected_failures_are_transient() {
        let gateway = PaperGateway::new();
        gateway.inject_submit_failures(1);
        let t = ticket(TicketKind::Limit { price: dec!(2.50) });
        assert!(gateway.submit(&t).await.is_err());
        assert!(gateway.submit(&t).await.is_ok());
    }
}
