//! Signal intake: authenticate, validate, gate, suggest, create.
//!
//! The processor is the single front door for alert signals. It never
//! mutates the book itself; everything past validation is delegated to
//! the suggester and the order manager.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{info, warn};

use zero_dte_core::error::{EngineError, Result};
use zero_dte_core::session::SessionClock;
use zero_dte_core::signal::AlertSignal;

use zero_dte_suggest::suggester::{NoTradeReason, SuggestOutcome, TradeSuggester};

use crate::gateway::MarketData;
use crate::manager::OrderManager;
use crate::order::Order;

/// What became of a signal that passed validation.
#[derive(Debug)]
pub enum ProcessOutcome {
    /// A suggestion was produced and an order created from it.
    OrderCreated(Box<Order>),
    /// The suggester declined; nothing entered the book.
    NoTrade(NoTradeReason),
}

pub struct SignalProcessor {
    passphrase: String,
    clock: SessionClock,
    suggester: TradeSuggester,
    market: Arc<dyn MarketData>,
    manager: Arc<OrderManager>,
    market_timeout: Duration,
}

impl SignalProcessor {
    #[must_use]
    pub fn new(
        passphrase: String,
        clock: SessionClock,
        suggester: TradeSuggester,
        market: Arc<dyn MarketData>,
        manager: Arc<OrderManager>,
        market_timeout: Duration,
    ) -> Self {
        Self {
            passphrase,
            clock,
            suggester,
            market,
            manager,
            market_timeout,
        }
    }

    /// Process one incoming signal end to end.
    ///
    /// Order of checks: passphrase, payload sanity, session gate. Only
    /// then are the live quote and the chain fetched and the suggester
    /// consulted, so a bad signal never costs a market-data round trip.
    pub async fn handle(&self, signal: AlertSignal) -> Result<ProcessOutcome> {
        if signal.passphrase != self.passphrase {
            warn!(ticker = %signal.ticker, "Signal rejected: bad passphrase");
            return Err(EngineError::Authentication);
        }
        if signal.price <= Decimal::ZERO {
            return Err(EngineError::MalformedSignal(format!(
                "non-positive price {}",
                signal.price
            )));
        }

        let phase = self.clock.phase_now();
        if !self.clock.entry_gate(phase).is_allowed() {
            info!(%phase, signal = %signal.signal_type, "Signal dropped: entries closed");
            return Err(EngineError::session_closed(phase));
        }

        let quote = tokio::time::timeout(self.market_timeout, self.market.quote(&signal.ticker))
            .await
            .map_err(|_| EngineError::timeout("quote fetch"))??;

        info!(
            signal = %signal.signal_type,
            ticker = %signal.ticker,
            alert_price = %signal.price,
            live_price = %quote.price,
            %phase,
            "Signal accepted"
        );

        let expiry = self.clock.trading_day();
        let chain = tokio::time::timeout(
            self.market_timeout,
            self.market.chain(&signal.ticker, expiry),
        )
        .await
        .map_err(|_| EngineError::timeout("chain fetch"))??;

        let now = Utc::now();
        let minutes_to_close = self
            .clock
            .minutes_to_close(self.clock.now_market().time());

        match self
            .suggester
            .suggest(&signal, &chain, phase, minutes_to_close, now)
        {
            SuggestOutcome::NoTrade(reason) => {
                info!(%reason, "No trade suggested");
                Ok(ProcessOutcome::NoTrade(reason))
            }
            SuggestOutcome::Trade(suggestion) => {
                let order = self.manager.create(*suggestion).await?;
                Ok(ProcessOutcome::OrderCreated(Box::new(order)))
            }
        }
    }
}
