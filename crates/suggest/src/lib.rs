//! Turns a classified alert plus a market snapshot into a risk-bounded
//! trade proposal. Pure: no I/O, no clocks, no side effects; every
//! output is a function of the inputs, which keeps the whole crate
//! reproducible under test.

pub mod risk;
pub mod suggester;

pub use risk::RiskParams;
pub use suggester::{NoTradeReason, SuggestOutcome, SuggesterConfig, TradeSuggester};
