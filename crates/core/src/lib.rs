pub mod config;
pub mod config_loader;
pub mod error;
pub mod options;
pub mod session;
pub mod signal;
pub mod suggestion;

pub use config::{
    AccountConfig, AppConfig, GatewayConfig, SessionConfig, TrackerConfig, TradingConfig,
};
pub use config_loader::ConfigLoader;
pub use error::{EngineError, Result};
pub use options::{MarketQuote, OptionContract, OptionRight, OptionsChain};
pub use session::{EntryGate, SessionClock, SessionPhase, SessionPolicy};
pub use signal::{AlertSignal, SignalAction, SignalType};
pub use suggestion::{TradeSuggestion, TradeType};
