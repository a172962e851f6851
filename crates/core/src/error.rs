//! Error taxonomy for the lifecycle engine.
//!
//! Four classes: input rejection (auth, malformed, session closed),
//! policy rejection (limits, halt, unaffordable size), state conflict
//! (invalid transition, not found, already filled), and infrastructure
//! (gateway, timeout). Only infrastructure errors are
//! retryable; everything else reports synchronously to the caller.

use thiserror::Error;
use uuid::Uuid;

/// Errors raised by the signal-to-order lifecycle engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Inbound alert passphrase does not match the configured secret.
    #[error("authentication failed")]
    Authentication,

    /// Inbound alert payload could not be interpreted.
    #[error("malformed signal: {0}")]
    MalformedSignal(String),

    /// Session clock disallows new entries right now.
    #[error("session closed for new trades ({phase})")]
    SessionClosed {
        /// The phase that rejected the entry.
        phase: String,
    },

    /// Concurrent position limit reached.
    #[error("position limit reached: {current} of {max}")]
    LimitExceeded { current: usize, max: usize },

    /// Daily loss limit tripped; no new orders until the ledger resets.
    #[error("risk halted: daily P&L {daily_pnl} breached the loss limit")]
    RiskHalted { daily_pnl: String },

    /// A non-terminal order already exists for the same legs.
    #[error("duplicate proposal for {proposal_key}")]
    DuplicateProposal { proposal_key: String },

    /// Order or position id is unknown.
    #[error("not found: {id}")]
    NotFound { id: Uuid },

    /// Transition requested from the wrong state. Carries the actual
    /// state so the caller can reconcile.
    #[error("invalid state for {id}: expected {expected}, actual {actual}")]
    InvalidState {
        id: Uuid,
        expected: &'static str,
        actual: String,
    },

    /// Cancel raced a fill and the fill won.
    #[error("order {id} already filled")]
    AlreadyFilled { id: Uuid },

    /// Execution gateway could not be reached or errored.
    #[error("gateway error: {0}")]
    Gateway(String),

    /// A bounded wait on an external call expired.
    #[error("timeout: {0}")]
    Timeout(String),

    /// Configuration is invalid or unusable.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl EngineError {
    pub fn session_closed(phase: impl std::fmt::Display) -> Self {
        Self::SessionClosed {
            phase: phase.to_string(),
        }
    }

    pub fn invalid_state(id: Uuid, expected: &'static str, actual: impl std::fmt::Display) -> Self {
        Self::InvalidState {
            id,
            expected,
            actual: actual.to_string(),
        }
    }

    pub fn gateway(message: impl Into<String>) -> Self {
        Self::Gateway(message.into())
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout(message.into())
    }

    /// True for infrastructure failures worth retrying with backoff.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Gateway(_) | Self::Timeout(_))
    }

    /// True when the caller can recover by adjusting parameters or
    /// waiting (policy rejections).
    #[must_use]
    pub fn is_policy_rejection(&self) -> bool {
        matches!(
            self,
            Self::LimitExceeded { .. } | Self::RiskHalted { .. } | Self::DuplicateProposal { .. }
        )
    }
}

/// Result alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
