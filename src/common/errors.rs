//! Error types for the engine and its collaborators

use thiserror::Error;

/// Result type alias using our EngineError
pub type Result<T> = std::result::Result<T, EngineError>;

/// Main error type for engine and exchange facade operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// No holdings have been recorded for the pair, so there is no cost basis
    #[error("No cost basis recorded for {0}")]
    NoCostBasis(String),

    /// The exchange refused to open an order
    #[error("Exchange rejected order: {0}")]
    ExchangeRejected(String),

    /// I/O failure while talking to the exchange about an order (cancel, status)
    #[error("Order I/O failure: {0}")]
    OrderIo(String),

    /// The exchange returned something we could not interpret
    #[error("Malformed exchange response: {0}")]
    MalformedResponse(String),

    /// Any other exchange-side fault
    #[error("Exchange error: {0}")]
    Exchange(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Errors the decision engine absorbs into a report instead of
    /// propagating to the scheduler.
    pub fn is_reportable(&self) -> bool {
        matches!(self, EngineError::ExchangeRejected(_) | EngineError::OrderIo(_))
    }
}

impl From<config::ConfigError> for EngineError {
    fn from(err: config::ConfigError) -> Self {
        EngineError::Configuration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reportable_errors() {
        assert!(EngineError::ExchangeRejected("min notional".into()).is_reportable());
        assert!(EngineError::OrderIo("timeout".into()).is_reportable());
        assert!(!EngineError::MalformedResponse("bad json".into()).is_reportable());
        assert!(!EngineError::NoCostBasis("BTC/USD".into()).is_reportable());
    }

    #[test]
    fn test_error_messages() {
        let err = EngineError::ExchangeRejected("insufficient funds".into());
        assert_eq!(err.to_string(), "Exchange rejected order: insufficient funds");
    }
}
