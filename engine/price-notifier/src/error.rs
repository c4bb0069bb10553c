//! Error types for PriceNotifier

use crate::types::{Price, Symbol};
use std::time::Duration;
use thiserror::Error;

/// Errors returned by engine operations
///
/// None of these are fatal: every rejection is also recorded in the event log
/// and the engine stays available.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotifierError {
    #[error("Unknown symbol: {symbol}")]
    UnknownSymbol { symbol: Symbol },

    #[error("Invalid symbol '{symbol}': {reason}")]
    InvalidSymbol { symbol: String, reason: String },

    #[error("Invalid price '{price}': {reason}")]
    InvalidPrice { price: String, reason: String },

    #[error("Invalid thresholds for {symbol}: buy below {buy_below} exceeds sell above {sell_above}")]
    InvalidThresholds { symbol: Symbol, buy_below: Price, sell_above: Price },

    #[error("PriceNotifier is shutting down")]
    ShuttingDown,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl NotifierError {
    pub(crate) fn non_positive(price: Price) -> Self {
        NotifierError::InvalidPrice {
            price: price.to_string(),
            reason: "price must be greater than zero".to_string(),
        }
    }
}

/// Outcome of a single subscriber delivery that did not succeed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("{0}")]
    Failed(String),

    #[error("delivery timed out after {}ms", .0.as_millis())]
    TimedOut(Duration),

    #[error("subscriber panicked: {0}")]
    Panicked(String),
}

impl DeliveryError {
    pub fn failed(message: impl Into<String>) -> Self {
        DeliveryError::Failed(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let symbol = Symbol::parse("AAPL").unwrap();
        let err = NotifierError::UnknownSymbol { symbol };
        assert_eq!(err.to_string(), "Unknown symbol: AAPL");

        let err = NotifierError::non_positive(Price::new(-5, 0));
        assert_eq!(err.to_string(), "Invalid price '-5': price must be greater than zero");
    }

    #[test]
    fn test_delivery_error_messages() {
        assert_eq!(DeliveryError::failed("smtp down").to_string(), "smtp down");
        assert_eq!(
            DeliveryError::TimedOut(Duration::from_millis(250)).to_string(),
            "delivery timed out after 250ms"
        );
        assert_eq!(
            DeliveryError::Panicked("boom".to_string()).to_string(),
            "subscriber panicked: boom"
        );
    }
}
