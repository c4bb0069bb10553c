use crate::error::{DeliveryError, NotifierError};
use crate::subscriber::Subscriber;
use crate::types::{Price, Symbol};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::fmt;

/// Trading signal produced by a [`ThresholdRule`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Signal::Buy => "BUY",
            Signal::Sell => "SELL",
            Signal::Hold => "HOLD",
        };
        f.write_str(label)
    }
}

/// Per-symbol trigger levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    /// Prices strictly below this trigger a buy
    pub buy_below: Price,
    /// Prices strictly above this trigger a sell
    pub sell_above: Price,
}

impl Thresholds {
    pub fn classify(&self, price: Price) -> Signal {
        if price < self.buy_below {
            Signal::Buy
        } else if price > self.sell_above {
            Signal::Sell
        } else {
            Signal::Hold
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalRecord {
    pub symbol: Symbol,
    pub price: Price,
    pub signal: Signal,
}

/// Classifies each notified price against per-symbol thresholds
///
/// Symbols without thresholds always classify as [`Signal::Hold`].
#[derive(Debug, Default)]
pub struct ThresholdRule {
    thresholds: DashMap<Symbol, Thresholds>,
    history: Mutex<Vec<SignalRecord>>,
}

impl ThresholdRule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_thresholds(
        &self,
        symbol: Symbol,
        buy_below: Price,
        sell_above: Price,
    ) -> Result<(), NotifierError> {
        if buy_below > sell_above {
            return Err(NotifierError::InvalidThresholds { symbol, buy_below, sell_above });
        }
        self.thresholds.insert(symbol, Thresholds { buy_below, sell_above });
        Ok(())
    }

    pub fn thresholds(&self, symbol: &Symbol) -> Option<Thresholds> {
        self.thresholds.get(symbol).map(|entry| *entry)
    }

    pub fn classify(&self, symbol: &Symbol, price: Price) -> Signal {
        self.thresholds(symbol).map(|t| t.classify(price)).unwrap_or(Signal::Hold)
    }

    /// Most recently recorded signal for a symbol
    pub fn last_signal(&self, symbol: &Symbol) -> Option<Signal> {
        self.history.lock().iter().rev().find(|r| &r.symbol == symbol).map(|r| r.signal)
    }

    /// All signals in completion order
    pub fn history(&self) -> Vec<SignalRecord> {
        self.history.lock().clone()
    }
}

#[async_trait]
impl Subscriber for ThresholdRule {
    async fn on_price(&self, symbol: &Symbol, price: Price) -> Result<(), DeliveryError> {
        let signal = self.classify(symbol, price);
        match signal {
            Signal::Hold => tracing::debug!("{} @ {}: {}", symbol, price, signal),
            _ => tracing::info!("{} @ {}: {} triggered", symbol, price, signal),
        }

        self.history.lock().push(SignalRecord { symbol: symbol.clone(), price, signal });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(s: &str) -> Symbol {
        Symbol::parse(s).unwrap()
    }

    fn px(s: &str) -> Price {
        s.parse().unwrap()
    }

    #[test]
    fn test_classification_boundaries() {
        let t = Thresholds { buy_below: px("170"), sell_above: px("200") };
        assert_eq!(t.classify(px("169.99")), Signal::Buy);
        assert_eq!(t.classify(px("170")), Signal::Hold);
        assert_eq!(t.classify(px("200")), Signal::Hold);
        assert_eq!(t.classify(px("200.01")), Signal::Sell);
    }

    #[test]
    fn test_rejects_inverted_thresholds() {
        let rule = ThresholdRule::new();
        let result = rule.set_thresholds(sym("AAPL"), px("210"), px("200"));
        assert!(matches!(result, Err(NotifierError::InvalidThresholds { .. })));
        assert!(rule.thresholds(&sym("AAPL")).is_none());

        // A single trigger level is allowed
        assert!(rule.set_thresholds(sym("AAPL"), px("200"), px("200")).is_ok());
    }

    #[test]
    fn test_unconfigured_symbol_holds() {
        let rule = ThresholdRule::new();
        assert_eq!(rule.classify(&sym("TSLA"), px("1")), Signal::Hold);
    }

    #[tokio::test]
    async fn test_records_signals() {
        let rule = ThresholdRule::new();
        rule.set_thresholds(sym("AAPL"), px("170"), px("200")).unwrap();

        rule.on_price(&sym("AAPL"), px("165.00")).await.unwrap();
        assert_eq!(rule.last_signal(&sym("AAPL")), Some(Signal::Buy));

        rule.on_price(&sym("AAPL"), px("205.00")).await.unwrap();
        assert_eq!(rule.last_signal(&sym("AAPL")), Some(Signal::Sell));

        rule.on_price(&sym("TSLA"), px("5")).await.unwrap();
        assert_eq!(rule.last_signal(&sym("TSLA")), Some(Signal::Hold));
        assert_eq!(rule.last_signal(&sym("AAPL")), Some(Signal::Sell));
        assert_eq!(rule.last_signal(&sym("MSFT")), None);

        assert_eq!(rule.history().len(), 3);
    }
}
