// Core value types for PriceNotifier

use crate::error::NotifierError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Instrument price (scale is preserved, so `180.50` displays as `180.50`)
pub type Price = Decimal;

/// Maximum accepted symbol length
pub const MAX_SYMBOL_LEN: usize = 32;

/// Instrument symbol
///
/// Always upper-case ASCII. Construct with [`Symbol::parse`] or `str::parse`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol(String);

impl Symbol {
    /// Parse and normalize a raw symbol
    ///
    /// Surrounding whitespace is trimmed and the result upper-cased. Allowed
    /// characters are ASCII alphanumerics plus `.`, `-`, `/` and `_`.
    pub fn parse(raw: &str) -> Result<Self, NotifierError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(NotifierError::InvalidSymbol {
                symbol: raw.to_string(),
                reason: "symbol is empty".to_string(),
            });
        }

        if trimmed.len() > MAX_SYMBOL_LEN {
            return Err(NotifierError::InvalidSymbol {
                symbol: raw.to_string(),
                reason: format!("longer than {MAX_SYMBOL_LEN} characters"),
            });
        }

        if let Some(bad) = trimmed
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '/' | '_')))
        {
            return Err(NotifierError::InvalidSymbol {
                symbol: raw.to_string(),
                reason: format!("unsupported character '{bad}'"),
            });
        }

        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Symbol {
    type Err = NotifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Symbol {
    type Error = NotifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Symbol> for String {
    fn from(symbol: Symbol) -> Self {
        symbol.0
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Parse a raw price string
pub fn parse_price(raw: &str) -> Result<Price, NotifierError> {
    Decimal::from_str(raw.trim()).map_err(|e| NotifierError::InvalidPrice {
        price: raw.trim().to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_normalization() {
        let symbol = Symbol::parse("  aapl ").unwrap();
        assert_eq!(symbol.as_str(), "AAPL");
        assert_eq!(symbol.to_string(), "AAPL");

        let symbol: Symbol = "btc/usdt".parse().unwrap();
        assert_eq!(symbol.as_str(), "BTC/USDT");
    }

    #[test]
    fn test_symbol_rejects_bad_input() {
        assert!(matches!(Symbol::parse(""), Err(NotifierError::InvalidSymbol { .. })));
        assert!(matches!(Symbol::parse("   "), Err(NotifierError::InvalidSymbol { .. })));
        assert!(matches!(Symbol::parse("AA PL"), Err(NotifierError::InvalidSymbol { .. })));
        assert!(matches!(Symbol::parse("A$"), Err(NotifierError::InvalidSymbol { .. })));

        let too_long = "X".repeat(MAX_SYMBOL_LEN + 1);
        assert!(Symbol::parse(&too_long).is_err());
        assert!(Symbol::parse(&"X".repeat(MAX_SYMBOL_LEN)).is_ok());
    }

    #[test]
    fn test_symbol_serde_validates() {
        let symbol: Symbol = serde_json::from_str("\"tsla\"").unwrap();
        assert_eq!(symbol.as_str(), "TSLA");
        assert!(serde_json::from_str::<Symbol>("\"\"").is_err());
    }

    #[test]
    fn test_parse_price_keeps_scale() {
        let price = parse_price("180.50").unwrap();
        assert_eq!(price.to_string(), "180.50");
        assert_eq!(price, Decimal::new(18050, 2));

        assert!(matches!(parse_price("abc"), Err(NotifierError::InvalidPrice { .. })));
    }
}
