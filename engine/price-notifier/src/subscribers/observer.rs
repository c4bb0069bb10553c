use crate::error::DeliveryError;
use crate::subscriber::Subscriber;
use crate::types::{Price, Symbol};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

/// A notification as seen by an observer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub symbol: Symbol,
    pub price: Price,
    pub received_at: DateTime<Utc>,
}

/// Records every price it is handed and never fails
#[derive(Debug, Default)]
pub struct PassThroughObserver {
    receipts: Mutex<Vec<Receipt>>,
}

impl PassThroughObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Receipts in completion order
    pub fn receipts(&self) -> Vec<Receipt> {
        self.receipts.lock().clone()
    }

    pub fn receipt_count(&self) -> usize {
        self.receipts.lock().len()
    }
}

#[async_trait]
impl Subscriber for PassThroughObserver {
    async fn on_price(&self, symbol: &Symbol, price: Price) -> Result<(), DeliveryError> {
        tracing::info!("Observer received {} @ {}", symbol, price);
        self.receipts.lock().push(Receipt {
            symbol: symbol.clone(),
            price,
            received_at: Utc::now(),
        });
        Ok(())
    }
}
