use crate::error::DeliveryError;
use crate::subscriber::Subscriber;
use crate::types::{Price, Symbol};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Simulates pushing a price alert over an external channel (email, SMS, ...)
///
/// Each send waits for the configured latency. While the channel is marked
/// offline every send fails.
#[derive(Debug)]
pub struct SimulatedNotifier {
    channel: String,
    latency: Duration,
    online: AtomicBool,
    sent: Mutex<Vec<String>>,
}

impl SimulatedNotifier {
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            latency: Duration::ZERO,
            online: AtomicBool::new(true),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::Relaxed);
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Relaxed)
    }

    /// Messages that were successfully sent
    pub fn sent_messages(&self) -> Vec<String> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl Subscriber for SimulatedNotifier {
    async fn on_price(&self, symbol: &Symbol, price: Price) -> Result<(), DeliveryError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if !self.is_online() {
            return Err(DeliveryError::failed(format!("{} channel unavailable", self.channel)));
        }

        let message = format!("[{}] {} is now {}", self.channel, symbol, price);
        tracing::info!("Sent notification: {}", message);
        self.sent.lock().push(message);
        Ok(())
    }
}
