// Subscriber abstraction for PriceNotifier

use crate::error::DeliveryError;
use crate::metrics::AtomicCounter;
use crate::types::{Price, Symbol};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Receiver of price-change notifications
///
/// Implementations run on the delivery worker pool. Returning an error (or
/// panicking, or exceeding the configured deadline) counts as a failed
/// delivery for this subscriber only.
#[async_trait]
pub trait Subscriber: Send + Sync + 'static {
    async fn on_price(&self, symbol: &Symbol, price: Price) -> Result<(), DeliveryError>;
}

struct HandleInner {
    name: String,
    subscriber: Arc<dyn Subscriber>,
    deliveries: AtomicCounter,
}

/// Shared, reference-counted subscriber handle
///
/// Clones refer to the same subscriber and the same delivery counter. Two
/// handles are the same subscription target only if they are clones of one
/// another; equal names do not make handles equal.
#[derive(Clone)]
pub struct SubscriberHandle {
    inner: Arc<HandleInner>,
}

impl SubscriberHandle {
    pub fn new<S: Subscriber>(name: impl Into<String>, subscriber: S) -> Self {
        Self::from_arc(name, Arc::new(subscriber))
    }

    /// Wrap a subscriber the caller also keeps a reference to
    pub fn from_arc(name: impl Into<String>, subscriber: Arc<dyn Subscriber>) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                name: name.into(),
                subscriber,
                deliveries: AtomicCounter::new(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Number of successful deliveries across all symbols
    pub fn delivery_count(&self) -> u64 {
        self.inner.deliveries.get()
    }

    /// Identity comparison
    pub fn same_as(&self, other: &SubscriberHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) async fn deliver(&self, symbol: &Symbol, price: Price) -> Result<(), DeliveryError> {
        self.inner.subscriber.on_price(symbol, price).await
    }

    pub(crate) fn record_delivery(&self) {
        self.inner.deliveries.inc();
    }
}

impl fmt::Debug for SubscriberHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberHandle")
            .field("name", &self.inner.name)
            .field("deliveries", &self.delivery_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;

    #[async_trait]
    impl Subscriber for Noop {
        async fn on_price(&self, _symbol: &Symbol, _price: Price) -> Result<(), DeliveryError> {
            Ok(())
        }
    }

    #[test]
    fn test_identity_is_not_name() {
        let a = SubscriberHandle::new("alerts", Noop);
        let b = SubscriberHandle::new("alerts", Noop);
        let a_clone = a.clone();

        assert!(a.same_as(&a_clone));
        assert!(!a.same_as(&b));
        assert_eq!(a.name(), b.name());
    }

    #[test]
    fn test_counter_is_shared_between_clones() {
        let handle = SubscriberHandle::new("desk", Noop);
        let clone = handle.clone();

        handle.record_delivery();
        clone.record_delivery();

        assert_eq!(handle.delivery_count(), 2);
        assert_eq!(clone.delivery_count(), 2);
    }

    #[tokio::test]
    async fn test_deliver_forwards_to_subscriber() {
        let handle = SubscriberHandle::new("noop", Noop);
        let symbol = Symbol::parse("AAPL").unwrap();
        assert!(handle.deliver(&symbol, Price::new(100, 0)).await.is_ok());
        // Counting is the dispatcher's job
        assert_eq!(handle.delivery_count(), 0);
    }
}
