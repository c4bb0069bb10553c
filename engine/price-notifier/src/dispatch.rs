// Notification dispatch for PriceNotifier

use crate::config::DispatchConfig;
use crate::error::DeliveryError;
use crate::event_log::EventLog;
use crate::metrics::MetricsCollector;
use crate::registry::SubscriptionRegistry;
use crate::subscriber::SubscriberHandle;
use crate::types::{Price, Symbol};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;

/// Fans a price change out to every current subscriber of a symbol
///
/// Each delivery is its own task on the worker pool. `dispatch` returns as
/// soon as the tasks are spawned; errors, panics and timeouts stay inside the
/// task that produced them.
pub struct NotificationDispatcher {
    config: DispatchConfig,
    registry: Arc<SubscriptionRegistry>,
    runtime: Handle,
    log: Arc<EventLog>,
    metrics: Arc<MetricsCollector>,
}

impl NotificationDispatcher {
    pub fn new(
        config: DispatchConfig,
        registry: Arc<SubscriptionRegistry>,
        runtime: Handle,
        log: Arc<EventLog>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self { config, registry, runtime, log, metrics }
    }

    /// Schedule one delivery per subscriber; returns how many were scheduled
    pub fn dispatch(&self, symbol: &Symbol, price: Price) -> usize {
        let subscribers = self.registry.snapshot(symbol);
        if subscribers.is_empty() {
            tracing::debug!("No subscribers for {}, nothing to dispatch", symbol);
            return 0;
        }

        let scheduled = subscribers.len();
        for handle in subscribers {
            self.spawn_delivery(handle, symbol.clone(), price);
        }

        self.metrics.deliveries_scheduled_total.add(scheduled as u64);
        tracing::debug!("Dispatched {} @ {} to {} subscriber(s)", symbol, price, scheduled);
        scheduled
    }

    fn spawn_delivery(&self, handle: SubscriberHandle, symbol: Symbol, price: Price) {
        let log = self.log.clone();
        let metrics = self.metrics.clone();
        let deadline = self.config.delivery_timeout();
        let in_flight = InFlight::begin(
            metrics.clone(),
            log.clone(),
            format!("Delivery of {symbol} @ {price} to '{}'", handle.name()),
        );

        self.runtime.spawn(async move {
            let started = Instant::now();
            let outcome = AssertUnwindSafe(deliver_with_deadline(&handle, &symbol, price, deadline))
                .catch_unwind()
                .await
                .unwrap_or_else(|payload| Err(DeliveryError::Panicked(panic_message(payload))));
            metrics.delivery_latency.record(started.elapsed().as_micros() as u64);

            match outcome {
                Ok(()) => {
                    handle.record_delivery();
                    metrics.deliveries_succeeded_total.inc();
                    log.info(format!("Delivered {symbol} @ {price} to '{}'", handle.name()));
                }
                Err(e) => {
                    metrics.deliveries_failed_total.inc();
                    log.failure(format!("{} failed: {e}", in_flight.label));
                }
            }

            in_flight.settle();
        });
    }

    /// Deliveries scheduled but not yet finished
    pub fn in_flight(&self) -> u64 {
        self.metrics.deliveries_in_flight.get()
    }

    /// Block until no deliveries are in flight or `timeout` elapses
    ///
    /// Returns `true` if the pool went idle. Must not be called from a worker
    /// thread of the runtime the deliveries run on.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.in_flight() == 0 {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }
}

/// One scheduled delivery, counted in the in-flight gauge until dropped
///
/// A task the runtime drops before completion (runtime shut down) never
/// settles; the drop then records the delivery as abandoned.
struct InFlight {
    metrics: Arc<MetricsCollector>,
    log: Arc<EventLog>,
    label: String,
    settled: bool,
}

impl InFlight {
    fn begin(metrics: Arc<MetricsCollector>, log: Arc<EventLog>, label: String) -> Self {
        metrics.deliveries_in_flight.inc();
        Self { metrics, log, label, settled: false }
    }

    fn settle(mut self) {
        self.settled = true;
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if !self.settled {
            self.metrics.deliveries_failed_total.inc();
            self.log.failure(format!("{} abandoned: runtime shut down", self.label));
        }
        self.metrics.deliveries_in_flight.dec();
    }
}

async fn deliver_with_deadline(
    handle: &SubscriberHandle,
    symbol: &Symbol,
    price: Price,
    deadline: Option<Duration>,
) -> Result<(), DeliveryError> {
    match deadline {
        Some(limit) => tokio::time::timeout(limit, handle.deliver(symbol, price))
            .await
            .unwrap_or(Err(DeliveryError::TimedOut(limit))),
        None => handle.deliver(symbol, price).await,
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
