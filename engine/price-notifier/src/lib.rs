// PriceNotifier - instrument price table with concurrent subscriber fanout

mod config;
mod dispatch;
mod error;
mod event_log;
mod instruments;
mod metrics;
mod registry;
mod shutdown;
mod subscriber;
pub mod subscribers;
mod types;


pub use config::{DispatchConfig, NotifierConfig, PricePolicy, ShutdownConfig};
pub use dispatch::NotificationDispatcher;
pub use error::{DeliveryError, NotifierError};
pub use event_log::{EntryKind, EventLog, LogEntry};
pub use instruments::{InstrumentTable, PriceChange};
pub use metrics::{MetricsCollector, NotifierMetrics};
pub use registry::{Registration, SubscriberSummary, SubscriptionRegistry, SubscriptionReport};
pub use shutdown::{ShutdownManager, UpdatePermit};
pub use subscriber::{Subscriber, SubscriberHandle};
pub use types::{parse_price, Price, Symbol};

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::{Handle, Runtime};

/// PriceNotifier - owns the instrument table, the subscription registry and
/// the audit log, and fans every accepted price update out to subscribers.
///
/// All methods are synchronous and safe to call from many threads at once.
/// Deliveries run on a tokio worker pool and never hold up the caller.
pub struct PriceNotifier {
    config: NotifierConfig,
    log: Arc<EventLog>,
    metrics: Arc<MetricsCollector>,

    instruments: InstrumentTable,
    registry: Arc<SubscriptionRegistry>,
    dispatcher: NotificationDispatcher,
    shutdown_manager: ShutdownManager,

    // Present only when the engine built its own worker pool
    runtime: Option<Runtime>,
    start_time: Instant,
}

/// Result of an accepted price update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceUpdate {
    pub symbol: Symbol,
    pub old_price: Price,
    pub new_price: Price,
    /// Deliveries handed to the worker pool (not yet completed)
    pub deliveries_scheduled: usize,
}

impl PriceNotifier {
    /// Create a PriceNotifier with its own delivery worker pool
    pub fn new(config: NotifierConfig) -> Result<Self, NotifierError> {
        config.validate()?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(config.dispatch.worker_threads)
            .thread_name(config.dispatch.thread_name.clone())
            .enable_all()
            .build()
            .map_err(|e| NotifierError::Config(format!("failed to start worker pool: {e}")))?;
        let handle = runtime.handle().clone();

        Ok(Self::build(config, handle, Some(runtime)))
    }

    /// Create a PriceNotifier that schedules deliveries on an existing runtime
    pub fn with_runtime(config: NotifierConfig, runtime: Handle) -> Result<Self, NotifierError> {
        config.validate()?;
        Ok(Self::build(config, runtime, None))
    }

    fn build(config: NotifierConfig, handle: Handle, runtime: Option<Runtime>) -> Self {
        let log = Arc::new(EventLog::new());
        let metrics = Arc::new(MetricsCollector::new());
        let instruments =
            InstrumentTable::new(config.pricing.clone(), log.clone(), metrics.clone());
        let registry = Arc::new(SubscriptionRegistry::new(log.clone(), metrics.clone()));
        let dispatcher = NotificationDispatcher::new(
            config.dispatch.clone(),
            registry.clone(),
            handle,
            log.clone(),
            metrics.clone(),
        );
        let shutdown_manager = ShutdownManager::new(config.shutdown.clone());

        tracing::info!(
            "PriceNotifier created (owned pool: {}, delivery timeout: {:?})",
            runtime.is_some(),
            config.dispatch.delivery_timeout()
        );

        Self {
            config,
            log,
            metrics,
            instruments,
            registry,
            dispatcher,
            shutdown_manager,
            runtime,
            start_time: Instant::now(),
        }
    }

    /// Add an instrument, or reset the price of an existing one
    ///
    /// Resetting does not notify subscribers and keeps their subscriptions.
    pub fn add_instrument(&self, symbol: Symbol, price: Price) -> Result<(), NotifierError> {
        // The list exists before any reader can see the instrument
        self.instruments.add_with(symbol, price, |symbol| self.registry.track(symbol))?;
        Ok(())
    }

    pub fn has_instrument(&self, symbol: &Symbol) -> bool {
        self.instruments.contains(symbol)
    }

    pub fn price(&self, symbol: &Symbol) -> Option<Price> {
        self.instruments.price(symbol)
    }

    /// Replace an instrument's price and notify its current subscribers
    ///
    /// Returns once deliveries are scheduled; it never waits for them.
    pub fn update_price(&self, symbol: &Symbol, price: Price) -> Result<PriceUpdate, NotifierError> {
        let Some(permit) = self.shutdown_manager.begin_update() else {
            self.metrics.updates_rejected_total.inc();
            self.log.rejected(format!("Update {symbol} rejected: shutting down"));
            return Err(NotifierError::ShuttingDown);
        };

        let mut deliveries_scheduled = 0;
        let change = self.instruments.update(symbol, price, |change| {
            deliveries_scheduled = self.dispatcher.dispatch(&change.symbol, change.new_price);
        });
        drop(permit);
        let change = change?;

        Ok(PriceUpdate {
            symbol: change.symbol,
            old_price: change.old_price,
            new_price: change.new_price,
            deliveries_scheduled,
        })
    }

    pub fn register(
        &self,
        symbol: &Symbol,
        handle: &SubscriberHandle,
    ) -> Result<Registration, NotifierError> {
        self.registry.register(symbol, handle)
    }

    /// Unsubscribe a handle; `Ok(false)` if it was not subscribed
    pub fn remove(&self, symbol: &Symbol, handle: &SubscriberHandle) -> Result<bool, NotifierError> {
        self.registry.remove(symbol, handle)
    }

    pub fn find_by_name(&self, symbol: &Symbol, name: &str) -> Option<SubscriberHandle> {
        self.registry.find_by_name(symbol, name)
    }

    pub fn subscribers(&self, symbol: &Symbol) -> Vec<SubscriberHandle> {
        self.registry.snapshot(symbol)
    }

    /// All instruments in symbol order
    pub fn list_symbols(&self) -> Vec<Symbol> {
        self.instruments.symbols()
    }

    pub fn subscribers_report(&self) -> Vec<SubscriptionReport> {
        self.registry.report()
    }

    pub fn dump_log(&self) -> Vec<LogEntry> {
        self.log.dump()
    }

    pub fn metrics(&self) -> NotifierMetrics {
        self.metrics.get_metrics()
    }

    pub fn stats(&self) -> NotifierStats {
        NotifierStats {
            instruments: self.instruments.len(),
            subscriptions: self.registry.total_subscriptions(),
            log_entries: self.log.len(),
            deliveries_in_flight: self.dispatcher.in_flight(),
            uptime: self.start_time.elapsed(),
        }
    }

    /// Block until all scheduled deliveries finished or `timeout` elapsed
    ///
    /// Must not be called from a worker thread of the delivery runtime.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        self.dispatcher.wait_idle(timeout)
    }

    /// Stop accepting price updates and drain in-flight deliveries
    ///
    /// Returns `true` if nothing was left in flight.
    pub fn shutdown(&self) -> bool {
        if !self.shutdown_manager.initiate_shutdown() {
            return self.dispatcher.in_flight() == 0;
        }

        self.log.info("Shutdown requested");

        // Updates admitted before the request may still be scheduling deliveries
        let deadline = Instant::now() + self.shutdown_manager.drain_timeout();
        while self.shutdown_manager.active_updates() > 0 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }

        let drained = self.shutdown_manager.active_updates() == 0
            && if self.shutdown_manager.should_drain() {
                self.dispatcher.wait_idle(deadline.saturating_duration_since(Instant::now()))
            } else {
                self.dispatcher.in_flight() == 0
            };

        if drained {
            self.log.info("Shutdown complete: no deliveries in flight");
        } else {
            let pending = self.dispatcher.in_flight();
            tracing::warn!("Shutting down with {} deliveries still in flight", pending);
            self.log.info(format!("Shutdown complete: {pending} deliveries abandoned"));
        }

        self.shutdown_manager.complete_shutdown();
        drained
    }

    pub fn config(&self) -> &NotifierConfig {
        &self.config
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown_manager.is_shutdown_completed()
    }
}

impl Drop for PriceNotifier {
    fn drop(&mut self) {
        // Hung deliveries must not block the dropping thread
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

/// Statistics about the current engine state
#[derive(Debug, Clone)]
pub struct NotifierStats {
    pub instruments: usize,
    pub subscriptions: usize,
    pub log_entries: usize,
    pub deliveries_in_flight: u64,
    pub uptime: Duration,
}
