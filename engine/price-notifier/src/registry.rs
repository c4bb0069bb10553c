use crate::error::NotifierError;
use crate::event_log::EventLog;
use crate::metrics::MetricsCollector;
use crate::subscriber::SubscriberHandle;
use crate::types::Symbol;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;

/// Per-symbol subscriber list, guarded independently of every other symbol
type SubscriptionList = Arc<Mutex<Vec<SubscriberHandle>>>;

/// Result of a successful register call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Added,
    /// This exact handle was already subscribed; nothing changed
    AlreadyRegistered,
}

/// Subscriber name and delivery count, for display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriberSummary {
    pub name: String,
    pub deliveries: u64,
}

/// Subscribers of one symbol in registration order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionReport {
    pub symbol: Symbol,
    pub subscribers: Vec<SubscriberSummary>,
}

/// Registry for tracking subscribers per symbol
///
/// A list exists only for symbols that were tracked when their instrument was
/// added. The map shard is released before a list lock is taken, and no list
/// lock is held while subscribers run.
pub struct SubscriptionRegistry {
    lists: DashMap<Symbol, SubscriptionList>,
    log: Arc<EventLog>,
    metrics: Arc<MetricsCollector>,
}

impl SubscriptionRegistry {
    pub fn new(log: Arc<EventLog>, metrics: Arc<MetricsCollector>) -> Self {
        Self { lists: DashMap::new(), log, metrics }
    }

    /// Make a symbol subscribable; existing subscribers are kept
    pub fn track(&self, symbol: &Symbol) {
        self.lists.entry(symbol.clone()).or_default();
    }

    pub fn is_tracked(&self, symbol: &Symbol) -> bool {
        self.lists.contains_key(symbol)
    }

    pub fn register(
        &self,
        symbol: &Symbol,
        handle: &SubscriberHandle,
    ) -> Result<Registration, NotifierError> {
        let Some(list) = self.list(symbol) else {
            self.log.rejected(format!(
                "Subscribe '{}' rejected: unknown symbol {symbol}",
                handle.name()
            ));
            return Err(NotifierError::UnknownSymbol { symbol: symbol.clone() });
        };

        let mut subscribers = list.lock();
        if subscribers.iter().any(|existing| existing.same_as(handle)) {
            drop(subscribers);
            self.log.info(format!("'{}' already subscribed to {symbol}; no change", handle.name()));
            return Ok(Registration::AlreadyRegistered);
        }

        subscribers.push(handle.clone());
        let count = subscribers.len();
        drop(subscribers);

        self.metrics.registrations_total.inc();
        self.log.info(format!(
            "'{}' subscribed to {symbol} ({count} subscriber(s))",
            handle.name()
        ));
        Ok(Registration::Added)
    }

    /// Remove a handle by identity; `Ok(false)` if it was not subscribed
    pub fn remove(&self, symbol: &Symbol, handle: &SubscriberHandle) -> Result<bool, NotifierError> {
        let Some(list) = self.list(symbol) else {
            self.log.rejected(format!(
                "Unsubscribe '{}' rejected: unknown symbol {symbol}",
                handle.name()
            ));
            return Err(NotifierError::UnknownSymbol { symbol: symbol.clone() });
        };

        let mut subscribers = list.lock();
        let position = subscribers.iter().position(|existing| existing.same_as(handle));
        if let Some(index) = position {
            subscribers.remove(index);
        }
        drop(subscribers);

        match position {
            Some(_) => {
                self.metrics.removals_total.inc();
                self.log.info(format!("'{}' unsubscribed from {symbol}", handle.name()));
                Ok(true)
            }
            None => {
                self.log.info(format!(
                    "Unsubscribe '{}' from {symbol}: not found; no change",
                    handle.name()
                ));
                Ok(false)
            }
        }
    }

    /// Point-in-time copy of a symbol's subscribers in registration order
    ///
    /// Unknown symbols yield an empty list.
    pub fn snapshot(&self, symbol: &Symbol) -> Vec<SubscriberHandle> {
        self.list(symbol).map(|list| list.lock().clone()).unwrap_or_default()
    }

    /// First subscriber of `symbol` with the given name
    pub fn find_by_name(&self, symbol: &Symbol, name: &str) -> Option<SubscriberHandle> {
        let list = self.list(symbol)?;
        let subscribers = list.lock();
        subscribers.iter().find(|handle| handle.name() == name).cloned()
    }

    pub fn subscriber_count(&self, symbol: &Symbol) -> usize {
        self.list(symbol).map(|list| list.lock().len()).unwrap_or(0)
    }

    /// Total subscriptions across all symbols
    pub fn total_subscriptions(&self) -> usize {
        self.all_lists().iter().map(|(_, list)| list.lock().len()).sum()
    }

    /// Every tracked symbol with its subscribers, sorted by symbol
    pub fn report(&self) -> Vec<SubscriptionReport> {
        let mut lists = self.all_lists();
        lists.sort_by(|(a, _), (b, _)| a.cmp(b));

        lists
            .into_iter()
            .map(|(symbol, list)| {
                let subscribers = list
                    .lock()
                    .iter()
                    .map(|handle| SubscriberSummary {
                        name: handle.name().to_string(),
                        deliveries: handle.delivery_count(),
                    })
                    .collect();
                SubscriptionReport { symbol, subscribers }
            })
            .collect()
    }

    fn list(&self, symbol: &Symbol) -> Option<SubscriptionList> {
        self.lists.get(symbol).map(|entry| entry.value().clone())
    }

    // Collected first so no shard lock is held while list locks are taken
    fn all_lists(&self) -> Vec<(Symbol, SubscriptionList)> {
        self.lists.iter().map(|entry| (entry.key().clone(), entry.value().clone())).collect()
    }
}
