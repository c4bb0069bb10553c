// Instrument price table

use crate::config::PricePolicy;
use crate::error::NotifierError;
use crate::event_log::EventLog;
use crate::metrics::MetricsCollector;
use crate::types::{Price, Symbol};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

/// A completed price transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceChange {
    pub symbol: Symbol,
    pub old_price: Price,
    pub new_price: Price,
}

/// Symbol -> current price
///
/// Entries are independent: updates to different symbols never contend on the
/// same entry, while updates to one symbol are serialized by its entry guard.
pub struct InstrumentTable {
    prices: DashMap<Symbol, Price>,
    policy: PricePolicy,
    log: Arc<EventLog>,
    metrics: Arc<MetricsCollector>,
}

impl InstrumentTable {
    pub fn new(policy: PricePolicy, log: Arc<EventLog>, metrics: Arc<MetricsCollector>) -> Self {
        Self { prices: DashMap::new(), policy, log, metrics }
    }

    /// Insert or overwrite an instrument, returning the replaced price if any
    pub fn add(&self, symbol: Symbol, price: Price) -> Result<Option<Price>, NotifierError> {
        self.add_with(symbol, price, |_| {})
    }

    /// Like [`add`](Self::add), running `on_added` while the entry is still held
    ///
    /// Readers of this symbol block until `on_added` returns, so anything it
    /// sets up is visible by the time the instrument is. It must not call back
    /// into this table.
    pub fn add_with<F>(
        &self,
        symbol: Symbol,
        price: Price,
        on_added: F,
    ) -> Result<Option<Price>, NotifierError>
    where
        F: FnOnce(&Symbol),
    {
        if let Err(e) = self.check_price(price) {
            self.log.rejected(format!("Add {symbol} rejected: {e}"));
            return Err(e);
        }

        let (entry, previous) = match self.prices.entry(symbol.clone()) {
            Entry::Occupied(mut occupied) => {
                let old = occupied.insert(price);
                (occupied.into_ref(), Some(old))
            }
            Entry::Vacant(vacant) => (vacant.insert(price), None),
        };

        on_added(&symbol);
        match previous {
            Some(old) => self.log.info(format!("Instrument {symbol} reset: {old} -> {price}")),
            None => self.log.info(format!("Instrument {symbol} added at {price}")),
        };
        drop(entry);

        // len() reads every shard, so only after the guard is gone
        self.metrics.instruments_active.set(self.prices.len() as u64);
        Ok(previous)
    }

    pub fn contains(&self, symbol: &Symbol) -> bool {
        self.prices.contains_key(symbol)
    }

    pub fn price(&self, symbol: &Symbol) -> Option<Price> {
        self.prices.get(symbol).map(|entry| *entry)
    }

    /// Replace the price of an existing instrument
    ///
    /// `on_change` runs while the entry is still held, so for a given symbol
    /// the logged old price and the hand-off happen in update order. It must
    /// not call back into this table.
    pub fn update<F>(
        &self,
        symbol: &Symbol,
        new_price: Price,
        on_change: F,
    ) -> Result<PriceChange, NotifierError>
    where
        F: FnOnce(&PriceChange),
    {
        if let Err(e) = self.check_price(new_price) {
            self.metrics.updates_rejected_total.inc();
            self.log.rejected(format!("Update {symbol} rejected: {e}"));
            return Err(e);
        }

        let Some(mut entry) = self.prices.get_mut(symbol) else {
            self.metrics.updates_rejected_total.inc();
            self.log.rejected(format!("Update rejected: unknown symbol {symbol}"));
            return Err(NotifierError::UnknownSymbol { symbol: symbol.clone() });
        };

        let old_price = std::mem::replace(entry.value_mut(), new_price);
        let change = PriceChange { symbol: symbol.clone(), old_price, new_price };

        self.metrics.updates_total.inc();
        self.log.info(format!("Price {symbol}: {old_price} -> {new_price}"));
        on_change(&change);
        drop(entry);

        Ok(change)
    }

    /// All symbols in sorted order
    pub fn symbols(&self) -> Vec<Symbol> {
        let mut symbols: Vec<Symbol> = self.prices.iter().map(|entry| entry.key().clone()).collect();
        symbols.sort();
        symbols
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    fn check_price(&self, price: Price) -> Result<(), NotifierError> {
        if !self.policy.allow_non_positive && price <= Price::ZERO {
            return Err(NotifierError::non_positive(price));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_log::EntryKind;
    use std::sync::Mutex;
    use std::thread;

    fn sym(s: &str) -> Symbol {
        Symbol::parse(s).unwrap()
    }

    fn px(s: &str) -> Price {
        s.parse().unwrap()
    }

    fn create_test_table() -> (InstrumentTable, Arc<EventLog>) {
        let log = Arc::new(EventLog::new());
        let table =
            InstrumentTable::new(PricePolicy::default(), log.clone(), Arc::new(MetricsCollector::new()));
        (table, log)
    }

    #[test]
    fn test_add_then_get() {
        let (table, log) = create_test_table();

        assert_eq!(table.add(sym("AAPL"), px("180.50")).unwrap(), None);
        assert!(table.contains(&sym("AAPL")));
        assert_eq!(table.price(&sym("AAPL")), Some(px("180.50")));
        assert_eq!(table.price(&sym("TSLA")), None);

        // Overwrite returns the previous price
        assert_eq!(table.add(sym("AAPL"), px("181")).unwrap(), Some(px("180.50")));
        assert_eq!(table.len(), 1);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_add_with_runs_hook_only_on_success() {
        let (table, _log) = create_test_table();
        let mut hooked = Vec::new();

        table.add_with(sym("AAPL"), px("180.50"), |s| hooked.push(s.clone())).unwrap();
        table.add_with(sym("AAPL"), px("181"), |s| hooked.push(s.clone())).unwrap();
        assert!(table.add_with(sym("TSLA"), px("0"), |s| hooked.push(s.clone())).is_err());

        assert_eq!(hooked, vec![sym("AAPL"), sym("AAPL")]);
        assert!(!table.contains(&sym("TSLA")));
    }

    #[test]
    fn test_update_unknown_symbol_is_rejected() {
        let (table, log) = create_test_table();
        let mut called = false;

        let result = table.update(&sym("TSLA"), px("250"), |_| called = true);

        assert!(matches!(result, Err(NotifierError::UnknownSymbol { .. })));
        assert!(!called);
        assert!(table.is_empty());

        let entries = log.dump();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, EntryKind::Rejected);
        assert!(entries[0].message.contains("TSLA"));
    }

    #[test]
    fn test_update_reports_transition() {
        let (table, log) = create_test_table();
        table.add(sym("AAPL"), px("180.50")).unwrap();

        let mut seen = None;
        let change = table.update(&sym("AAPL"), px("165.00"), |c| seen = Some(c.clone())).unwrap();

        assert_eq!(change.old_price, px("180.50"));
        assert_eq!(change.new_price, px("165.00"));
        assert_eq!(seen, Some(change));
        assert_eq!(table.price(&sym("AAPL")), Some(px("165.00")));
        assert_eq!(log.dump().last().unwrap().message, "Price AAPL: 180.50 -> 165.00");
    }

    #[test]
    fn test_non_positive_prices_rejected_by_default() {
        let (table, _log) = create_test_table();
        assert!(matches!(table.add(sym("X"), px("0")), Err(NotifierError::InvalidPrice { .. })));
        assert!(!table.contains(&sym("X")));

        table.add(sym("X"), px("1")).unwrap();
        assert!(table.update(&sym("X"), px("-2"), |_| {}).is_err());
        assert_eq!(table.price(&sym("X")), Some(px("1")));
    }

    #[test]
    fn test_non_positive_prices_allowed_by_policy() {
        let table = InstrumentTable::new(
            PricePolicy { allow_non_positive: true },
            Arc::new(EventLog::new()),
            Arc::new(MetricsCollector::new()),
        );
        table.add(sym("SPREAD"), px("-0.25")).unwrap();
        table.update(&sym("SPREAD"), px("0"), |_| {}).unwrap();
        assert_eq!(table.price(&sym("SPREAD")), Some(px("0")));
    }

    #[test]
    fn test_symbols_sorted() {
        let (table, _log) = create_test_table();
        table.add(sym("TSLA"), px("250")).unwrap();
        table.add(sym("AAPL"), px("180")).unwrap();
        table.add(sym("MSFT"), px("410")).unwrap();
        assert_eq!(table.symbols(), vec![sym("AAPL"), sym("MSFT"), sym("TSLA")]);
    }

    #[test]
    fn test_concurrent_updates_chain_old_prices() {
        let (table, _log) = create_test_table();
        let table = Arc::new(table);
        table.add(sym("AAPL"), px("1")).unwrap();

        let changes = Arc::new(Mutex::new(Vec::new()));
        let mut handles = vec![];

        for worker in 0..4u32 {
            let table = table.clone();
            let changes = changes.clone();
            handles.push(thread::spawn(move || {
                for i in 0..100u32 {
                    let price = Price::from(2 + worker * 1000 + i);
                    table
                        .update(&sym("AAPL"), price, |c| changes.lock().unwrap().push(c.clone()))
                        .unwrap();
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        // Hand-offs happen under the entry guard, so each recorded old price is
        // exactly the previous recorded new price.
        let changes = changes.lock().unwrap();
        assert_eq!(changes.len(), 400);
        assert_eq!(changes[0].old_price, px("1"));
        for pair in changes.windows(2) {
            assert_eq!(pair[1].old_price, pair[0].new_price);
        }
        assert_eq!(table.price(&sym("AAPL")), Some(changes[399].new_price));
    }
}
