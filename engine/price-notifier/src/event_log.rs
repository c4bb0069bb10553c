//! Append-only audit log
//!
//! Every accepted or rejected engine operation and every delivery outcome
//! lands here. Entries are never modified or dropped for the lifetime of the
//! engine. Each append is also mirrored to `tracing`.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::fmt;

/// Classification of a log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// Accepted operation or successful delivery
    Info,
    /// Operation refused (unknown symbol, invalid price, duplicate, ...)
    Rejected,
    /// Subscriber delivery failed
    Failure,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EntryKind::Info => "INFO",
            EntryKind::Rejected => "REJECTED",
            EntryKind::Failure => "FAILURE",
        };
        f.write_str(label)
    }
}

/// Immutable log entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Position in the log, starting at 1
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub kind: EntryKind,
    pub message: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{:<5} {} [{}] {}",
            self.sequence,
            self.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
            self.kind,
            self.message
        )
    }
}

/// Thread-safe append-only event log
#[derive(Debug, Default)]
pub struct EventLog {
    entries: Mutex<Vec<LogEntry>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self { entries: Mutex::new(Vec::new()) }
    }

    /// Append an entry and return its sequence number
    pub fn append(&self, kind: EntryKind, message: impl Into<String>) -> u64 {
        let message = message.into();

        match kind {
            EntryKind::Info => tracing::info!(target: "price_notifier::audit", "{}", message),
            EntryKind::Rejected => tracing::warn!(target: "price_notifier::audit", "{}", message),
            EntryKind::Failure => tracing::error!(target: "price_notifier::audit", "{}", message),
        }

        let mut entries = self.entries.lock();
        let sequence = entries.len() as u64 + 1;
        entries.push(LogEntry { sequence, timestamp: Utc::now(), kind, message });
        sequence
    }

    pub fn info(&self, message: impl Into<String>) -> u64 {
        self.append(EntryKind::Info, message)
    }

    pub fn rejected(&self, message: impl Into<String>) -> u64 {
        self.append(EntryKind::Rejected, message)
    }

    pub fn failure(&self, message: impl Into<String>) -> u64 {
        self.append(EntryKind::Failure, message)
    }

    /// Consistent copy of all entries in append order
    pub fn dump(&self) -> Vec<LogEntry> {
        self.entries.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_append_and_dump() {
        let log = EventLog::new();
        assert!(log.is_empty());

        assert_eq!(log.info("Added AAPL"), 1);
        assert_eq!(log.rejected("Unknown symbol TSLA"), 2);
        assert_eq!(log.failure("Delivery to 'ops' failed"), 3);

        let entries = log.dump();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].kind, EntryKind::Info);
        assert_eq!(entries[1].kind, EntryKind::Rejected);
        assert_eq!(entries[2].message, "Delivery to 'ops' failed");
        assert!(entries.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[test]
    fn test_dump_is_a_snapshot() {
        let log = EventLog::new();
        log.info("first");

        let snapshot = log.dump();
        log.info("second");

        assert_eq!(snapshot.len(), 1);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_entry_display() {
        let log = EventLog::new();
        log.rejected("Unknown symbol MSFT");
        let line = log.dump()[0].to_string();
        assert!(line.starts_with("#1"));
        assert!(line.contains("[REJECTED] Unknown symbol MSFT"));
    }

    #[test]
    fn test_concurrent_appends_while_dumping() {
        let log = Arc::new(EventLog::new());
        let mut handles = vec![];

        for writer in 0..8 {
            let log = log.clone();
            handles.push(thread::spawn(move || {
                for i in 0..250 {
                    log.info(format!("writer {writer} entry {i}"));
                }
            }));
        }

        let reader = {
            let log = log.clone();
            thread::spawn(move || {
                for _ in 0..50 {
                    let entries = log.dump();
                    // Sequences in any snapshot are dense and ordered
                    for (i, entry) in entries.iter().enumerate() {
                        assert_eq!(entry.sequence, i as u64 + 1);
                    }
                }
            })
        };

        for handle in handles {
            handle.join().unwrap();
        }
        reader.join().unwrap();

        assert_eq!(log.len(), 2000);
    }
}
