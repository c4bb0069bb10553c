// Configuration structures for PriceNotifier

use crate::error::NotifierError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration for PriceNotifier
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    /// Configuration for the delivery worker pool
    pub dispatch: DispatchConfig,

    /// Price acceptance policy
    pub pricing: PricePolicy,

    /// Configuration for shutdown behavior
    pub shutdown: ShutdownConfig,
}

impl NotifierConfig {
    /// Reject configurations the engine cannot run with
    pub fn validate(&self) -> Result<(), NotifierError> {
        if self.dispatch.worker_threads == 0 {
            return Err(NotifierError::Config("dispatch.worker_threads must be at least 1".into()));
        }

        if self.dispatch.delivery_timeout_ms == Some(0) {
            return Err(NotifierError::Config(
                "dispatch.delivery_timeout_ms must be positive (omit it to disable)".into(),
            ));
        }

        if self.dispatch.thread_name.is_empty() {
            return Err(NotifierError::Config("dispatch.thread_name must not be empty".into()));
        }

        Ok(())
    }
}

/// Configuration for subscriber delivery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Worker threads for an engine-owned runtime
    pub worker_threads: usize,

    /// Name prefix for worker threads
    pub thread_name: String,

    /// Per-delivery deadline; `None` lets a delivery run unbounded
    pub delivery_timeout_ms: Option<u64>,
}

impl DispatchConfig {
    pub fn delivery_timeout(&self) -> Option<Duration> {
        self.delivery_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            worker_threads: 4,
            thread_name: "price-notifier-worker".to_string(),
            delivery_timeout_ms: Some(5000),
        }
    }
}

/// Which prices the engine accepts on add and update
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricePolicy {
    /// Accept zero and negative prices
    pub allow_non_positive: bool,
}

/// Configuration for shutdown behavior
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Maximum time to wait for in-flight deliveries
    pub drain_timeout_ms: u64,

    /// Whether to wait for in-flight deliveries at all
    pub drain_on_shutdown: bool,
}

impl ShutdownConfig {
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self { drain_timeout_ms: 2000, drain_on_shutdown: true }
    }
}
