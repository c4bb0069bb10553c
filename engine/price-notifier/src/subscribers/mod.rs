//! Built-in subscriber strategies
//!
//! - [`PassThroughObserver`] records every notification it receives
//! - [`SimulatedNotifier`] pretends to push a message over an external channel
//! - [`ThresholdRule`] turns prices into buy/sell/hold signals per symbol

mod notifier;
mod observer;
mod rule;

pub use notifier::SimulatedNotifier;
pub use observer::{PassThroughObserver, Receipt};
pub use rule::{Signal, SignalRecord, ThresholdRule, Thresholds};
