// Shutdown management for PriceNotifier

use crate::config::ShutdownConfig;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

/// Tracks the engine's shutdown lifecycle
pub struct ShutdownManager {
    config: ShutdownConfig,
    shutdown_requested: AtomicBool,
    shutdown_completed: AtomicBool,
    active_updates: AtomicU64,
}

impl ShutdownManager {
    pub fn new(config: ShutdownConfig) -> Self {
        Self {
            config,
            shutdown_requested: AtomicBool::new(false),
            shutdown_completed: AtomicBool::new(false),
            active_updates: AtomicU64::new(0),
        }
    }

    /// Returns `false` if shutdown had already been requested
    pub fn initiate_shutdown(&self) -> bool {
        !self.shutdown_requested.swap(true, Ordering::SeqCst)
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::SeqCst)
    }

    /// Admit a price update unless shutdown was requested
    ///
    /// The count is raised before the flag is read, so once
    /// `initiate_shutdown` returns, every update either sees the flag or is
    /// counted in `active_updates` until its permit drops.
    pub fn begin_update(&self) -> Option<UpdatePermit<'_>> {
        self.active_updates.fetch_add(1, Ordering::SeqCst);
        if self.shutdown_requested.load(Ordering::SeqCst) {
            self.active_updates.fetch_sub(1, Ordering::SeqCst);
            return None;
        }
        Some(UpdatePermit { manager: self })
    }

    pub fn active_updates(&self) -> u64 {
        self.active_updates.load(Ordering::SeqCst)
    }

    pub fn complete_shutdown(&self) {
        self.shutdown_completed.store(true, Ordering::SeqCst);
    }

    pub fn is_shutdown_completed(&self) -> bool {
        self.shutdown_completed.load(Ordering::SeqCst)
    }

    pub fn drain_timeout(&self) -> Duration {
        self.config.drain_timeout()
    }

    pub fn should_drain(&self) -> bool {
        self.config.drain_on_shutdown
    }
}

/// Held by an admitted price update for as long as it runs
pub struct UpdatePermit<'a> {
    manager: &'a ShutdownManager,
}

impl Drop for UpdatePermit<'_> {
    fn drop(&mut self) {
        self.manager.active_updates.fetch_sub(1, Ordering::SeqCst);
    }
}
