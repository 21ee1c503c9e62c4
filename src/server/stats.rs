//! Connection accounting
//!
//! Shared by every connection task, so all counters are atomics.

use super::dispatcher::SniffResult;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Connection counters for the listener
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Connections accepted since start
    total: AtomicU64,
    /// Connections whose task is still running
    active: AtomicUsize,
    /// Connections handed to the SOCKS5 relay
    socks5: AtomicU64,
    /// Connections handed to the file service
    files: AtomicU64,
}

impl ConnectionStats {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a newly accepted connection
    ///
    /// The returned guard keeps it counted as active until dropped.
    pub fn open(self: &Arc<Self>) -> ActiveConnection {
        self.total.fetch_add(1, Ordering::Relaxed);
        self.active.fetch_add(1, Ordering::AcqRel);
        ActiveConnection {
            stats: Arc::clone(self),
        }
    }

    /// Count a connection classified as `protocol`
    pub fn record_dispatch(&self, protocol: SniffResult) {
        let counter = match protocol {
            SniffResult::Socks5 => &self.socks5,
            SniffResult::FileProtocol => &self.files,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Connections currently open
    pub fn active(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Connections accepted since start
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    /// Connections classified as `protocol` since start
    pub fn dispatched(&self, protocol: SniffResult) -> u64 {
        match protocol {
            SniffResult::Socks5 => self.socks5.load(Ordering::Relaxed),
            SniffResult::FileProtocol => self.files.load(Ordering::Relaxed),
        }
    }
}

/// RAII guard for one active connection
#[derive(Debug)]
pub struct ActiveConnection {
    stats: Arc<ConnectionStats>,
}

impl ActiveConnection {
    /// Active connections including this one
    pub fn active(&self) -> usize {
        self.stats.active()
    }
}

impl Drop for ActiveConnection {
    fn drop(&mut self) {
        self.stats.active.fetch_sub(1, Ordering::AcqRel);
    }
}
