//! Per-socket datapath counters.
//!
//! Written only by the owning worker and read from the main thread
//! without further synchronization: deliberately data-race-tolerant
//! monotonic counters, not a source of correctness.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::socket::XdpStatistics;

#[derive(Debug, Default)]
pub(crate) struct SocketStats {
    rx_npkts: AtomicU64,
    tx_npkts: AtomicU64,
    tx_trigger_sendtos: AtomicU64,
    tx_wakeup_sendtos: AtomicU64,
    rx_empty_polls: AtomicU64,
    opt_polls: AtomicU64,
}

impl SocketStats {
    pub(crate) fn inc_rx_npkts(&self, n: u64) {
        self.rx_npkts.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn inc_tx_npkts(&self, n: u64) {
        self.tx_npkts.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn inc_tx_trigger_sendtos(&self, n: u64) {
        self.tx_trigger_sendtos.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn inc_tx_wakeup_sendtos(&self, n: u64) {
        self.tx_wakeup_sendtos.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn inc_rx_empty_polls(&self, n: u64) {
        self.rx_empty_polls.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn inc_opt_polls(&self, n: u64) {
        self.opt_polls.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, kernel: XdpStatistics) -> Stats {
        Stats {
            rx_npkts: self.rx_npkts.load(Ordering::Relaxed),
            tx_npkts: self.tx_npkts.load(Ordering::Relaxed),
            tx_trigger_sendtos: self.tx_trigger_sendtos.load(Ordering::Relaxed),
            tx_wakeup_sendtos: self.tx_wakeup_sendtos.load(Ordering::Relaxed),
            rx_empty_polls: self.rx_empty_polls.load(Ordering::Relaxed),
            opt_polls: self.opt_polls.load(Ordering::Relaxed),
            kernel,
        }
    }
}

/// User-side counters for one socket merged with the kernel's own
/// [`XdpStatistics`], returned by
/// [`Datapath::socket_stats`](crate::datapath::Datapath::socket_stats).
#[derive(Debug, Clone, Copy)]
pub struct Stats {
    pub rx_npkts: u64,
    pub tx_npkts: u64,
    pub tx_trigger_sendtos: u64,
    pub tx_wakeup_sendtos: u64,
    pub rx_empty_polls: u64,
    pub opt_polls: u64,
    pub kernel: XdpStatistics,
}
