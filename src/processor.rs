//! The user-supplied per-packet decision function.

/// Typed replacement for the raw `i32` return value of the C-style
/// processor: drop, or forward to another interface within the same
/// worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The frame is returned to the receiving socket's fill ring.
    Drop,
    /// Transmit the frame on interface `iface_idx` (an index into the
    /// worker's configured interfaces, not a global interface id).
    Forward(u32),
}

/// Implemented by the host application; invoked once per received frame.
///
/// The callback runs on the worker thread with exclusive ownership of
/// `pkt` for the duration of the call and may mutate it in place. It must
/// not retain the slice past the call, and must not block indefinitely —
/// doing so stalls every socket the worker owns.
pub trait PacketProcessor: Send + Sync {
    fn process(&self, pkt: &mut [u8], rx_iface: u32) -> Verdict;
}
