use crate::ring::XskRingCons;

use super::{FrameAddr, Pool};

/// Transfers ownership of [`Pool`] frames from kernel-space back to
/// user-space once their contents have been transmitted via a
/// [`TxQueue`](crate::socket::TxQueue).
///
/// For more information see the
/// [docs](https://www.kernel.org/doc/html/latest/networking/af_xdp.html#umem-completion-ring).
#[derive(Debug)]
pub struct CompQueue {
    ring: XskRingCons,
    _pool: Pool,
}

impl CompQueue {
    pub(crate) fn new(ring: XskRingCons, pool: Pool) -> Self {
        Self { ring, _pool: pool }
    }

    /// Populate `addrs` with addresses of frames that have finished
    /// transmitting and may be reused. Returns the number of entries
    /// written, sequentially from the start of `addrs`.
    ///
    /// Each returned address still carries whatever bits identify its
    /// owning socket, so the caller can recycle it to the correct fill
    /// ring even if it was forwarded across interfaces before being sent.
    ///
    /// # Safety
    ///
    /// The consumed addresses must belong to this queue's pool.
    #[inline]
    pub unsafe fn consume(&mut self, addrs: &mut [FrameAddr]) -> usize {
        let nb = addrs.len() as u32;

        if nb == 0 {
            return 0;
        }

        let mut idx = 0;

        let cnt = unsafe { libbpf_sys::xsk_ring_cons__peek(self.ring.as_mut(), nb, &mut idx) };

        if cnt > 0 {
            for addr in addrs.iter_mut().take(cnt as usize) {
                let raw =
                    unsafe { *libbpf_sys::xsk_ring_cons__comp_addr(self.ring.as_ref(), idx) };

                *addr = FrameAddr(raw);

                idx += 1;
            }

            unsafe { libbpf_sys::xsk_ring_cons__release(self.ring.as_mut(), cnt) };
        }

        cnt as usize
    }
}
