use std::io;

use crate::{ring::XskRingProd, socket::Fd};

use super::{FrameAddr, Pool};

/// Transfers ownership of [`Pool`] frames from user-space to kernel-space,
/// so they can be used to receive packets. Frames submitted here
/// eventually reappear on the matching socket's RX ring.
///
/// For more information see the
/// [docs](https://www.kernel.org/doc/html/latest/networking/af_xdp.html#umem-fill-ring).
#[derive(Debug)]
pub struct FillQueue {
    ring: XskRingProd,
    _pool: Pool,
}

impl FillQueue {
    pub(crate) fn new(ring: XskRingProd, pool: Pool) -> Self {
        Self { ring, _pool: pool }
    }

    /// Let the kernel know the frames in `addrs` may be used to receive
    /// data. Returns the number of frames actually submitted.
    ///
    /// If `addrs.len()` exceeds the number of free slots on the
    /// underlying ring, no frames at all are submitted — partial
    /// reservation never happens here, matching the reserve/submit
    /// contract of the underlying ring.
    ///
    /// # Safety
    ///
    /// Every address in `addrs` must belong to this queue's pool and must
    /// not be concurrently submitted elsewhere (e.g. to a [`TxQueue`]).
    ///
    /// [`TxQueue`]: crate::socket::TxQueue
    #[inline]
    pub unsafe fn produce(&mut self, addrs: &[FrameAddr]) -> usize {
        let nb = addrs.len() as u32;

        if nb == 0 {
            return 0;
        }

        let mut idx = 0;

        let cnt = unsafe { libbpf_sys::xsk_ring_prod__reserve(self.ring.as_mut(), nb, &mut idx) };

        if cnt > 0 {
            for addr in addrs.iter().take(cnt as usize) {
                unsafe {
                    *libbpf_sys::xsk_ring_prod__fill_addr(self.ring.as_mut(), idx) =
                        addr.as_u64();
                };

                idx += 1;
            }

            unsafe { libbpf_sys::xsk_ring_prod__submit(self.ring.as_mut(), cnt) };
        }

        cnt as usize
    }

    /// Same as [`produce`](Self::produce) but wakes up the kernel
    /// afterwards if the ring reports [`needs_wakeup`](Self::needs_wakeup).
    ///
    /// # Safety
    ///
    /// See [`produce`](Self::produce).
    #[inline]
    pub unsafe fn produce_and_wakeup(
        &mut self,
        addrs: &[FrameAddr],
        socket_fd: &mut Fd,
        poll_timeout: i32,
    ) -> io::Result<usize> {
        let cnt = unsafe { self.produce(addrs) };

        if cnt > 0 && self.needs_wakeup() {
            self.wakeup(socket_fd, poll_timeout)?;
        }

        Ok(cnt)
    }

    /// Wake up the kernel to let it continue using the fill ring to
    /// process received data.
    #[inline]
    pub fn wakeup(&self, fd: &mut Fd, poll_timeout: i32) -> io::Result<()> {
        fd.poll_read(poll_timeout)?;
        Ok(())
    }

    /// Whether [`XDP_USE_NEED_WAKEUP`] is set on the fill ring. If so a
    /// call to [`wakeup`](Self::wakeup) is required before the kernel
    /// continues processing received data.
    ///
    /// [`XDP_USE_NEED_WAKEUP`]: libbpf_sys::XDP_USE_NEED_WAKEUP
    #[inline]
    pub fn needs_wakeup(&self) -> bool {
        unsafe { libbpf_sys::xsk_ring_prod__needs_wakeup(self.ring.as_ref()) != 0 }
    }
}
