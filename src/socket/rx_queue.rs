use std::io;

use crate::{pool::FrameAddr, ring::XskRingCons};

use super::{fd::Fd, Socket};

/// The receiving side of an AF_XDP [`Socket`].
///
/// More details can be found in the
/// [docs](https://www.kernel.org/doc/html/latest/networking/af_xdp.html#rx-ring).
pub struct RxQueue {
    ring: XskRingCons,
    fd: Fd,
    _socket: Socket,
}

unsafe impl Send for RxQueue {}

impl RxQueue {
    pub(super) fn new(ring: XskRingCons, socket: Socket) -> Self {
        let fd = socket.fd.clone();
        Self {
            ring,
            fd,
            _socket: socket,
        }
    }

    /// Populate `out` with `(address, length)` pairs describing packets
    /// received on this socket. Returns the number of entries written,
    /// sequentially from the start of `out`.
    ///
    /// Once a received frame has been dealt with it should eventually be
    /// resubmitted to either this socket's fill queue (if dropped) or some
    /// socket's tx queue (if forwarded).
    #[inline]
    pub fn consume(&mut self, out: &mut [(FrameAddr, u32)]) -> usize {
        let nb = out.len() as u32;

        if nb == 0 {
            return 0;
        }

        let mut idx = 0;

        let cnt = unsafe { libbpf_sys::xsk_ring_cons__peek(self.ring.as_mut(), nb, &mut idx) };

        if cnt > 0 {
            for slot in out.iter_mut().take(cnt as usize) {
                let desc = unsafe { libbpf_sys::xsk_ring_cons__rx_desc(self.ring.as_ref(), idx) };

                *slot = (FrameAddr(unsafe { (*desc).addr }), unsafe { (*desc).len });

                idx += 1;
            }

            unsafe { libbpf_sys::xsk_ring_cons__release(self.ring.as_mut(), cnt) };
        }

        cnt as usize
    }

    /// Same as [`consume`](Self::consume) but polls first to check
    /// whether there is anything to read.
    #[inline]
    pub fn poll_and_consume(
        &mut self,
        out: &mut [(FrameAddr, u32)],
        poll_timeout: i32,
    ) -> io::Result<usize> {
        if self.fd.poll_read(poll_timeout)? {
            Ok(self.consume(out))
        } else {
            Ok(0)
        }
    }

    /// Whether [`XDP_USE_NEED_WAKEUP`](libbpf_sys::XDP_USE_NEED_WAKEUP) is
    /// set on the rx ring's paired fill ring would be the usual check;
    /// the rx ring itself carries no such flag, so callers check the
    /// fill queue's `needs_wakeup` before issuing a recv-side kick.
    #[inline]
    pub fn fd(&self) -> &Fd {
        &self.fd
    }

    #[inline]
    pub fn fd_mut(&mut self) -> &mut Fd {
        &mut self.fd
    }
}
