use libc::{EAGAIN, EBUSY, ENETDOWN, ENOBUFS, MSG_DONTWAIT};
use std::{io, os::unix::prelude::AsRawFd, ptr};

use crate::{pool::FrameAddr, ring::XskRingProd, util};

use super::{fd::Fd, Socket};

/// The transmitting side of an AF_XDP [`Socket`].
///
/// More details can be found in the
/// [docs](https://www.kernel.org/doc/html/latest/networking/af_xdp.html#tx-ring).
pub struct TxQueue {
    ring: XskRingProd,
    fd: Fd,
    _socket: Socket,
}

unsafe impl Send for TxQueue {}

impl TxQueue {
    pub(super) fn new(ring: XskRingProd, socket: Socket) -> Self {
        let fd = socket.fd.clone();
        Self {
            ring,
            fd,
            _socket: socket,
        }
    }

    /// Submit `items` (address, length pairs) for transmission. Returns
    /// the number submitted, which is `items.len()` or `0` — a reserve
    /// that can't be satisfied in full submits nothing.
    ///
    /// # Safety
    ///
    /// The caller must not reuse an address submitted here (e.g. by also
    /// handing it to the fill queue) until it reappears on the
    /// [`CompQueue`](crate::pool::CompQueue).
    #[inline]
    pub unsafe fn produce(&mut self, items: &[(FrameAddr, u32)]) -> usize {
        let nb = items.len() as u32;

        if nb == 0 {
            return 0;
        }

        let mut idx = 0;

        let cnt = unsafe { libbpf_sys::xsk_ring_prod__reserve(self.ring.as_mut(), nb, &mut idx) };

        if cnt > 0 {
            for (addr, len) in items.iter().take(cnt as usize) {
                let desc = unsafe { libbpf_sys::xsk_ring_prod__tx_desc(self.ring.as_mut(), idx) };

                unsafe {
                    (*desc).addr = addr.as_u64();
                    (*desc).len = *len;
                    (*desc).options = 0;
                }

                idx += 1;
            }

            unsafe { libbpf_sys::xsk_ring_prod__submit(self.ring.as_mut(), cnt) };
        }

        cnt as usize
    }

    /// Same as [`produce`](Self::produce) but wakes up the kernel
    /// afterwards if [`needs_wakeup`](Self::needs_wakeup) is set.
    ///
    /// # Safety
    ///
    /// See [`produce`](Self::produce).
    #[inline]
    pub unsafe fn produce_and_wakeup(&mut self, items: &[(FrameAddr, u32)]) -> io::Result<usize> {
        let cnt = unsafe { self.produce(items) };

        if self.needs_wakeup() {
            self.wakeup()?;
        }

        Ok(cnt)
    }

    /// Kick the kernel into processing frames on this socket's tx ring, by
    /// issuing a non-blocking zero-byte `sendto`. Tolerates the transient
    /// errnos that indicate the kernel is simply not ready yet.
    #[inline]
    pub fn wakeup(&self) -> io::Result<()> {
        let ret = unsafe {
            libc::sendto(
                self.fd.as_raw_fd(),
                ptr::null(),
                0,
                MSG_DONTWAIT,
                ptr::null(),
                0,
            )
        };

        if ret < 0 {
            match util::get_errno() {
                ENOBUFS | EAGAIN | EBUSY | ENETDOWN => (),
                _ => return Err(io::Error::last_os_error()),
            }
        }

        Ok(())
    }

    /// Whether [`XDP_USE_NEED_WAKEUP`](libbpf_sys::XDP_USE_NEED_WAKEUP) is
    /// set on the tx ring. If so, [`wakeup`](Self::wakeup) must be called
    /// to continue processing produced frames.
    #[inline]
    pub fn needs_wakeup(&self) -> bool {
        unsafe { libbpf_sys::xsk_ring_prod__needs_wakeup(self.ring.as_ref()) != 0 }
    }

    /// Polls the socket, returning `true` if ready to write.
    #[inline]
    pub fn poll(&mut self, poll_timeout: i32) -> io::Result<bool> {
        self.fd.poll_write(poll_timeout)
    }

    #[inline]
    pub fn fd(&self) -> &Fd {
        &self.fd
    }

    #[inline]
    pub fn fd_mut(&mut self) -> &mut Fd {
        &mut self.fd
    }
}
