//! Frame pool (UMEM): the memory region shared with the kernel and the
//! address-encoding scheme layered over it.

mod addr;
pub use addr::{AddressLayout, AddressLayoutError, FrameAddr, FRAMES_PER_SOCKET};

mod mmap;
use mmap::Mmap;

mod fill_queue;
pub use fill_queue::FillQueue;

mod comp_queue;
pub use comp_queue::CompQueue;

use libbpf_sys::xsk_umem;
use std::{
    borrow::Borrow,
    error::Error,
    fmt, io,
    ptr::{self, NonNull},
    sync::{Arc, Mutex},
};

use crate::{
    config::UmemConfig,
    ring::{XskRingCons, XskRingProd},
};

/// Wrapper around a pointer to some UMEM. Guarantees the pointer is both
/// non-null and unique.
#[derive(Debug)]
struct XskUmem(NonNull<xsk_umem>);

impl XskUmem {
    /// # Safety
    ///
    /// Only one instance of this struct may exist since it deletes the UMEM
    /// as part of its [`Drop`] impl.
    unsafe fn new(ptr: NonNull<xsk_umem>) -> Self {
        Self(ptr)
    }

    fn as_mut_ptr(&self) -> *mut xsk_umem {
        self.0.as_ptr()
    }
}

impl Drop for XskUmem {
    fn drop(&mut self) {
        // SAFETY: unsafe constructor contract guarantees that the UMEM has
        // not been deleted already.
        let err = unsafe { libbpf_sys::xsk_umem__delete(self.0.as_ptr()) };

        if err != 0 {
            log::error!("failed to delete umem with error code {}", err);
        }
    }
}

unsafe impl Send for XskUmem {}

#[derive(Debug)]
struct PoolInner {
    umem_ptr: XskUmem,
    saved_fq_and_cq: Option<(XskRingProd, XskRingCons)>,
}

/// A region of memory shared with the kernel, divided into fixed-size
/// frames and partitioned into per-socket slabs of [`FRAMES_PER_SOCKET`]
/// frames each.
///
/// Cloning a `Pool` is cheap and yields a handle to the same underlying
/// memory and UMEM registration; every socket bound in the same mode
/// within a worker shares one `Pool`.
#[derive(Debug, Clone)]
pub struct Pool {
    inner: Arc<Mutex<PoolInner>>,
    mmap: Arc<Mmap>,
    layout: AddressLayout,
}

impl Pool {
    /// Allocate and register a new pool sized for `layout`.
    pub fn new(layout: AddressLayout, use_huge_pages: bool) -> Result<Self, PoolCreateError> {
        let len = layout.pool_len();

        let mmap = Mmap::new(len as usize, use_huge_pages).map_err(|e| PoolCreateError {
            reason: "failed to create mmap'd pool region",
            err: e,
        })?;

        let umem_config: UmemConfig = UmemConfig::builder()
            .frame_size(
                crate::config::FrameSize::new(layout.frame_size())
                    .expect("frame size already validated by AddressLayout"),
            )
            .build()
            .map_err(|e| PoolCreateError {
                reason: "invalid umem config derived from address layout",
                err: io::Error::new(io::ErrorKind::InvalidInput, e.to_string()),
            })?;

        let mut umem_ptr = ptr::null_mut();
        let mut fq = XskRingProd::default();
        let mut cq = XskRingCons::default();

        let err = unsafe {
            libbpf_sys::xsk_umem__create(
                &mut umem_ptr,
                mmap.addr().as_ptr(),
                mmap.len() as u64,
                fq.as_mut(),
                cq.as_mut(),
                &umem_config.into(),
            )
        };

        let umem_ptr = match NonNull::new(umem_ptr) {
            Some(ptr) => unsafe { XskUmem::new(ptr) },
            None => {
                return Err(PoolCreateError {
                    reason: "returned UMEM pointer is null",
                    err: io::Error::from_raw_os_error(err),
                });
            }
        };

        if err != 0 {
            return Err(PoolCreateError {
                reason: "non-zero error code returned when creating UMEM",
                err: io::Error::from_raw_os_error(err),
            });
        }

        if fq.is_ring_null() || cq.is_ring_null() {
            return Err(PoolCreateError {
                reason: "returned fill or completion queue ring is null",
                err: io::Error::from_raw_os_error(err),
            });
        }

        let inner = PoolInner {
            umem_ptr,
            saved_fq_and_cq: Some((fq, cq)),
        };

        Ok(Self {
            inner: Arc::new(Mutex::new(inner)),
            mmap: Arc::new(mmap),
            layout,
        })
    }

    #[inline]
    pub fn layout(&self) -> AddressLayout {
        self.layout
    }

    /// Raw mutable byte slice for the frame at `addr`, truncated to `len`.
    ///
    /// # Safety
    ///
    /// `addr` must be the start of a frame belonging to this pool and must
    /// not be concurrently accessed by the kernel or another thread.
    #[inline]
    pub unsafe fn frame_mut(&self, addr: FrameAddr, len: usize) -> &mut [u8] {
        let base = self.mmap.addr().as_ptr() as *mut u8;
        let ptr = base.add(addr.as_u64() as usize);
        std::slice::from_raw_parts_mut(ptr, len)
    }

    /// # Safety
    ///
    /// See [`frame_mut`](Self::frame_mut).
    #[inline]
    pub unsafe fn frame(&self, addr: FrameAddr, len: usize) -> &[u8] {
        let base = self.mmap.addr().as_ptr() as *const u8;
        let ptr = base.add(addr.as_u64() as usize);
        std::slice::from_raw_parts(ptr, len)
    }

    /// Copy `len` bytes from the frame at `addr` in this pool into the
    /// frame at the same address in `dst`. Used when forwarding a frame
    /// across sockets whose bind modes (and therefore pools) differ
    /// within the same worker.
    ///
    /// # Safety
    ///
    /// `addr` must be a valid, non-aliased frame address in both pools.
    pub unsafe fn copy_into(&self, dst: &Pool, addr: FrameAddr, len: usize) {
        let src_slice = self.frame(addr, len);
        let dst_slice = dst.frame_mut(addr, len);
        dst_slice.copy_from_slice(src_slice);
    }

    /// Used on socket creation: hands the create function the UMEM
    /// pointer and any saved fill/completion queue pair, a byproduct of
    /// how `xsk_umem__create` pre-allocates both up front.
    #[inline]
    pub(crate) fn with_ptr_and_saved_queues<F, T>(&self, mut f: F) -> T
    where
        F: FnMut(*mut xsk_umem, &mut Option<(XskRingProd, XskRingCons)>) -> T,
    {
        let mut inner = self.inner.lock().unwrap();
        f(inner.umem_ptr.as_mut_ptr(), &mut inner.saved_fq_and_cq)
    }
}

/// Error detailing why [`Pool`] creation failed.
#[derive(Debug)]
pub struct PoolCreateError {
    reason: &'static str,
    err: io::Error,
}

impl fmt::Display for PoolCreateError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.reason)
    }
}

impl Error for PoolCreateError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.err.borrow())
    }
}
