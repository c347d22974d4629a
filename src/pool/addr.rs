//! Frame address encoding.
//!
//! Every frame address handed to or received from the kernel packs the
//! owning socket's index into its high bits, so that after a frame is
//! forwarded across interfaces the worker can recover which socket's fill
//! ring it must eventually be returned to without a lookup table.

use std::error;
use std::fmt;

/// Fixed number of frames reserved to each socket within a worker's pool.
///
/// Matches the constant the framework this crate's datapath loop is
/// modelled on (`xsknf`) uses; kept fixed rather than configurable since the
/// address-encoding shift is derived from it at compile time.
pub const FRAMES_PER_SOCKET: u32 = 4096;

const FRAME_ID_BITS: u32 = 12; // log2(FRAMES_PER_SOCKET)

const _: () = assert_pow2_matches_bits();
const fn assert_pow2_matches_bits() {
    if 1u32 << FRAME_ID_BITS != FRAMES_PER_SOCKET {
        panic!("FRAME_ID_BITS must equal log2(FRAMES_PER_SOCKET)");
    }
}

/// A frame's address within a [`Pool`](super::Pool).
///
/// In aligned mode this is a packed integer: owner bits, frame-id bits, and
/// an in-frame byte offset. In unaligned-chunk mode the offset is not a
/// bitfield (frame sizes need not be powers of two) and addresses are
/// treated as plain byte offsets into the pool; ownership is then recovered
/// by dividing the frame's linear index by [`FRAMES_PER_SOCKET`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameAddr(pub u64);

impl FrameAddr {
    #[inline]
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// Describes how [`FrameAddr`]s are packed for a given frame size and
/// interface count, and provides the encode/decode operations on them.
#[derive(Debug, Clone, Copy)]
pub struct AddressLayout {
    frame_size: u32,
    n_interfaces: u32,
    aligned: bool,
    /// Bit position at which the owning socket's index begins. Only
    /// meaningful when `aligned` is `true`.
    owner_shift: u32,
}

impl AddressLayout {
    /// Build a layout for `frame_size` bytes per frame and `n_interfaces`
    /// sockets per worker.
    ///
    /// `frame_size` must be a power of two for aligned mode; pass `aligned
    /// = false` to support arbitrary frame sizes (e.g. huge-page backed
    /// unaligned chunks), in which case ownership is derived by integer
    /// division instead of a bit shift.
    pub fn new(
        frame_size: u32,
        n_interfaces: u32,
        aligned: bool,
    ) -> Result<Self, AddressLayoutError> {
        if n_interfaces == 0 {
            return Err(AddressLayoutError::ZeroInterfaces);
        }

        if aligned && !crate::util::is_pow_of_two(frame_size) {
            return Err(AddressLayoutError::FrameSizeNotPowerOfTwo(frame_size));
        }

        let owner_shift = if aligned {
            FRAME_ID_BITS + frame_size.trailing_zeros()
        } else {
            0
        };

        Ok(Self {
            frame_size,
            n_interfaces,
            aligned,
            owner_shift,
        })
    }

    #[inline]
    pub fn frame_size(&self) -> u32 {
        self.frame_size
    }

    #[inline]
    pub fn aligned(&self) -> bool {
        self.aligned
    }

    /// Total frames spanned by one socket's slab.
    #[inline]
    pub fn frames_per_socket(&self) -> u32 {
        FRAMES_PER_SOCKET
    }

    /// Total frame count across every socket of the worker this layout
    /// belongs to.
    #[inline]
    pub fn total_frames(&self) -> u64 {
        FRAMES_PER_SOCKET as u64 * self.n_interfaces as u64
    }

    /// Total pool size in bytes.
    #[inline]
    pub fn pool_len(&self) -> u64 {
        self.total_frames() * self.frame_size as u64
    }

    /// Build the address of frame `frame_id` (zero offset) owned by socket
    /// `socket_idx`.
    #[inline]
    pub fn encode(&self, socket_idx: u32, frame_id: u32) -> FrameAddr {
        debug_assert!(socket_idx < self.n_interfaces);
        debug_assert!(frame_id < FRAMES_PER_SOCKET);

        if self.aligned {
            let v = ((socket_idx as u64) << self.owner_shift)
                | ((frame_id as u64) << self.frame_size.trailing_zeros());
            FrameAddr(v)
        } else {
            let global_frame_id = socket_idx as u64 * FRAMES_PER_SOCKET as u64 + frame_id as u64;
            FrameAddr(global_frame_id * self.frame_size as u64)
        }
    }

    /// Recover the owning socket's index from a (possibly offset) address.
    #[inline]
    pub fn owner_of(&self, addr: FrameAddr) -> u32 {
        if self.aligned {
            (addr.0 >> self.owner_shift) as u32
        } else {
            let global_frame_id = addr.0 / self.frame_size as u64;
            (global_frame_id / FRAMES_PER_SOCKET as u64) as u32
        }
    }

    /// Strip any in-frame offset, returning the address of the frame's
    /// start.
    #[inline]
    pub fn strip_offset(&self, addr: FrameAddr) -> FrameAddr {
        if self.aligned {
            let offset_bits = self.frame_size.trailing_zeros();
            FrameAddr((addr.0 >> offset_bits) << offset_bits)
        } else {
            let frame_idx = addr.0 / self.frame_size as u64;
            FrameAddr(frame_idx * self.frame_size as u64)
        }
    }
}

/// Error building an [`AddressLayout`].
#[derive(Debug)]
pub enum AddressLayoutError {
    FrameSizeNotPowerOfTwo(u32),
    ZeroInterfaces,
}

impl fmt::Display for AddressLayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressLayoutError::FrameSizeNotPowerOfTwo(size) => write!(
                f,
                "frame size {} must be a power of two in aligned mode",
                size
            ),
            AddressLayoutError::ZeroInterfaces => {
                write!(f, "address layout requires at least one interface")
            }
        }
    }
}

impl error::Error for AddressLayoutError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_of_matches_encode_for_every_socket_aligned() {
        let layout = AddressLayout::new(2048, 4, true).unwrap();

        for socket_idx in 0..4 {
            for frame_id in [0, 1, FRAMES_PER_SOCKET - 1] {
                let addr = layout.encode(socket_idx, frame_id);
                assert_eq!(layout.owner_of(addr), socket_idx);
            }
        }
    }

    #[test]
    fn owner_of_ignores_in_frame_offset_aligned() {
        let layout = AddressLayout::new(2048, 3, true).unwrap();
        let base = layout.encode(2, 10);

        let with_offset = FrameAddr(base.0 + 37);
        assert_eq!(layout.owner_of(with_offset), 2);
        assert_eq!(layout.strip_offset(with_offset), base);
    }

    #[test]
    fn rejects_non_power_of_two_frame_size_when_aligned() {
        assert!(AddressLayout::new(2049, 1, true).is_err());
        assert!(AddressLayout::new(2048, 1, true).is_ok());
    }

    #[test]
    fn unaligned_mode_allows_arbitrary_frame_size_and_still_tracks_owner() {
        let layout = AddressLayout::new(2333, 5, false).unwrap();

        for socket_idx in 0..5 {
            let addr = layout.encode(socket_idx, 100);
            assert_eq!(layout.owner_of(addr), socket_idx);
            assert_eq!(layout.strip_offset(addr), addr);
        }
    }

    #[test]
    fn owner_shift_equals_frame_id_bits_plus_log2_frame_size() {
        let layout = AddressLayout::new(4096, 2, true).unwrap();
        assert_eq!(layout.owner_shift, FRAME_ID_BITS + 12);
    }
}
