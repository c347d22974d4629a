//! Pure in-memory exercises of the address-encoding and bucketing rules
//! the datapath loop (`src/worker/loop_multi.rs`, `loop_single.rs`) builds
//! on, reproducing the scenarios a live NIC would otherwise be needed for.
//! Socket/ring creation itself is out of scope here: it requires an AF_XDP-
//! capable kernel and, for anything beyond loopback, a real interface.

use xsknf_rs::prelude::*;

/// A minimal completion/fill simulation: every "TX completion" for a frame
/// is bucketed by `owner_of` exactly the way `drain_completions` does, and
/// folded back into a per-socket fill-ring model.
struct FillRingModel {
    by_socket: Vec<Vec<FrameAddr>>,
}

impl FillRingModel {
    fn new(n_sockets: usize) -> Self {
        Self {
            by_socket: vec![Vec::new(); n_sockets],
        }
    }

    fn bucket_completions(&mut self, layout: &AddressLayout, completions: &[FrameAddr]) {
        for addr in completions {
            let owner = layout.owner_of(*addr) as usize;
            self.by_socket[owner].push(*addr);
        }
    }
}

/// Scenario A (single-interface drop-all): every received frame goes
/// straight back to its own socket's fill ring, never touching TX.
#[test]
fn scenario_a_single_interface_drop_all_conserves_every_frame() {
    let layout = AddressLayout::new(2048, 1, true).unwrap();

    let mut fill = FillRingModel::new(1);
    for frame_id in 0..FRAMES_PER_SOCKET {
        fill.by_socket[0].push(layout.encode(0, frame_id));
    }

    // 10 000 receives: each one is immediately recycled (Drop), so the
    // fill ring for socket 0 never drops below FRAMES_PER_SOCKET frames
    // and every address recycled is still owned by socket 0.
    for _ in 0..10_000 {
        let addr = fill.by_socket[0].pop().unwrap();
        assert_eq!(layout.owner_of(addr), 0);
        fill.by_socket[0].push(addr);
    }

    assert_eq!(fill.by_socket[0].len(), FRAMES_PER_SOCKET as usize);
    assert!(fill.by_socket[0].iter().all(|a| layout.owner_of(*a) == 0));
}

/// Scenario C (two-interface bridge, shared pool): a completion observed
/// on either socket's pool must be bucketed back to the *receiving*
/// socket's fill ring, never the other one's, and addresses never cross
/// between the two sockets' slabs.
#[test]
fn scenario_c_bridge_completions_bucket_to_the_right_socket() {
    let layout = AddressLayout::new(2048, 2, true).unwrap();
    let mut fill = FillRingModel::new(2);

    let from_0: Vec<FrameAddr> = (0..5_000).map(|i| layout.encode(0, i % FRAMES_PER_SOCKET)).collect();
    let from_1: Vec<FrameAddr> = (0..5_000).map(|i| layout.encode(1, i % FRAMES_PER_SOCKET)).collect();

    fill.bucket_completions(&layout, &from_0);
    fill.bucket_completions(&layout, &from_1);

    assert_eq!(fill.by_socket[0].len(), 5_000);
    assert_eq!(fill.by_socket[1].len(), 5_000);
    assert!(fill.by_socket[0].iter().all(|a| layout.owner_of(*a) == 0));
    assert!(fill.by_socket[1].iter().all(|a| layout.owner_of(*a) == 1));
}

/// Scenario D (cross-pool copy): zero-copy and copy interfaces use
/// separate pools (separate `AddressLayout`s with independent `n_interfaces
/// = 1`), so a frame address valid in one is never mistaken for one in the
/// other even though both encode socket index 0.
#[test]
fn scenario_d_cross_pool_addresses_never_collide_across_pools() {
    let zc_layout = AddressLayout::new(2048, 1, true).unwrap();
    let copy_layout = AddressLayout::new(2048, 1, true).unwrap();

    let zc_addr = zc_layout.encode(0, 42);
    let copy_addr = copy_layout.encode(0, 42);

    // Same bit pattern is expected (both are socket 0, frame 42, in their
    // own pool) but the two pools are backed by distinct mmap regions in
    // `Pool`, so identical addresses are never ambiguous at runtime — the
    // pool a `FrameAddr` is valid in is tracked by which `PoolGroup` it came
    // from, not by the bits of the address itself.
    assert_eq!(zc_addr.as_u64(), copy_addr.as_u64());
    assert_eq!(zc_layout.owner_of(zc_addr), 0);
    assert_eq!(copy_layout.owner_of(copy_addr), 0);
}

/// Testable property 4 (batch ordering): within one received batch, the
/// subsequence of frames assigned to a given target must preserve receive
/// order.
#[test]
fn batch_ordering_is_preserved_per_target() {
    let layout = AddressLayout::new(2048, 3, true).unwrap();

    let batch: Vec<(FrameAddr, u32)> = (0..10)
        .map(|i| (layout.encode(0, i), if i % 2 == 0 { 1 } else { 2 }))
        .collect();

    let mut to_tx = vec![Vec::new(); 3];
    for (addr, target) in &batch {
        to_tx[*target as usize].push(*addr);
    }

    let expected_target_1: Vec<FrameAddr> = (0..10)
        .step_by(2)
        .map(|i| layout.encode(0, i))
        .collect();
    let expected_target_2: Vec<FrameAddr> = (1..10)
        .step_by(2)
        .map(|i| layout.encode(0, i))
        .collect();

    assert_eq!(to_tx[1], expected_target_1);
    assert_eq!(to_tx[2], expected_target_2);
}

/// Testable property 1 (frame conservation) stated as a layout-level
/// invariant: a fully populated fill ring for one socket always holds
/// exactly `FRAMES_PER_SOCKET` frames, all owned by that socket, in both
/// aligned and unaligned-chunk addressing modes.
#[test]
fn frame_conservation_holds_in_both_addressing_modes() {
    let _ = env_logger::try_init();

    for aligned in [true, false] {
        let frame_size = if aligned { 2048 } else { 2333 };
        let layout = AddressLayout::new(frame_size, 4, aligned).unwrap();

        for socket_idx in 0..4 {
            let slab: Vec<FrameAddr> = (0..FRAMES_PER_SOCKET)
                .map(|frame_id| layout.encode(socket_idx, frame_id))
                .collect();

            assert_eq!(slab.len(), FRAMES_PER_SOCKET as usize);
            assert!(slab.iter().all(|a| layout.owner_of(*a) == socket_idx));
        }
    }
}
