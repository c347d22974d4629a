//! Whole-framework configuration validation exercised from outside the
//! crate, the way a caller assembling a `Config` from `argv` would hit it.

use std::ffi::CString;
use xsknf_rs::prelude::*;

fn iface(name: &str) -> Interface {
    Interface::new(CString::new(name).unwrap())
}

#[test]
fn mode_combined_enables_both_working_mode_flags() {
    let combined: WorkingMode = Mode::Combined.into();
    assert!(combined.contains(WorkingMode::DATAPATH));
    assert!(combined.contains(WorkingMode::KERNEL_FILTER));

    let xdp_only: WorkingMode = Mode::Xdp.into();
    assert!(!xdp_only.contains(WorkingMode::DATAPATH));
    assert!(xdp_only.contains(WorkingMode::KERNEL_FILTER));
}

#[test]
fn single_bind_mode_config_does_not_claim_to_need_the_other_pool() {
    let config = Config::builder()
        .add_interface("eth0", iface("eth0"), Some(InterfaceBindMode::ZeroCopy))
        .add_interface("eth1", iface("eth1"), Some(InterfaceBindMode::ZeroCopy))
        .build()
        .unwrap();

    assert!(config.needs_zero_copy_pool());
    assert!(!config.needs_copy_pool());
}

#[test]
fn batch_size_above_255_is_rejected_at_the_public_boundary() {
    assert!(BatchSize::new(256).is_err());
    assert!(BatchSize::new(255).is_ok());
}

#[test]
fn unaligned_frame_size_is_rejected_unless_unaligned_chunks_enabled() {
    let frame_size = FrameSize::new(3000).unwrap();

    let rejected = Config::builder()
        .add_interface("eth0", iface("eth0"), None)
        .frame_size(frame_size)
        .build();
    assert!(rejected.is_err());

    let frame_size = FrameSize::new(3000).unwrap();
    let accepted = Config::builder()
        .add_interface("eth0", iface("eth0"), None)
        .frame_size(frame_size)
        .unaligned_chunks(true)
        .build();
    assert!(accepted.is_ok());
}
