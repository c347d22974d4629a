//! Whole-framework configuration: workers, interfaces, batch size, and the
//! wait/wake-up policy. Assembling this from `argv` is the caller's job;
//! this module only validates the result.

use std::{collections::HashSet, error, fmt};

use super::{BatchSize, FrameSize, Interface};

/// Per-interface socket bind mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceBindMode {
    Copy,
    ZeroCopy,
}

/// Which parts of the framework are active: the user-space datapath loop,
/// the kernel-side filter program steering packets into it, or both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Only the datapath loop runs; sockets are expected to already be
    /// reachable (e.g. bound to queues the caller steered traffic to).
    AfXdp,
    /// Only the kernel-side filter program is loaded/attached; no worker
    /// threads are started.
    Xdp,
    /// Both: load the kernel filter and run the datapath loop.
    Combined,
}

bitflags::bitflags! {
    /// Resolved form of [`Mode`], checked independently in the places that
    /// care whether workers should be started or a kernel program loaded.
    pub struct WorkingMode: u8 {
        const DATAPATH = 0b01;
        const KERNEL_FILTER = 0b10;
    }
}

impl From<Mode> for WorkingMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::AfXdp => WorkingMode::DATAPATH,
            Mode::Xdp => WorkingMode::KERNEL_FILTER,
            Mode::Combined => WorkingMode::DATAPATH | WorkingMode::KERNEL_FILTER,
        }
    }
}

/// One interface as supplied to the builder, with an optional explicit
/// bind-mode override.
#[derive(Debug, Clone)]
struct InterfaceRequest {
    interface: Interface,
    name: String,
    bind_mode: Option<InterfaceBindMode>,
}

/// Builder for a whole-framework [`Config`].
#[derive(Debug)]
pub struct ConfigBuilder {
    workers: u32,
    interfaces: Vec<InterfaceRequest>,
    frame_size: FrameSize,
    batch_size: BatchSize,
    poll: bool,
    busy_poll: bool,
    skb_mode: bool,
    unaligned: bool,
    mode: Mode,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self {
            workers: 1,
            interfaces: Vec::new(),
            frame_size: FrameSize::new(libbpf_sys::XSK_UMEM__DEFAULT_FRAME_SIZE)
                .expect("default frame size is valid"),
            batch_size: BatchSize::new(64).expect("default batch size is valid"),
            poll: false,
            busy_poll: false,
            skb_mode: false,
            unaligned: false,
            mode: Mode::AfXdp,
        }
    }
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn workers(&mut self, workers: u32) -> &mut Self {
        self.workers = workers;
        self
    }

    /// Add an interface. `bind_mode` overrides the default resolution
    /// (zero-copy unless skb-mode forces copy); pass `None` to accept the
    /// default.
    pub fn add_interface(
        &mut self,
        name: impl Into<String>,
        interface: Interface,
        bind_mode: Option<InterfaceBindMode>,
    ) -> &mut Self {
        self.interfaces.push(InterfaceRequest {
            interface,
            name: name.into(),
            bind_mode,
        });
        self
    }

    pub fn frame_size(&mut self, size: FrameSize) -> &mut Self {
        self.frame_size = size;
        self
    }

    pub fn batch_size(&mut self, size: BatchSize) -> &mut Self {
        self.batch_size = size;
        self
    }

    pub fn poll(&mut self, poll: bool) -> &mut Self {
        self.poll = poll;
        self
    }

    pub fn busy_poll(&mut self, busy_poll: bool) -> &mut Self {
        self.busy_poll = busy_poll;
        self
    }

    /// Force skb-mode for the kernel hook. Per the bind-mode resolution
    /// rules, this forces every socket to copy mode regardless of any
    /// per-interface override.
    pub fn skb_mode(&mut self, skb_mode: bool) -> &mut Self {
        self.skb_mode = skb_mode;
        self
    }

    pub fn unaligned_chunks(&mut self, unaligned: bool) -> &mut Self {
        self.unaligned = unaligned;
        self
    }

    pub fn mode(&mut self, mode: Mode) -> &mut Self {
        self.mode = mode;
        self
    }

    pub fn build(&self) -> Result<Config, ConfigBuildError> {
        if self.workers == 0 {
            return Err(ConfigBuildError::ZeroWorkers);
        }

        if self.interfaces.is_empty() {
            return Err(ConfigBuildError::NoInterfaces);
        }

        let mut seen = HashSet::new();
        for req in &self.interfaces {
            if !seen.insert(req.name.clone()) {
                return Err(ConfigBuildError::DuplicateInterface(req.name.clone()));
            }
        }

        if !self.unaligned && !crate::util::is_pow_of_two(self.frame_size.get()) {
            return Err(ConfigBuildError::UnalignedFrameSizeRequiresUnalignedChunks);
        }

        // Bind-mode resolution rules (rule 1, rule 2):
        // skb-mode forces copy for everyone; otherwise default to
        // zero-copy unless the caller asked for copy explicitly.
        let interfaces = self
            .interfaces
            .iter()
            .map(|req| {
                let resolved = if self.skb_mode {
                    InterfaceBindMode::Copy
                } else {
                    req.bind_mode.unwrap_or(InterfaceBindMode::ZeroCopy)
                };

                (req.name.clone(), req.interface.clone(), resolved)
            })
            .collect();

        Ok(Config {
            workers: self.workers,
            interfaces,
            frame_size: self.frame_size,
            batch_size: self.batch_size,
            poll: self.poll,
            busy_poll: self.busy_poll,
            unaligned: self.unaligned,
            working_mode: self.mode.into(),
        })
    }
}

/// Validated, immutable whole-framework configuration.
#[derive(Debug, Clone)]
pub struct Config {
    workers: u32,
    interfaces: Vec<(String, Interface, InterfaceBindMode)>,
    frame_size: FrameSize,
    batch_size: BatchSize,
    poll: bool,
    busy_poll: bool,
    unaligned: bool,
    working_mode: WorkingMode,
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    pub fn workers(&self) -> u32 {
        self.workers
    }

    pub fn interfaces(&self) -> &[(String, Interface, InterfaceBindMode)] {
        &self.interfaces
    }

    pub fn frame_size(&self) -> FrameSize {
        self.frame_size
    }

    pub fn batch_size(&self) -> BatchSize {
        self.batch_size
    }

    pub fn poll(&self) -> bool {
        self.poll
    }

    pub fn busy_poll(&self) -> bool {
        self.busy_poll
    }

    pub fn unaligned(&self) -> bool {
        self.unaligned
    }

    pub fn working_mode(&self) -> WorkingMode {
        self.working_mode
    }

    /// A worker needs a zero-copy pool iff at least one of its interfaces
    /// resolved to zero-copy; a copy pool iff at least one resolved to
    /// copy (rule 3 of the bind-mode resolution rules).
    pub fn needs_zero_copy_pool(&self) -> bool {
        self.interfaces
            .iter()
            .any(|(_, _, mode)| *mode == InterfaceBindMode::ZeroCopy)
    }

    pub fn needs_copy_pool(&self) -> bool {
        self.interfaces
            .iter()
            .any(|(_, _, mode)| *mode == InterfaceBindMode::Copy)
    }
}

/// Error building a whole-framework [`Config`].
#[derive(Debug)]
pub enum ConfigBuildError {
    ZeroWorkers,
    NoInterfaces,
    DuplicateInterface(String),
    UnalignedFrameSizeRequiresUnalignedChunks,
}

impl fmt::Display for ConfigBuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigBuildError::ZeroWorkers => write!(f, "at least one worker is required"),
            ConfigBuildError::NoInterfaces => write!(f, "at least one interface is required"),
            ConfigBuildError::DuplicateInterface(name) => {
                write!(f, "interface {} was added more than once", name)
            }
            ConfigBuildError::UnalignedFrameSizeRequiresUnalignedChunks => write!(
                f,
                "frame size is not a power of two; enable unaligned chunks or pick a power-of-two frame size"
            ),
        }
    }
}

impl error::Error for ConfigBuildError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::TryInto;

    fn iface(name: &str) -> Interface {
        Interface::new(std::ffi::CString::new(name).unwrap())
    }

    #[test]
    fn zero_workers_is_rejected() {
        let mut b = ConfigBuilder::new();
        b.workers(0).add_interface("eth0", iface("eth0"), None);
        assert!(matches!(b.build(), Err(ConfigBuildError::ZeroWorkers)));
    }

    #[test]
    fn no_interfaces_is_rejected() {
        let b = ConfigBuilder::new();
        assert!(matches!(b.build(), Err(ConfigBuildError::NoInterfaces)));
    }

    #[test]
    fn duplicate_interface_name_is_rejected() {
        let mut b = ConfigBuilder::new();
        b.add_interface("eth0", iface("eth0"), None)
            .add_interface("eth0", iface("eth0"), None);
        assert!(matches!(
            b.build(),
            Err(ConfigBuildError::DuplicateInterface(_))
        ));
    }

    #[test]
    fn skb_mode_forces_copy_regardless_of_override() {
        let mut b = ConfigBuilder::new();
        b.skb_mode(true).add_interface(
            "eth0",
            iface("eth0"),
            Some(InterfaceBindMode::ZeroCopy),
        );
        let cfg = b.build().unwrap();
        assert_eq!(cfg.interfaces()[0].2, InterfaceBindMode::Copy);
    }

    #[test]
    fn unspecified_bind_mode_defaults_to_zero_copy() {
        let mut b = ConfigBuilder::new();
        b.add_interface("eth0", iface("eth0"), None);
        let cfg = b.build().unwrap();
        assert_eq!(cfg.interfaces()[0].2, InterfaceBindMode::ZeroCopy);
    }

    #[test]
    fn mixed_bind_modes_mark_both_pools_needed() {
        let mut b = ConfigBuilder::new();
        b.add_interface("eth0", iface("eth0"), Some(InterfaceBindMode::ZeroCopy))
            .add_interface("eth1", iface("eth1"), Some(InterfaceBindMode::Copy));
        let cfg = b.build().unwrap();
        assert!(cfg.needs_zero_copy_pool());
        assert!(cfg.needs_copy_pool());
    }

    #[test]
    fn batch_size_conversion_round_trips() {
        let bs: BatchSize = 32u32.try_into().unwrap();
        assert_eq!(bs.get(), 32);
    }
}
