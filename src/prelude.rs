//! Re-exports the key types.

pub use super::{
    config::{
        BatchSize, BatchSizeError, BindFlags, Config, ConfigBuildError, ConfigBuilder, FrameSize,
        Interface, InterfaceBindMode, LibbpfFlags, Mode, QueueSize, SocketConfig,
        SocketConfigBuilder, UmemConfig, UmemConfigBuilder, WorkingMode, XdpFlags,
    },
    pool::{AddressLayout, CompQueue, FillQueue, FrameAddr, Pool, FRAMES_PER_SOCKET},
    socket::{RxQueue, Socket, TxQueue, XdpStatistics},
};
