//! Aggregate error types for the datapath lifecycle.

use std::{error::Error, fmt, io};

use crate::{
    config::ConfigBuildError,
    pool::{AddressLayoutError, PoolCreateError},
    socket::SocketCreateError,
};

/// Failure during [`Datapath::init`](crate::datapath::Datapath::init).
#[derive(Debug)]
pub enum InitError {
    Config(ConfigBuildError),
    UnknownInterface(String),
    AddressLayout(AddressLayoutError),
    Pool(PoolCreateError),
    Socket(SocketCreateError),
    Prefill {
        reason: &'static str,
        requested: u32,
        got: u32,
    },
}

impl fmt::Display for InitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitError::Config(e) => write!(f, "invalid configuration: {}", e),
            InitError::UnknownInterface(name) => write!(f, "unknown interface: {}", name),
            InitError::AddressLayout(e) => write!(f, "invalid address layout: {}", e),
            InitError::Pool(e) => write!(f, "failed to create pool: {}", e),
            InitError::Socket(e) => write!(f, "failed to create socket: {}", e),
            InitError::Prefill {
                reason,
                requested,
                got,
            } => write!(
                f,
                "fill queue pre-fill failed ({}): requested {}, got {}",
                reason, requested, got
            ),
        }
    }
}

impl Error for InitError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            InitError::Config(e) => Some(e),
            InitError::AddressLayout(e) => Some(e),
            InitError::Pool(e) => Some(e),
            InitError::Socket(e) => Some(e),
            InitError::UnknownInterface(_) | InitError::Prefill { .. } => None,
        }
    }
}

impl From<ConfigBuildError> for InitError {
    fn from(e: ConfigBuildError) -> Self {
        InitError::Config(e)
    }
}

impl From<AddressLayoutError> for InitError {
    fn from(e: AddressLayoutError) -> Self {
        InitError::AddressLayout(e)
    }
}

impl From<PoolCreateError> for InitError {
    fn from(e: PoolCreateError) -> Self {
        InitError::Pool(e)
    }
}

impl From<SocketCreateError> for InitError {
    fn from(e: SocketCreateError) -> Self {
        InitError::Socket(e)
    }
}

/// Failure during
/// [`Datapath::start_workers`](crate::datapath::Datapath::start_workers).
#[derive(Debug)]
pub enum StartError {
    /// Fewer CPUs are available to the calling thread than configured
    /// workers.
    InsufficientCpus { have: usize, need: u32 },
    /// The worker pool was already started.
    AlreadyStarted,
    ThreadSpawn(io::Error),
}

impl fmt::Display for StartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartError::InsufficientCpus { have, need } => write!(
                f,
                "{} worker(s) configured but only {} CPU(s) available to the calling thread",
                need, have
            ),
            StartError::AlreadyStarted => write!(f, "worker threads are already running"),
            StartError::ThreadSpawn(e) => write!(f, "failed to spawn worker thread: {}", e),
        }
    }
}

impl Error for StartError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            StartError::ThreadSpawn(e) => Some(e),
            _ => None,
        }
    }
}

/// Indicates the pool's bookkeeping has diverged from the kernel's actual
/// ring state — a partial reserve where the implementation's own
/// accounting guaranteed a full one would succeed. Unlike every other
/// error in this crate, this is not returned to the caller: by the time
/// it is observed the pool can no longer be trusted to produce a safe
/// `Result` path, so the process aborts.
#[derive(Debug)]
pub enum RingInvariantError {
    ShortReserveOnFreshRing { requested: u32, got: u32 },
    NegativeReserve,
}

impl fmt::Display for RingInvariantError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RingInvariantError::ShortReserveOnFreshRing { requested, got } => write!(
                f,
                "short reserve on a ring that should have had room: requested {}, got {}",
                requested, got
            ),
            RingInvariantError::NegativeReserve => {
                write!(f, "ring reserve returned a negative count")
            }
        }
    }
}

impl RingInvariantError {
    /// Logs the violation and aborts the process. There is no recovery
    /// path once pool accounting has diverged from the kernel's view.
    pub(crate) fn abort(self) -> ! {
        log::error!("ring invariant violated: {}", self);
        std::process::abort();
    }
}

impl Error for RingInvariantError {}
