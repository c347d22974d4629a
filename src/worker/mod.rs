//! Worker thread: pins itself to a CPU, owns its sockets and pool groups,
//! and drives the datapath loop until told to stop.

mod loop_multi;
mod loop_single;
pub(crate) mod stats;

use std::{
    io,
    os::unix::io::AsRawFd,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
};

use stats::SocketStats;

use crate::{
    config::{BatchSize, InterfaceBindMode},
    error::StartError,
    pool::{CompQueue, FillQueue, Pool},
    processor::PacketProcessor,
    socket::{RxQueue, TxQueue},
};

const POLL_TIMEOUT_MS: i32 = 1000;

/// One interface's socket within a worker. The fill/completion rings are
/// not here: the fill ring and completion ring belong to a UMEM, not to
/// an individual socket, so every socket sharing a pool shares one
/// [`PoolGroup`] and its rings.
pub(crate) struct WorkerSocket {
    pub name: String,
    pub bind_mode: InterfaceBindMode,
    pub tx: TxQueue,
    pub rx: RxQueue,
    pub outstanding_tx: u32,
    pub stats: Arc<SocketStats>,
}

/// The pool and its single shared fill/completion ring pair, plus the
/// global socket index owning each pool-local address slot
/// (`members[pool_local_idx] == global socket index`) so
/// `AddressLayout::owner_of` results can be mapped back onto
/// `Worker::sockets`.
pub(crate) struct PoolGroup {
    pub pool: Pool,
    pub fq: FillQueue,
    pub cq: CompQueue,
    pub members: Vec<usize>,
}

pub(crate) struct Worker {
    pub id: u32,
    pub sockets: Vec<WorkerSocket>,
    pub zero_copy: Option<PoolGroup>,
    pub copy: Option<PoolGroup>,
    pub processor: Arc<dyn PacketProcessor>,
    pub batch_size: BatchSize,
    pub poll: bool,
    pub busy_poll: bool,
    pub stop: Arc<AtomicBool>,
}

impl Worker {
    fn group(&self, bind_mode: InterfaceBindMode) -> &PoolGroup {
        match bind_mode {
            InterfaceBindMode::ZeroCopy => self
                .zero_copy
                .as_ref()
                .expect("zero-copy group exists when a zero-copy socket does"),
            InterfaceBindMode::Copy => self
                .copy
                .as_ref()
                .expect("copy group exists when a copy socket does"),
        }
    }

    fn group_mut(&mut self, bind_mode: InterfaceBindMode) -> &mut PoolGroup {
        match bind_mode {
            InterfaceBindMode::ZeroCopy => self
                .zero_copy
                .as_mut()
                .expect("zero-copy group exists when a zero-copy socket does"),
            InterfaceBindMode::Copy => self
                .copy
                .as_mut()
                .expect("copy group exists when a copy socket does"),
        }
    }

    /// Runs until `self.stop` is observed between iterations. Dispatches
    /// to the single- or multi-interface datapath variant depending on
    /// how many sockets this worker owns (`SPEC_FULL.md` §4.3/§4.4).
    fn run(mut self) {
        log::debug!(
            "worker {}: started with {} socket(s)",
            self.id,
            self.sockets.len()
        );

        loop {
            if self.stop.load(Ordering::Relaxed) {
                break;
            }

            if self.poll {
                match poll_any_readable(&self.sockets, POLL_TIMEOUT_MS) {
                    Ok(true) => {}
                    Ok(false) => {
                        for sock in &self.sockets {
                            sock.stats.inc_opt_polls(1);
                        }
                        continue;
                    }
                    Err(e) => {
                        log::warn!("worker {}: poll wait failed: {}", self.id, e);
                        continue;
                    }
                }
            }

            if self.sockets.len() <= 1 {
                loop_single::run_once(&mut self);
            } else {
                loop_multi::run_once(&mut self);
            }
        }

        log::debug!("worker {}: stopped", self.id);
    }
}

/// A single `poll()` call across every socket's rx fd, readable interest
/// only (`SPEC_FULL.md` §4.5).
fn poll_any_readable(sockets: &[WorkerSocket], timeout_ms: i32) -> io::Result<bool> {
    let mut fds: Vec<libc::pollfd> = sockets
        .iter()
        .map(|s| libc::pollfd {
            fd: s.rx.fd().as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        })
        .collect();

    let ret = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, timeout_ms) };

    if ret < 0 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EINTR) {
            return Ok(false);
        }
        return Err(err);
    }

    Ok(ret != 0)
}

/// Pins worker `n` to the `n`-th CPU eligible to the calling thread and
/// spawns it, per `SPEC_FULL.md` §4.7. Fails up front if fewer CPUs are
/// eligible than workers, before any thread is spawned.
pub(crate) fn spawn_workers(workers: Vec<Worker>) -> Result<Vec<JoinHandle<()>>, StartError> {
    let eligible = core_affinity::get_core_ids().unwrap_or_default();

    if eligible.len() < workers.len() {
        return Err(StartError::InsufficientCpus {
            have: eligible.len(),
            need: workers.len() as u32,
        });
    }

    let mut handles = Vec::with_capacity(workers.len());

    for (worker, core_id) in workers.into_iter().zip(eligible.into_iter()) {
        let id = worker.id;

        let handle = thread::Builder::new()
            .name(format!("xsknf-worker-{}", id))
            .spawn(move || {
                if !core_affinity::set_for_current(core_id) {
                    log::warn!("worker {}: failed to pin to core {:?}", id, core_id);
                }
                worker.run();
            })
            .map_err(StartError::ThreadSpawn)?;

        handles.push(handle);
    }

    Ok(handles)
}
