//! Top-level orchestrator: lifecycle, worker management, and merged
//! statistics. An owned handle rather than a process-wide singleton, so
//! more than one can be instantiated side by side (e.g. in tests).

use std::{
    io,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    thread::JoinHandle,
};

use crate::{
    config::{BindFlags, Config, InterfaceBindMode, SocketConfig, WorkingMode},
    error::{InitError, StartError},
    pool::{AddressLayout, FrameAddr, Pool, FRAMES_PER_SOCKET},
    processor::PacketProcessor,
    socket::{Fd, Socket},
    worker::{
        self,
        stats::{SocketStats, Stats},
        PoolGroup, Worker, WorkerSocket,
    },
};

/// A fully initialized datapath: pools, sockets, and (once started)
/// worker threads for every (worker, interface) pair in its
/// configuration.
pub struct Datapath {
    config: Config,
    stop: Arc<AtomicBool>,
    pending: Mutex<Option<Vec<Worker>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    /// `stats[worker][interface]`.
    stats: Vec<Vec<(Arc<SocketStats>, Fd)>>,
}

impl Datapath {
    /// Resolves bind modes, allocates pools, creates sockets, and
    /// pre-fills fill rings for every worker. Does not start worker
    /// threads — call [`start_workers`](Self::start_workers) for that.
    pub fn init(config: Config, processor: Arc<dyn PacketProcessor>) -> Result<Self, InitError> {
        let interfaces = config.interfaces();
        let n_ifaces = interfaces.len();

        let mut zc_members = Vec::new();
        let mut copy_members = Vec::new();

        for (i, (_, _, bind_mode)) in interfaces.iter().enumerate() {
            match bind_mode {
                InterfaceBindMode::ZeroCopy => zc_members.push(i),
                InterfaceBindMode::Copy => copy_members.push(i),
            }
        }

        let aligned = !config.unaligned();
        let frame_size = config.frame_size().get();

        let zc_layout = if zc_members.is_empty() {
            None
        } else {
            Some(AddressLayout::new(frame_size, zc_members.len() as u32, aligned)?)
        };

        let copy_layout = if copy_members.is_empty() {
            None
        } else {
            Some(AddressLayout::new(frame_size, copy_members.len() as u32, aligned)?)
        };

        let zc_socket_config = SocketConfig::builder()
            .bind_flags(BindFlags::XDP_ZEROCOPY | BindFlags::XDP_USE_NEED_WAKEUP)
            .build();
        let copy_socket_config = SocketConfig::builder()
            .bind_flags(BindFlags::XDP_COPY | BindFlags::XDP_USE_NEED_WAKEUP)
            .build();

        let stop = Arc::new(AtomicBool::new(false));
        let mut workers = Vec::with_capacity(config.workers() as usize);
        let mut stats_table = Vec::with_capacity(config.workers() as usize);

        for w in 0..config.workers() {
            let mut zc_pool = zc_layout.map(|l| Pool::new(l, config.unaligned())).transpose()?;
            let mut copy_pool = copy_layout.map(|l| Pool::new(l, config.unaligned())).transpose()?;

            let mut zc_fq_cq = None;
            let mut copy_fq_cq = None;

            let mut sockets = Vec::with_capacity(n_ifaces);
            let mut worker_stats_row = Vec::with_capacity(n_ifaces);

            for (name, iface, bind_mode) in interfaces {
                let (pool, socket_config) = match bind_mode {
                    InterfaceBindMode::ZeroCopy => (
                        zc_pool
                            .as_ref()
                            .expect("zero-copy pool exists for a zero-copy interface"),
                        zc_socket_config,
                    ),
                    InterfaceBindMode::Copy => (
                        copy_pool
                            .as_ref()
                            .expect("copy pool exists for a copy interface"),
                        copy_socket_config,
                    ),
                };

                let (tx, rx, fq_cq) = Socket::new(socket_config, pool, iface, w)?;

                if let Some(fq_cq) = fq_cq {
                    match bind_mode {
                        InterfaceBindMode::ZeroCopy => {
                            zc_fq_cq.get_or_insert(fq_cq);
                        }
                        InterfaceBindMode::Copy => {
                            copy_fq_cq.get_or_insert(fq_cq);
                        }
                    }
                }

                let stats = Arc::new(SocketStats::default());
                worker_stats_row.push((stats.clone(), rx.fd().clone()));

                sockets.push(WorkerSocket {
                    name: name.clone(),
                    bind_mode: *bind_mode,
                    tx,
                    rx,
                    outstanding_tx: 0,
                    stats,
                });
            }

            let zero_copy = build_group(zc_pool.take(), zc_fq_cq, &zc_members)?;
            let copy = build_group(copy_pool.take(), copy_fq_cq, &copy_members)?;

            workers.push(Worker {
                id: w,
                sockets,
                zero_copy,
                copy,
                processor: processor.clone(),
                batch_size: config.batch_size(),
                poll: config.poll(),
                busy_poll: config.busy_poll(),
                stop: stop.clone(),
            });

            stats_table.push(worker_stats_row);
        }

        if config.working_mode().contains(WorkingMode::KERNEL_FILTER) {
            log::info!(
                "kernel filter mode requested: loading/attaching the kernel-side program and \
                 publishing each (worker, interface) socket fd into its xsks map is left to the \
                 caller"
            );
        }

        Ok(Self {
            config,
            stop,
            pending: Mutex::new(Some(workers)),
            handles: Mutex::new(Vec::new()),
            stats: stats_table,
        })
    }

    /// Pins each worker to a distinct CPU and spawns its thread. A no-op
    /// returning `Ok(())` if the configured working mode has no datapath
    /// component (pure kernel-filter mode).
    pub fn start_workers(&self) -> Result<(), StartError> {
        if !self.config.working_mode().contains(WorkingMode::DATAPATH) {
            log::debug!("working mode has no datapath component; not starting worker threads");
            return Ok(());
        }

        let mut pending = self.pending.lock().unwrap();
        let workers = pending.take().ok_or(StartError::AlreadyStarted)?;

        let handles = worker::spawn_workers(workers)?;
        *self.handles.lock().unwrap() = handles;
        Ok(())
    }

    /// Asserts the stop flag and joins every worker thread. Idempotent:
    /// calling this again (or before `start_workers`) just joins nothing.
    pub fn stop_workers(&self) {
        self.stop.store(true, Ordering::Relaxed);

        let mut handles = self.handles.lock().unwrap();
        for handle in handles.drain(..) {
            if let Err(e) = handle.join() {
                log::error!("worker thread panicked: {:?}", e);
            }
        }
    }

    /// Merges user-side counters with the kernel's own statistics for one
    /// socket.
    pub fn socket_stats(&self, worker: u32, iface: u32) -> io::Result<Stats> {
        let row = self
            .stats
            .get(worker as usize)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "unknown worker"))?;

        let (stats, fd) = row
            .get(iface as usize)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "unknown interface"))?;

        let kernel = fd.xdp_statistics()?;
        Ok(stats.snapshot(kernel))
    }

    /// Stops workers (if running) and drops every pool and socket. Safe
    /// to call after a partial `init` failure, since dropping handles
    /// that were never fully wired up is itself a no-op.
    pub fn cleanup(self) {
        self.stop_workers();
    }
}

fn build_group(
    pool: Option<Pool>,
    fq_cq: Option<(crate::pool::FillQueue, crate::pool::CompQueue)>,
    members: &[usize],
) -> Result<Option<PoolGroup>, InitError> {
    match (pool, fq_cq) {
        (Some(pool), Some((fq, cq))) => {
            let mut group = PoolGroup {
                pool,
                fq,
                cq,
                members: members.to_vec(),
            };
            prefill_group(&mut group)?;
            Ok(Some(group))
        }
        (None, None) => Ok(None),
        _ => Err(InitError::Prefill {
            reason: "pool was created without receiving its fill/completion rings",
            requested: 0,
            got: 0,
        }),
    }
}

/// Pre-fill protocol (`SPEC_FULL.md` §4.2): every frame in the group's
/// pool starts out in kernel custody on the shared fill ring, submitted
/// in ring-sized chunks since the ring is typically smaller than the
/// pool.
fn prefill_group(group: &mut PoolGroup) -> Result<(), InitError> {
    const CHUNK: usize = 512;

    let layout = group.pool.layout();
    let mut addrs = Vec::with_capacity(CHUNK);

    for local_idx in 0..group.members.len() as u32 {
        for frame_id in 0..FRAMES_PER_SOCKET {
            addrs.push(layout.encode(local_idx, frame_id));

            if addrs.len() == CHUNK {
                submit_prefill_chunk(group, &addrs)?;
                addrs.clear();
            }
        }
    }

    if !addrs.is_empty() {
        submit_prefill_chunk(group, &addrs)?;
    }

    Ok(())
}

fn submit_prefill_chunk(group: &mut PoolGroup, addrs: &[FrameAddr]) -> Result<(), InitError> {
    let got = unsafe { group.fq.produce(addrs) };

    if got != addrs.len() {
        return Err(InitError::Prefill {
            reason: "fill ring rejected a pre-fill chunk",
            requested: addrs.len() as u32,
            got: got as u32,
        });
    }

    Ok(())
}
